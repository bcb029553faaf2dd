#![no_main]

use std::collections::BTreeMap;

use gateway_types::bus::BusMessage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: (u8, Vec<u8>, Vec<u8>)| {
    let (event_type_selector, data_bytes, message_id_bytes) = data;

    let mut attributes = BTreeMap::new();
    match event_type_selector % 4 {
        0 => {
            attributes.insert("event-type".to_string(), "periodic.event".to_string());
        }
        1 => {
            attributes.insert("event-type".to_string(), "presubmit.event".to_string());
        }
        2 => {
            attributes.insert("event-type".to_string(), "postsubmit.event".to_string());
        }
        _ => {
            // no event-type attribute at all, or an unrecognized one
            if !data_bytes.is_empty() {
                attributes.insert(
                    "event-type".to_string(),
                    String::from_utf8_lossy(&data_bytes).to_string(),
                );
            }
        }
    }

    let msg = BusMessage {
        attributes,
        data: String::from_utf8_lossy(&data_bytes).to_string(),
        message_id: String::from_utf8_lossy(&message_id_bytes).to_string(),
    };

    // decode() must never panic on adversarial attributes/base64/JSON;
    // every failure mode is a typed GatewayError.
    let _ = msg.decode();
});
