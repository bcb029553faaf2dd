#![no_main]

use gateway_types::bus::BusPayload;
use gateway_types::{GitRefs, JobExecutionRequest, ReportMessage};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Try to parse as JSON and verify serialization roundtrips. Malformed
    // input is expected to fail to parse, never to panic.
    if let Ok(json_str) = std::str::from_utf8(data) {
        if let Ok(req) = serde_json::from_str::<JobExecutionRequest>(json_str) {
            if let Ok(roundtripped) = serde_json::to_string(&req) {
                if let Ok(parsed) = serde_json::from_str::<JobExecutionRequest>(&roundtripped) {
                    assert_eq!(req, parsed);
                }
            }
        }

        if let Ok(refs) = serde_json::from_str::<GitRefs>(json_str) {
            if let Ok(roundtripped) = serde_json::to_string(&refs) {
                if let Ok(parsed) = serde_json::from_str::<GitRefs>(&roundtripped) {
                    assert_eq!(refs, parsed);
                }
            }
        }

        if let Ok(payload) = serde_json::from_str::<BusPayload>(json_str) {
            if let Ok(roundtripped) = serde_json::to_string(&payload) {
                if let Ok(parsed) = serde_json::from_str::<BusPayload>(&roundtripped) {
                    assert_eq!(payload, parsed);
                }
            }
        }

        if let Ok(report) = serde_json::from_str::<ReportMessage>(json_str) {
            if let Ok(roundtripped) = serde_json::to_string(&report) {
                if let Ok(parsed) = serde_json::from_str::<ReportMessage>(&roundtripped) {
                    assert_eq!(report, parsed);
                }
            }
        }
    }
});