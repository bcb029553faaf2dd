use std::collections::BTreeMap;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::refs::GitRefs;

/// `attributes["event-type"]`, the discriminator required on every bus
/// message (§4.7).
pub const ATTR_EVENT_TYPE: &str = "event-type";
pub const EVENT_TYPE_PERIODIC: &str = "periodic.event";
pub const EVENT_TYPE_PRESUBMIT: &str = "presubmit.event";
pub const EVENT_TYPE_POSTSUBMIT: &str = "postsubmit.event";

/// One bus message, independent of whether it arrived via push (HTTP) or
/// pull (long-lived subscription) — both modes share this decode path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMessage {
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Base64-encoded UTF-8 JSON payload.
    pub data: String,
    #[serde(default)]
    pub message_id: String,
}

/// The push-endpoint request body: `{ message: {...}, subscription }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusEnvelope {
    pub message: BusMessage,
    #[serde(default)]
    pub subscription: String,
}

/// The decoded JSON payload carried in `BusMessage::data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refs: Option<GitRefs>,
    #[serde(default)]
    pub envs: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl BusMessage {
    /// Decode `attributes["event-type"]` plus the base64 JSON body.
    /// `UnsupportedEventType` on a missing or unrecognized attribute,
    /// `InvalidArgument` on malformed base64/JSON.
    pub fn decode(&self) -> Result<(crate::request::ExecutionType, BusPayload), GatewayError> {
        let event_type = self
            .attributes
            .get(ATTR_EVENT_TYPE)
            .ok_or_else(|| GatewayError::UnsupportedEventType("missing".into()))?;

        let execution_type = match event_type.as_str() {
            EVENT_TYPE_PERIODIC => crate::request::ExecutionType::Periodic,
            EVENT_TYPE_PRESUBMIT => crate::request::ExecutionType::Presubmit,
            EVENT_TYPE_POSTSUBMIT => crate::request::ExecutionType::Postsubmit,
            other => return Err(GatewayError::UnsupportedEventType(other.to_string())),
        };

        let raw = base64::engine::general_purpose::STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| GatewayError::InvalidArgument(format!("bad base64 data: {e}")))?;

        let payload: BusPayload = serde_json::from_slice(&raw)
            .map_err(|e| GatewayError::InvalidArgument(format!("bad JSON payload: {e}")))?;

        Ok((execution_type, payload))
    }

    /// Build a message carrying `payload` tagged with `execution_type`,
    /// the inverse of [`BusMessage::decode`]. Used by tests and by any
    /// future bus-publishing collaborator.
    pub fn encode(
        execution_type: crate::request::ExecutionType,
        payload: &BusPayload,
        message_id: impl Into<String>,
    ) -> Self {
        let event_type = match execution_type {
            crate::request::ExecutionType::Periodic => EVENT_TYPE_PERIODIC,
            crate::request::ExecutionType::Presubmit => EVENT_TYPE_PRESUBMIT,
            crate::request::ExecutionType::Postsubmit => EVENT_TYPE_POSTSUBMIT,
        };
        let mut attributes = BTreeMap::new();
        attributes.insert(ATTR_EVENT_TYPE.to_string(), event_type.to_string());
        let raw = serde_json::to_vec(payload).expect("BusPayload always serializes");
        let data = base64::engine::general_purpose::STANDARD.encode(raw);
        BusMessage {
            attributes,
            data,
            message_id: message_id.into(),
        }
    }
}
