//! Telemetry topic and payload
//!
//! Readings are published to `/sensors/{identity}` as a flat JSON object.
//! A reading that could not be acquired is sent as `null`, never dropped
//! and never replaced by zero:
//!
//! ```json
//! {"temp":null,"humidity":41.0,"soil":612.0,"light":153.3}
//! ```

use serde::{Deserialize, Serialize};

use crate::DeviceIdentity;

pub const TOPIC_PREFIX: &str = "/sensors/";

pub fn telemetry_topic(identity: &DeviceIdentity) -> String {
    format!("{TOPIC_PREFIX}{identity}")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub temp: Option<f32>,
    pub humidity: Option<f32>,
    pub soil: f32,
    pub light: f32,
}

impl TelemetryPayload {
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}
