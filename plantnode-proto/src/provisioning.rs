//! Local provisioning HTTP surface
//!
//! Served by a node only while it runs its own access point. Paths, form
//! field names and response bodies are shared with the provisioner CLI.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const PATH_SSID: &str = "/ssid";
pub const PATH_MAC: &str = "/mac";
pub const PATH_CONNECT: &str = "/connect";
pub const PATH_SAVE_CREDENTIALS: &str = "/saveCredentials";
pub const PATH_HEALTH: &str = "/health";

pub const FIELD_SSID: &str = "ssid";
pub const FIELD_PASSWORD: &str = "password";

pub const BODY_OK: &str = "ok";
pub const BODY_MISSING_FIELD: &str = "Missing SSID or password.";

/// Default address of a node's own access point interface
pub const DEFAULT_AP_ADDR: &str = "192.168.4.1";

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// Security of a scanned network, encoded on the wire with the classic
/// numeric encryption-type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityKind {
    Open,
    Wep,
    Wpa,
    Wpa2,
    /// WPA/WPA2 mixed or anything the radio reports as automatic
    Auto,
    Other(u8),
}

impl SecurityKind {
    pub fn code(self) -> u8 {
        match self {
            SecurityKind::Wpa => 2,
            SecurityKind::Wpa2 => 4,
            SecurityKind::Wep => 5,
            SecurityKind::Open => 7,
            SecurityKind::Auto => 8,
            SecurityKind::Other(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            2 => SecurityKind::Wpa,
            4 => SecurityKind::Wpa2,
            5 => SecurityKind::Wep,
            7 => SecurityKind::Open,
            8 => SecurityKind::Auto,
            other => SecurityKind::Other(other),
        }
    }

    pub fn is_open(self) -> bool {
        self == SecurityKind::Open
    }
}

impl Serialize for SecurityKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for SecurityKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u8::deserialize(deserializer).map(SecurityKind::from_code)
    }
}

/// One network from a scan, in discovery order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub ssid: String,
    pub encryption: SecurityKind,
}

/// Encode `application/x-www-form-urlencoded` fields
pub fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Decode a query string or `application/x-www-form-urlencoded` body.
///
/// Malformed percent escapes are kept verbatim rather than rejected.
pub fn parse_form(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(k), decode_component(v))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
