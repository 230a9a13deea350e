//! Device identity derived from the hardware (MAC) address
//!
//! The identity is the address in upper-case hex with separators stripped,
//! e.g. `A4CF12F3B2C1`. It is used as the MQTT client id suffix, in the
//! telemetry topic and as a path component of the registration check.

use std::fmt::{self, Write as _};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("device identity is empty")]
    Empty,
    #[error("invalid character {0:?} in device identity")]
    InvalidChar(char),
}

impl DeviceIdentity {
    pub fn from_mac(mac: [u8; 6]) -> Self {
        let mut id = String::with_capacity(12);
        for byte in mac {
            let _ = write!(id, "{byte:02X}");
        }
        Self(id)
    }

    /// Parse an address in any of the usual spellings
    /// (`a4:cf:12:f3:b2:c1`, `A4-CF-12-F3-B2-C1`, `A4CF12F3B2C1`)
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let mut id = String::with_capacity(raw.len());
        for c in raw.trim().chars() {
            match c {
                ':' | '-' => continue,
                c if c.is_ascii_hexdigit() => id.push(c.to_ascii_uppercase()),
                c => return Err(IdentityError::InvalidChar(c)),
            }
        }
        if id.is_empty() {
            return Err(IdentityError::Empty);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First five characters, used as the access point name suffix
    pub fn short(&self) -> &str {
        // identity is ASCII hex, any byte index is a char boundary
        &self.0[..self.0.len().min(5)]
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
