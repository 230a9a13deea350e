//! Persistent credential storage
//!
//! The credential region is a fixed 96-byte image:
//!
//! | offset | len | content                         |
//! |--------|-----|---------------------------------|
//! | 0      | 32  | network name, zero-filled       |
//! | 32     | 32  | network secret, zero-filled     |
//! | 64     | 32  | reserved, zero                  |
//!
//! A slot with no zero byte holds exactly 32 bytes. The whole image is
//! committed at once, so the two slots can never disagree after a write.

use std::fmt;

use log::*;
use plantnode_proto::CREDENTIAL_SLOT_LEN as SLOT_LEN;

pub const REGION_SIZE: usize = 96;
pub const SSID_OFFSET: usize = 0;
pub const SECRET_OFFSET: usize = 32;

/// Trait for the non-volatile region holding the credentials
///
/// Board crates implement this on top of their storage backend
/// (an NVS blob on ESP32, an EEPROM page elsewhere).
pub trait NvRegion {
    /// Error type for storage operations
    type Error: fmt::Display;

    /// Read the whole region. Bytes that were never written read as zero.
    fn read(&self, image: &mut [u8; REGION_SIZE]) -> Result<(), Self::Error>;

    /// Replace the whole region and commit it before returning
    fn commit(&mut self, image: &[u8; REGION_SIZE]) -> Result<(), Self::Error>;
}

/// Network name and secret. Either both are set or neither is.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    ssid: String,
    password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialsError {
    #[error("network name and secret must both be set")]
    Missing,
    #[error("{field} is {len} bytes, the limit is 32")]
    TooLong { field: &'static str, len: usize },
    /// A zero byte would end the slot early on the next load
    #[error("{field} contains a NUL byte")]
    ContainsNul { field: &'static str },
}

impl Credentials {
    pub fn new(
        ssid: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let ssid = ssid.into();
        let password = password.into();

        if ssid.is_empty() || password.is_empty() {
            return Err(CredentialsError::Missing);
        }
        for (field, value) in [("network name", &ssid), ("secret", &password)] {
            if value.len() > SLOT_LEN {
                return Err(CredentialsError::TooLong {
                    field,
                    len: value.len(),
                });
            }
            if value.contains('\0') {
                return Err(CredentialsError::ContainsNul { field });
            }
        }

        Ok(Self { ssid, password })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_provisioned(&self) -> bool {
        !self.ssid.is_empty()
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &format_args!("<{} bytes>", self.password.len()))
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid credentials: {0}")]
    Invalid(#[from] CredentialsError),
    #[error("failed to commit credential region: {0}")]
    Commit(String),
}

/// Loads, saves and wipes the credential pair in an [`NvRegion`]
pub struct CredentialStore<R> {
    region: R,
}

impl<R: NvRegion> CredentialStore<R> {
    pub fn new(region: R) -> Self {
        Self { region }
    }

    /// Best-effort load: anything unreadable or half-written is
    /// reported as unprovisioned.
    pub fn load(&self) -> Credentials {
        let mut image = [0u8; REGION_SIZE];
        if let Err(e) = self.region.read(&mut image) {
            warn!("Failed to read credential region: {e}");
            return Credentials::empty();
        }
        decode(&image)
    }

    pub fn save(&mut self, credentials: &Credentials) -> Result<(), StoreError> {
        if !credentials.is_provisioned() {
            return Err(CredentialsError::Missing.into());
        }
        self.commit(&encode(credentials))?;
        info!("Saved credentials for SSID '{}'", credentials.ssid());
        Ok(())
    }

    /// Zero the whole region (factory reset)
    pub fn wipe(&mut self) -> Result<(), StoreError> {
        self.commit(&[0u8; REGION_SIZE])?;
        info!("Credential region wiped");
        Ok(())
    }

    pub fn region(&self) -> &R {
        &self.region
    }

    fn commit(&mut self, image: &[u8; REGION_SIZE]) -> Result<(), StoreError> {
        if let Err(e) = self.region.commit(image) {
            warn!("Credential commit failed ({e}), retrying once");
            self.region
                .commit(image)
                .map_err(|e| StoreError::Commit(e.to_string()))?;
        }
        Ok(())
    }
}

fn encode(credentials: &Credentials) -> [u8; REGION_SIZE] {
    let mut image = [0u8; REGION_SIZE];
    let ssid = credentials.ssid.as_bytes();
    let password = credentials.password.as_bytes();
    image[SSID_OFFSET..SSID_OFFSET + ssid.len()].copy_from_slice(ssid);
    image[SECRET_OFFSET..SECRET_OFFSET + password.len()].copy_from_slice(password);
    image
}

fn decode(image: &[u8; REGION_SIZE]) -> Credentials {
    let ssid = decode_slot(&image[SSID_OFFSET..SSID_OFFSET + SLOT_LEN]);
    let password = decode_slot(&image[SECRET_OFFSET..SECRET_OFFSET + SLOT_LEN]);

    match (ssid, password) {
        (Some(ssid), Some(password)) if ssid.is_empty() && password.is_empty() => {
            Credentials::empty()
        }
        (Some(ssid), Some(password)) if !ssid.is_empty() && !password.is_empty() => {
            Credentials { ssid, password }
        }
        _ => {
            warn!("Credential region looks corrupted, treating device as unprovisioned");
            Credentials::empty()
        }
    }
}

/// Bytes up to the first zero, or the whole slot when there is none
fn decode_slot(slot: &[u8]) -> Option<String> {
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    String::from_utf8(slot[..end].to_vec()).ok()
}
