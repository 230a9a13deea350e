//! Registration check against the remote authority
//!
//! Runs once per boot. Only an explicit "not registered" answer is allowed
//! to destroy the stored credentials; every failure to get a clear answer
//! keeps the device operating.

use std::fmt;

use log::*;
use plantnode_proto::{registration_url, DeviceIdentity, STATUS_NOT_REGISTERED, STATUS_REGISTERED};

use crate::storage::{CredentialStore, NvRegion};

/// Outbound HTTP, implemented by the board crate
pub trait HttpClient {
    type Error: fmt::Display;

    /// Issue a GET and return the response status code
    fn get(&mut self, url: &str) -> Result<u16, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationVerdict {
    Registered,
    NotRegistered,
    Indeterminate,
}

impl RegistrationVerdict {
    /// The device must restart after its credentials were wiped
    pub fn requires_restart(self) -> bool {
        self == RegistrationVerdict::NotRegistered
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("registration request failed: {0}")]
    Transport(String),
    #[error("unexpected registration status {0}")]
    UnexpectedStatus(u16),
}

pub struct RegistrationClient<H> {
    http: H,
    base_url: String,
}

impl<H: HttpClient> RegistrationClient<H> {
    pub fn new(http: H, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn try_query(
        &mut self,
        identity: &DeviceIdentity,
    ) -> Result<RegistrationVerdict, RegistrationError> {
        let url = registration_url(&self.base_url, identity);
        info!("Calling registration API: {url}");

        let status = self
            .http
            .get(&url)
            .map_err(|e| RegistrationError::Transport(e.to_string()))?;
        info!("Registration API responded with HTTP {status}");

        match status {
            STATUS_REGISTERED => Ok(RegistrationVerdict::Registered),
            STATUS_NOT_REGISTERED => Ok(RegistrationVerdict::NotRegistered),
            other => Err(RegistrationError::UnexpectedStatus(other)),
        }
    }

    /// Non-destructive check; errors collapse to `Indeterminate`
    pub fn query(&mut self, identity: &DeviceIdentity) -> RegistrationVerdict {
        match self.try_query(identity) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("{e}; not modifying stored credentials");
                RegistrationVerdict::Indeterminate
            }
        }
    }

    /// Check and enforce: a `NotRegistered` verdict wipes the credential
    /// store and tells the caller to restart.
    pub fn check<R: NvRegion>(
        &mut self,
        identity: &DeviceIdentity,
        store: &mut CredentialStore<R>,
    ) -> RegistrationVerdict {
        let verdict = self.query(identity);
        if verdict.requires_restart() {
            warn!("Device {identity} is NOT registered, clearing credentials");
            if let Err(e) = store.wipe() {
                // the next boot checks again and retries the wipe
                error!("Failed to wipe credentials: {e}");
            }
        }
        verdict
    }

    pub fn http(&self) -> &H {
        &self.http
    }
}
