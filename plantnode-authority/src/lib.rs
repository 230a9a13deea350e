pub mod http;

use std::collections::HashSet;

use plantnode_proto::registration::REGISTRATION_PATH;
use plantnode_proto::{DeviceIdentity, IdentityError, STATUS_NOT_REGISTERED, STATUS_REGISTERED};

/// Devices allowed to report telemetry
#[derive(Debug, Default, Clone)]
pub struct Allowlist {
    devices: HashSet<DeviceIdentity>,
}

impl Allowlist {
    pub fn parse<S: AsRef<str>>(ids: &[S]) -> Result<Self, IdentityError> {
        let devices = ids
            .iter()
            .map(|id| DeviceIdentity::parse(id.as_ref()))
            .collect::<Result<_, _>>()?;
        Ok(Self { devices })
    }

    pub fn contains(&self, id: &DeviceIdentity) -> bool {
        self.devices.contains(id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Status code for a registration check on `path`, `None` when the path
    /// is not a registration check
    pub fn answer(&self, path: &str) -> Option<u16> {
        let raw = path.strip_prefix(REGISTRATION_PATH)?;
        if raw.is_empty() || raw.contains('/') {
            return None;
        }
        // an identity we cannot even parse is certainly not registered
        let registered = DeviceIdentity::parse(raw).is_ok_and(|id| self.contains(&id));
        Some(if registered {
            STATUS_REGISTERED
        } else {
            STATUS_NOT_REGISTERED
        })
    }
}
