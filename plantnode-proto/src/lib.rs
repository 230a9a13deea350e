//! plantnode wire formats
//!
//! Everything that crosses a boundary between a node and the outside world
//! lives here, so the firmware and the host tools agree on it:
//! - the hardware-derived device identity
//! - the local provisioning HTTP surface (paths, form fields, scan entries)
//! - the registration endpoint and its status codes
//! - the telemetry topic and payload

pub mod identity;
pub mod provisioning;
pub mod registration;
pub mod telemetry;

pub use identity::{DeviceIdentity, IdentityError};
pub use provisioning::{encode_form, parse_form, ScanEntry, SecurityKind};
pub use registration::{registration_url, STATUS_NOT_REGISTERED, STATUS_REGISTERED};
pub use telemetry::{telemetry_topic, TelemetryPayload};

/// Maximum length in bytes of a network name or secret (one storage slot)
pub const CREDENTIAL_SLOT_LEN: usize = 32;
