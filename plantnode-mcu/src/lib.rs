//! plantnode MCU core
//!
//! The provisioning-and-connectivity state machine of a plantnode, written
//! against capability traits so it runs the same on a board and on a host.
//!
//! Board crates implement:
//! - [`Wifi`] for the radio (station, access point, scan)
//! - [`NvRegion`] for the 96 byte credential region
//! - [`HttpClient`] for the registration check
//! - [`MqttTransport`] for telemetry publishing
//! - [`RequestSource`] for requests arriving on the access point
//! - [`SensorReader`] and [`Delay`]
//!
//! and then hand everything to [`Node`], which they drive with
//! [`Node::run`] and restart the device when it returns.

pub mod board;
pub mod config;
pub mod node;
pub mod provisioning;
pub mod publish;
pub mod registration;
pub mod retry;
pub mod storage;
pub mod supervisor;
pub mod telemetry;
pub mod wifi;

pub use board::{Board, Peripherals};
pub use config::{AccessPointConfig, BrokerConfig, ConfigError, NodeConfig};
pub use node::Node;
pub use provisioning::{
    ControlAction, Method, ProvisioningControl, ProvisioningServer, Reply, Request, RequestSource,
    Response,
};
pub use publish::{ConnError, MqttTransport, PublishError, PublishSession};
pub use registration::{HttpClient, RegistrationClient, RegistrationError, RegistrationVerdict};
pub use retry::{retry, Delay, RetryError, RetryPolicy, StdDelay};
pub use storage::{CredentialStore, Credentials, CredentialsError, NvRegion, StoreError};
pub use supervisor::{ConnectionState, DeviceContext, Flow, NetworkSupervisor};
pub use telemetry::{SensorReader, SensorReading, SuppressReason, TelemetryLoop, TickOutcome};
pub use wifi::{IpInfo, ScanResult, Wifi, WifiStatus};
