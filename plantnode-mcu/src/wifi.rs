//! WiFi Abstraction Traits
//!
//! Traits for WiFi operations that board crates implement.

use std::fmt;

use plantnode_proto::{ScanEntry, SecurityKind};

/// WiFi network scan result
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub ssid: String,
    pub channel: u8,
    pub rssi: i8,
    pub security: SecurityKind,
}

impl ScanResult {
    pub fn to_entry(&self) -> ScanEntry {
        ScanEntry {
            ssid: self.ssid.clone(),
            encryption: self.security,
        }
    }
}

/// WiFi station status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiStatus {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// IP address info
#[derive(Debug, Clone)]
pub struct IpInfo {
    pub ip: [u8; 4],
    pub gateway: [u8; 4],
    pub netmask: [u8; 4],
}

impl IpInfo {
    pub fn ip_str(&self) -> String {
        format!("{}.{}.{}.{}", self.ip[0], self.ip[1], self.ip[2], self.ip[3])
    }
}

/// Trait for WiFi operations
///
/// Station and access point can be up at the same time; the supervisor
/// keeps its access point running while it tries an operator-supplied
/// network and only tears it down once the station link is established.
pub trait Wifi {
    /// Error type for WiFi operations
    type Error: fmt::Display;

    /// Hardware address of the station interface
    fn mac_address(&self) -> [u8; 6];

    /// Scan for available networks, one scan cycle, in discovery order
    fn scan(&mut self) -> Result<Vec<ScanResult>, Self::Error>;

    /// Start joining a network; completion is observed through `status`
    fn begin_station(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Leave the current network
    fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Get current station status
    fn status(&self) -> WifiStatus;

    /// Get IP info (if connected)
    fn ip_info(&self) -> Option<IpInfo>;

    /// Check if the station link is up
    fn is_connected(&self) -> bool {
        self.status() == WifiStatus::Connected
    }

    /// Bring up the device's own access point
    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Tear down the access point
    fn stop_access_point(&mut self) -> Result<(), Self::Error>;

    fn is_access_point_active(&self) -> bool;
}
