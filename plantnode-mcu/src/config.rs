//! Node configuration
//!
//! Every field has a default, so a config file only needs to name what
//! differs. Board crates usually build this from compile-time environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Base URL of the registration authority
    pub api_base_url: String,
    pub broker: BrokerConfig,
    /// MQTT client id is this prefix followed by the device identity
    pub client_id_prefix: String,
    pub access_point: AccessPointConfig,
    /// Station link polls after joining a network
    pub station_retry: RetryPolicy,
    /// Publish-session connect attempts
    pub session_retry: RetryPolicy,
    pub publish_interval_ms: u64,
    /// How long one access point iteration waits for a request
    pub request_poll_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            broker: BrokerConfig::default(),
            client_id_prefix: "plantnode-".to_string(),
            access_point: AccessPointConfig::default(),
            station_retry: RetryPolicy::bounded(100, 1000),
            session_retry: RetryPolicy::unbounded(2000),
            publish_interval_ms: 5000,
            request_poll_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: None,
            password: None,
        }
    }
}

impl BrokerConfig {
    pub fn url(&self) -> String {
        format!("mqtt://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPointConfig {
    /// The access point is named `{ssid_prefix}-{first 5 identity chars}`
    pub ssid_prefix: String,
    /// Empty for an open access point, otherwise 8 to 63 bytes (WPA2)
    pub password: String,
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            ssid_prefix: "PlantNode".to_string(),
            password: "plantnode".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("api_base_url must start with http:// or https://, got {0:?}")]
    ApiBaseUrl(String),
    #[error("broker host is empty")]
    BrokerHost,
    #[error("access point ssid prefix must be 1 to 26 bytes")]
    AccessPointPrefix,
    #[error("access point password must be empty or 8 to 63 bytes")]
    AccessPointPassword,
}

impl NodeConfig {
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(ConfigError::ApiBaseUrl(self.api_base_url.clone()));
        }
        if self.broker.host.is_empty() {
            return Err(ConfigError::BrokerHost);
        }
        // prefix + '-' + 5 identity chars must fit a 32 byte SSID
        if self.access_point.ssid_prefix.is_empty() || self.access_point.ssid_prefix.len() > 26 {
            return Err(ConfigError::AccessPointPrefix);
        }
        let pass_len = self.access_point.password.len();
        if pass_len != 0 && !(8..=63).contains(&pass_len) {
            return Err(ConfigError::AccessPointPassword);
        }
        Ok(())
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn request_poll(&self) -> Duration {
        Duration::from_millis(self.request_poll_ms)
    }
}
