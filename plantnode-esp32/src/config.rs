//! Build-time configuration
//!
//! Values come from `PLANTNODE_*` variables, read from `.env` by build.rs.
//! Anything unset keeps the `NodeConfig` default.

use plantnode_mcu::NodeConfig;

pub fn node_config() -> NodeConfig {
    let mut config = NodeConfig::default();

    if let Some(url) = option_env!("PLANTNODE_API_URL") {
        config.api_base_url = url.to_string();
    }
    if let Some(host) = option_env!("PLANTNODE_MQTT_HOST") {
        config.broker.host = host.to_string();
    }
    if let Some(port) = option_env!("PLANTNODE_MQTT_PORT").and_then(|p| p.parse().ok()) {
        config.broker.port = port;
    }
    config.broker.username = option_env!("PLANTNODE_MQTT_USER")
        .filter(|u| !u.is_empty())
        .map(str::to_string);
    config.broker.password = option_env!("PLANTNODE_MQTT_PASSWORD")
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    if let Some(prefix) = option_env!("PLANTNODE_AP_PREFIX") {
        config.access_point.ssid_prefix = prefix.to_string();
    }
    if let Some(password) = option_env!("PLANTNODE_AP_PASSWORD") {
        config.access_point.password = password.to_string();
    }
    if let Some(ms) = option_env!("PLANTNODE_PUBLISH_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        config.publish_interval_ms = ms;
    }

    config
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhtKind {
    Dht11,
    Dht22,
}

/// Sensor options that are not fixed by the pin assignment
///
/// Pins: soil probe on GPIO34 (ADC1), BH1750 on I2C0 with SDA=GPIO21 and
/// SCL=GPIO22, DHT data on GPIO4.
#[derive(Debug, Clone, Copy)]
pub struct SensorWiring {
    pub dht: DhtKind,
    pub bh1750_address: u8,
    pub i2c_hz: u32,
}

impl SensorWiring {
    pub fn from_env() -> Self {
        let dht = match option_env!("PLANTNODE_DHT") {
            Some("22") => DhtKind::Dht22,
            _ => DhtKind::Dht11,
        };
        let bh1750_address = option_env!("PLANTNODE_BH1750_ADDR")
            .and_then(|a| u8::from_str_radix(a.trim_start_matches("0x"), 16).ok())
            .unwrap_or(0x23);

        Self {
            dht,
            bh1750_address,
            i2c_hz: 100_000,
        }
    }
}
