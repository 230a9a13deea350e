//! ESP32 radio
//!
//! The driver always runs in mixed mode while the access point is up, so a
//! scan or a station attempt never has to take the access point down.

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
    EspWifi, WifiDeviceId,
};
use anyhow::anyhow;
use log::*;
use plantnode_mcu::{IpInfo, ScanResult, Wifi, WifiStatus};
use plantnode_proto::SecurityKind;

pub struct Radio {
    wifi: BlockingWifi<EspWifi<'static>>,
    client: Option<ClientConfiguration>,
    access_point: Option<AccessPointConfiguration>,
    mac: [u8; 6],
}

impl Radio {
    pub fn new(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> anyhow::Result<Self> {
        let wifi = BlockingWifi::wrap(
            EspWifi::new(modem, sys_loop.clone(), Some(nvs))?,
            sys_loop,
        )?;
        let mac = wifi.wifi().driver().get_mac(WifiDeviceId::Sta)?;

        let mut radio = Self {
            wifi,
            client: None,
            access_point: None,
            mac,
        };
        // scanning needs the station interface even before any credentials
        radio.apply()?;
        Ok(radio)
    }

    fn apply(&mut self) -> anyhow::Result<()> {
        let client = self.client.clone().unwrap_or_default();
        let config = match &self.access_point {
            Some(ap) => Configuration::Mixed(client, ap.clone()),
            None => Configuration::Client(client),
        };
        self.wifi.set_configuration(&config)?;
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }
        Ok(())
    }
}

impl Wifi for Radio {
    type Error = anyhow::Error;

    fn mac_address(&self) -> [u8; 6] {
        self.mac
    }

    fn scan(&mut self) -> Result<Vec<ScanResult>, Self::Error> {
        let found = self.wifi.scan()?;
        Ok(found
            .into_iter()
            .map(|ap| ScanResult {
                ssid: ap.ssid.to_string(),
                channel: ap.channel,
                rssi: ap.signal_strength,
                security: security_kind(ap.auth_method),
            })
            .collect())
    }

    fn begin_station(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
        // WPA2 floor keeps mixed WPA2/WPA3 networks from negotiating SAE
        self.client = Some(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| anyhow!("SSID too long"))?,
            password: password
                .try_into()
                .map_err(|_| anyhow!("password too long"))?,
            auth_method: AuthMethod::WPA2Personal,
            ..Default::default()
        });
        self.apply()?;

        // non-blocking, the supervisor polls `status`
        self.wifi.wifi_mut().connect()?;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.wifi.wifi_mut().disconnect()?;
        Ok(())
    }

    fn status(&self) -> WifiStatus {
        let associated = self.wifi.is_connected().unwrap_or(false);
        let netif_up = self.wifi.wifi().sta_netif().is_up().unwrap_or(false);
        match (associated, netif_up) {
            (true, true) => WifiStatus::Connected,
            (true, false) => WifiStatus::Connecting,
            _ => WifiStatus::Disconnected,
        }
    }

    fn ip_info(&self) -> Option<IpInfo> {
        let info = self.wifi.wifi().sta_netif().get_ip_info().ok()?;
        let prefix = u32::from(info.subnet.mask.0.min(32));
        let netmask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
        Some(IpInfo {
            ip: info.ip.octets(),
            gateway: info.subnet.gateway.octets(),
            netmask: netmask.to_be_bytes(),
        })
    }

    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        self.access_point = Some(AccessPointConfiguration {
            ssid: ssid.try_into().map_err(|_| anyhow!("AP SSID too long"))?,
            password: password
                .try_into()
                .map_err(|_| anyhow!("AP password too long"))?,
            auth_method,
            channel: 1,
            ..Default::default()
        });
        self.apply()?;
        if let Ok(info) = self.wifi.wifi().ap_netif().get_ip_info() {
            info!("Access point address {}", info.ip);
        }
        Ok(())
    }

    fn stop_access_point(&mut self) -> Result<(), Self::Error> {
        self.access_point = None;
        self.apply()
    }

    fn is_access_point_active(&self) -> bool {
        self.access_point.is_some()
    }
}

fn security_kind(auth: Option<AuthMethod>) -> SecurityKind {
    match auth {
        None | Some(AuthMethod::None) => SecurityKind::Open,
        Some(AuthMethod::WEP) => SecurityKind::Wep,
        Some(AuthMethod::WPA) => SecurityKind::Wpa,
        Some(AuthMethod::WPA2Personal) => SecurityKind::Wpa2,
        Some(_) => SecurityKind::Auto,
    }
}
