//! Network supervisor
//!
//! Decides between station and access point mode, drives the retries and
//! runs the once-per-boot registration check.
//!
//! ```text
//!            boot
//!   empty creds |  stored creds
//!        v      v
//! Unprovisioned ConnectingStation <---------------------+
//!        |        | ok          \ exhausted              |
//!        |        v              v                       |
//!        |   StationConnected   AccessPointMode ---------+
//!        |     |        \         ^    (connect request)
//!        +-----|---------\--------+
//!              v          v
//!         Registered    Unregistered (wipe, restart)
//!              | station lost
//!              +--> ConnectingStation
//! ```
//!
//! After every transition either the station link is up or the access
//! point and its request source are running.

use std::fmt;
use std::time::Duration;

use log::*;
use plantnode_proto::{DeviceIdentity, ScanEntry};

use crate::board::{Board, Peripherals};
use crate::config::NodeConfig;
use crate::provisioning::{ControlAction, ProvisioningControl, ProvisioningServer, RequestSource};
use crate::publish::{ConnError, PublishSession};
use crate::registration::{RegistrationClient, RegistrationVerdict};
use crate::retry::{retry, Delay, RetryError};
use crate::storage::{CredentialStore, Credentials, NvRegion, StoreError};
use crate::telemetry::SuppressReason;
use crate::wifi::Wifi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unprovisioned,
    ConnectingStation,
    StationConnected,
    AccessPointMode,
    Registered,
    Unregistered,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What the control loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Credentials were wiped; the board must restart the device
    Restart,
}

/// Per-boot device state
#[derive(Debug)]
pub struct DeviceContext {
    pub identity: DeviceIdentity,
    pub credentials: Credentials,
    pub state: ConnectionState,
    /// Set once the registration check ran this boot
    pub registration: Option<RegistrationVerdict>,
}

pub struct NetworkSupervisor<B: Board> {
    ctx: DeviceContext,
    config: NodeConfig,
    wifi: B::Wifi,
    store: CredentialStore<B::Region>,
    registration: RegistrationClient<B::Http>,
    session: PublishSession<B::Mqtt>,
    listener: B::Listener,
    server: ProvisioningServer,
    delay: B::Delay,
}

impl<B: Board> NetworkSupervisor<B> {
    /// Takes every peripheral except the sensors, which are handed back
    pub fn new(config: NodeConfig, peripherals: Peripherals<B>) -> (Self, B::Sensors) {
        let Peripherals {
            wifi,
            region,
            http,
            mqtt,
            listener,
            sensors,
            delay,
        } = peripherals;

        let identity = DeviceIdentity::from_mac(wifi.mac_address());
        let client_id = format!("{}{identity}", config.client_id_prefix);
        let session = PublishSession::new(
            mqtt,
            config.broker.clone(),
            client_id,
            config.session_retry,
        );
        let registration = RegistrationClient::new(http, config.api_base_url.clone());

        let supervisor = Self {
            ctx: DeviceContext {
                identity,
                credentials: Credentials::empty(),
                state: ConnectionState::Unprovisioned,
                registration: None,
            },
            config,
            wifi,
            store: CredentialStore::new(region),
            registration,
            session,
            listener,
            server: ProvisioningServer::new(),
            delay,
        };
        (supervisor, sensors)
    }

    pub fn boot(&mut self) -> Flow {
        info!("Device identity: {}", self.ctx.identity);
        self.ctx.credentials = self.store.load();

        if !self.ctx.credentials.is_provisioned() {
            info!("No stored credentials");
            self.set_state(ConnectionState::Unprovisioned);
            self.enter_access_point();
            return Flow::Continue;
        }

        self.attempt_station()
    }

    /// Try the credentials in the device context; on failure fall back to
    /// the access point.
    pub fn attempt_station(&mut self) -> Flow {
        loop {
            self.set_state(ConnectionState::ConnectingStation);
            if let Err(e) = self.connect_station() {
                warn!("{e}, starting access point");
                if let Err(e) = self.wifi.disconnect() {
                    warn!("Failed to stop station: {e}");
                }
                self.enter_access_point();
                return Flow::Continue;
            }

            self.set_state(ConnectionState::StationConnected);
            match self.establish() {
                Some(flow) => return flow,
                None => warn!("WiFi connection lost while connecting to MQTT"),
            }
        }
    }

    pub fn connect_station(&mut self) -> Result<(), ConnError> {
        let credentials = &self.ctx.credentials;
        info!("Connecting to SSID '{}'", credentials.ssid());
        self.wifi
            .begin_station(credentials.ssid(), credentials.password())
            .map_err(|e| ConnError::Station(e.to_string()))?;

        let wifi = &self.wifi;
        retry(
            &self.config.station_retry,
            &mut self.delay,
            || true,
            |_| if wifi.is_connected() { Ok(()) } else { Err(()) },
        )
        .map_err(|e| match e {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts, .. } => {
                ConnError::StationTimeout { attempts }
            }
        })?;

        match self.wifi.ip_info() {
            Some(ip) => info!("WiFi connected, IP {}", ip.ip_str()),
            None => info!("WiFi connected"),
        }
        Ok(())
    }

    /// Station link is up: drop the access point, open the publish session
    /// and run the registration check if this boot has not yet. `None`
    /// means the station link dropped before the session came up.
    fn establish(&mut self) -> Option<Flow> {
        if self.wifi.is_access_point_active() || self.listener.is_running() {
            self.stop_access_point();
        }

        match self.reconnect_session() {
            Ok(()) => {}
            Err(ConnError::Cancelled { .. }) => return None,
            Err(e) => {
                error!("{e}, starting access point");
                self.enter_access_point();
                return Some(Flow::Continue);
            }
        }

        if self.ctx.registration.is_none() {
            let verdict = self.registration.check(&self.ctx.identity, &mut self.store);
            self.ctx.registration = Some(verdict);
            match verdict {
                RegistrationVerdict::Registered => info!("Device is registered"),
                RegistrationVerdict::Indeterminate => {
                    warn!("Registration status unknown, continuing as registered")
                }
                RegistrationVerdict::NotRegistered => {
                    self.ctx.credentials = Credentials::empty();
                    self.set_state(ConnectionState::Unregistered);
                    return Some(Flow::Restart);
                }
            }
        }

        self.set_state(ConnectionState::Registered);
        Some(Flow::Continue)
    }

    pub fn enter_access_point(&mut self) {
        self.set_state(ConnectionState::AccessPointMode);
        self.ensure_access_point();
    }

    fn ensure_access_point(&mut self) {
        if !self.wifi.is_access_point_active() {
            let ssid = format!(
                "{}-{}",
                self.config.access_point.ssid_prefix,
                self.ctx.identity.short()
            );
            match self
                .wifi
                .start_access_point(&ssid, &self.config.access_point.password)
            {
                Ok(()) => info!("Access point '{ssid}' started"),
                Err(e) => error!("Failed to start access point '{ssid}': {e}"),
            }
        }

        if !self.listener.is_running() {
            match self.listener.start() {
                Ok(()) => info!("Provisioning server started"),
                Err(e) => error!("Failed to start provisioning server: {e}"),
            }
        }
    }

    fn stop_access_point(&mut self) {
        self.listener.stop();
        match self.wifi.stop_access_point() {
            Ok(()) => info!("Access point stopped"),
            Err(e) => warn!("Failed to stop access point: {e}"),
        }
    }

    /// Service at most one provisioning request
    pub fn serve_once(&mut self) -> Flow {
        self.ensure_access_point();

        let Some(request) = self.listener.next_request(self.config.request_poll()) else {
            return Flow::Continue;
        };

        let reply = {
            let mut control = ControlContext {
                wifi: &mut self.wifi,
                store: &mut self.store,
                ctx: &mut self.ctx,
            };
            self.server.dispatch(&mut control, &request)
        };
        self.listener.respond(reply.response);

        match reply.action {
            Some(ControlAction::ConnectStation) => {
                self.ctx.credentials = self.store.load();
                if !self.ctx.credentials.is_provisioned() {
                    warn!("Connect requested but no credentials are stored");
                    return Flow::Continue;
                }
                self.attempt_station()
            }
            None => Flow::Continue,
        }
    }

    /// Recover after the telemetry loop suppressed a publish
    pub fn housekeeping(&mut self, reason: SuppressReason) -> Flow {
        match reason {
            SuppressReason::StationDown => self.recover_station(),
            SuppressReason::SessionDown => {
                warn!("MQTT session lost, reconnecting");
                match self.reconnect_session() {
                    Ok(()) => Flow::Continue,
                    Err(ConnError::Cancelled { .. }) => self.recover_station(),
                    Err(e) => {
                        error!("{e}, starting access point");
                        self.enter_access_point();
                        Flow::Continue
                    }
                }
            }
        }
    }

    fn recover_station(&mut self) -> Flow {
        warn!("WiFi connection lost");
        self.attempt_station()
    }

    /// Connect the publish session, abandoning the attempt if the station
    /// link drops.
    pub fn reconnect_session(&mut self) -> Result<(), ConnError> {
        let wifi = &self.wifi;
        self.session.connect(&mut self.delay, || wifi.is_connected())
    }

    /// Either the station link is up, or the access point and its request
    /// source both are.
    pub fn has_control_path(&self) -> bool {
        self.wifi.is_connected()
            || (self.wifi.is_access_point_active() && self.listener.is_running())
    }

    pub fn state(&self) -> ConnectionState {
        self.ctx.state
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn station_up(&self) -> bool {
        self.wifi.is_connected()
    }

    pub fn session_mut(&mut self) -> &mut PublishSession<B::Mqtt> {
        &mut self.session
    }

    pub fn session(&self) -> &PublishSession<B::Mqtt> {
        &self.session
    }

    pub fn wifi(&self) -> &B::Wifi {
        &self.wifi
    }

    pub fn wifi_mut(&mut self) -> &mut B::Wifi {
        &mut self.wifi
    }

    pub fn store(&self) -> &CredentialStore<B::Region> {
        &self.store
    }

    pub fn listener(&self) -> &B::Listener {
        &self.listener
    }

    pub fn pause(&mut self, duration: Duration) {
        self.delay.delay(duration);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.ctx.state != state {
            info!("State: {} -> {state}", self.ctx.state);
            self.ctx.state = state;
        }
    }
}

/// The slice of the supervisor a provisioning handler may touch
struct ControlContext<'a, W, R> {
    wifi: &'a mut W,
    store: &'a mut CredentialStore<R>,
    ctx: &'a mut DeviceContext,
}

impl<W: Wifi, R: NvRegion> ProvisioningControl for ControlContext<'_, W, R> {
    fn scan(&mut self) -> Result<Vec<ScanEntry>, String> {
        self.wifi
            .scan()
            .map(|found| found.iter().map(|r| r.to_entry()).collect())
            .map_err(|e| e.to_string())
    }

    fn identity(&self) -> &DeviceIdentity {
        &self.ctx.identity
    }

    fn save_credentials(&mut self, credentials: &Credentials) -> Result<(), StoreError> {
        self.store.save(credentials)?;
        self.ctx.credentials = credentials.clone();
        Ok(())
    }

    fn has_credentials(&self) -> bool {
        self.ctx.credentials.is_provisioned()
    }
}
