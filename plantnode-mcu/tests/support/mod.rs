//! In-memory board for driving a node on the host
//!
//! Every fake shares one `World`, so a test can poke at the radio, the
//! broker or the flash while the node owns the drivers.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use plantnode_mcu::{
    Board, BrokerConfig, CredentialStore, Credentials, Delay, HttpClient, IpInfo, MqttTransport,
    Node, NodeConfig, NvRegion, Peripherals, Request, RequestSource, Response, RetryPolicy,
    ScanResult, SensorReader, Wifi, WifiStatus,
};
use plantnode_mcu::storage::REGION_SIZE;
use plantnode_proto::SecurityKind;

pub const MAC: [u8; 6] = [0xA4, 0xCF, 0x12, 0xF3, 0xB2, 0x01];
pub const IDENTITY: &str = "A4CF12F3B201";
pub const AP_SSID: &str = "PlantNode-A4CF1";
pub const API: &str = "http://authority.test";

pub struct World {
    // radio
    pub networks: Vec<(String, String)>,
    pub scan: Vec<ScanResult>,
    pub station: Option<String>,
    pub joins: Vec<String>,
    pub ap: Option<String>,
    pub ap_starts: u32,
    // flash
    pub region: [u8; REGION_SIZE],
    // registration authority
    pub registration: Result<u16, String>,
    pub registration_urls: Vec<String>,
    // broker
    pub broker_up: bool,
    pub session: bool,
    pub session_connects: u32,
    pub published: Vec<(String, Vec<u8>)>,
    // access point listener
    pub listening: bool,
    pub inbox: VecDeque<Request>,
    pub responses: Vec<Response>,
    // sensors
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    // clock
    pub sleeps: Vec<Duration>,
    /// Next sleep takes the network away for good
    pub lose_network_on_sleep: bool,
}

impl World {
    fn new() -> Self {
        Self {
            networks: Vec::new(),
            scan: vec![
                ScanResult {
                    ssid: "garden".into(),
                    channel: 6,
                    rssi: -48,
                    security: SecurityKind::Wpa2,
                },
                ScanResult {
                    ssid: "cafe".into(),
                    channel: 11,
                    rssi: -80,
                    security: SecurityKind::Open,
                },
            ],
            station: None,
            joins: Vec::new(),
            ap: None,
            ap_starts: 0,
            region: [0u8; REGION_SIZE],
            registration: Ok(200),
            registration_urls: Vec::new(),
            broker_up: true,
            session: false,
            session_connects: 0,
            published: Vec::new(),
            listening: false,
            inbox: VecDeque::new(),
            responses: Vec::new(),
            temperature: Some(21.5),
            humidity: Some(41.0),
            sleeps: Vec::new(),
            lose_network_on_sleep: false,
        }
    }

    pub fn drop_station(&mut self) {
        self.station = None;
        self.session = false;
    }
}

pub type Shared = Rc<RefCell<World>>;

pub struct FakeWifi(Shared);

impl Wifi for FakeWifi {
    type Error = String;

    fn mac_address(&self) -> [u8; 6] {
        MAC
    }

    fn scan(&mut self) -> Result<Vec<ScanResult>, String> {
        Ok(self.0.borrow().scan.clone())
    }

    fn begin_station(&mut self, ssid: &str, password: &str) -> Result<(), String> {
        let mut world = self.0.borrow_mut();
        world.joins.push(ssid.to_string());
        let known = world
            .networks
            .iter()
            .any(|(s, p)| s == ssid && p == password);
        world.station = known.then(|| ssid.to_string());
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), String> {
        self.0.borrow_mut().station = None;
        Ok(())
    }

    fn status(&self) -> WifiStatus {
        if self.0.borrow().station.is_some() {
            WifiStatus::Connected
        } else {
            WifiStatus::Disconnected
        }
    }

    fn ip_info(&self) -> Option<IpInfo> {
        self.0.borrow().station.as_ref().map(|_| IpInfo {
            ip: [192, 168, 1, 40],
            gateway: [192, 168, 1, 1],
            netmask: [255, 255, 255, 0],
        })
    }

    fn start_access_point(&mut self, ssid: &str, _password: &str) -> Result<(), String> {
        let mut world = self.0.borrow_mut();
        world.ap = Some(ssid.to_string());
        world.ap_starts += 1;
        Ok(())
    }

    fn stop_access_point(&mut self) -> Result<(), String> {
        self.0.borrow_mut().ap = None;
        Ok(())
    }

    fn is_access_point_active(&self) -> bool {
        self.0.borrow().ap.is_some()
    }
}

pub struct MemRegion(Shared);

impl NvRegion for MemRegion {
    type Error = String;

    fn read(&self, image: &mut [u8; REGION_SIZE]) -> Result<(), String> {
        *image = self.0.borrow().region;
        Ok(())
    }

    fn commit(&mut self, image: &[u8; REGION_SIZE]) -> Result<(), String> {
        self.0.borrow_mut().region = *image;
        Ok(())
    }
}

pub struct FakeHttp(Shared);

impl HttpClient for FakeHttp {
    type Error = String;

    fn get(&mut self, url: &str) -> Result<u16, String> {
        let mut world = self.0.borrow_mut();
        world.registration_urls.push(url.to_string());
        world.registration.clone()
    }
}

pub struct FakeMqtt(Shared);

impl MqttTransport for FakeMqtt {
    type Error = String;

    fn connect(&mut self, _client_id: &str, _broker: &BrokerConfig) -> Result<(), String> {
        let mut world = self.0.borrow_mut();
        world.session_connects += 1;
        if world.broker_up && world.station.is_some() {
            world.session = true;
            Ok(())
        } else {
            Err("connection refused".to_string())
        }
    }

    fn is_connected(&self) -> bool {
        self.0.borrow().session
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), String> {
        self.0
            .borrow_mut()
            .published
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }
}

pub struct FakeListener(Shared);

impl RequestSource for FakeListener {
    type Error = String;

    fn start(&mut self) -> Result<(), String> {
        self.0.borrow_mut().listening = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.0.borrow_mut().listening = false;
    }

    fn is_running(&self) -> bool {
        self.0.borrow().listening
    }

    fn next_request(&mut self, _timeout: Duration) -> Option<Request> {
        let mut world = self.0.borrow_mut();
        if !world.listening {
            return None;
        }
        world.inbox.pop_front()
    }

    fn respond(&mut self, response: Response) {
        self.0.borrow_mut().responses.push(response);
    }
}

pub struct FakeSensors(Shared);

impl SensorReader for FakeSensors {
    fn temperature(&mut self) -> Option<f32> {
        self.0.borrow().temperature
    }

    fn humidity(&mut self) -> Option<f32> {
        self.0.borrow().humidity
    }

    fn soil_moisture(&mut self) -> f32 {
        612.0
    }

    fn light_lux(&mut self) -> f32 {
        153.5
    }
}

pub struct NoDelay(Shared);

impl Delay for NoDelay {
    fn delay(&mut self, duration: Duration) {
        let mut world = self.0.borrow_mut();
        world.sleeps.push(duration);
        if world.lose_network_on_sleep {
            world.lose_network_on_sleep = false;
            world.networks.clear();
            world.drop_station();
        }
    }
}

pub struct TestBoard;

impl Board for TestBoard {
    type Wifi = FakeWifi;
    type Region = MemRegion;
    type Http = FakeHttp;
    type Mqtt = FakeMqtt;
    type Listener = FakeListener;
    type Sensors = FakeSensors;
    type Delay = NoDelay;
}

pub fn test_config() -> NodeConfig {
    NodeConfig {
        api_base_url: API.to_string(),
        station_retry: RetryPolicy::bounded(3, 1000),
        ..NodeConfig::default()
    }
}

pub struct Rig {
    pub world: Shared,
}

impl Rig {
    pub fn new() -> Self {
        Self {
            world: Rc::new(RefCell::new(World::new())),
        }
    }

    /// A network the radio can join
    pub fn with_network(self, ssid: &str, password: &str) -> Self {
        self.world
            .borrow_mut()
            .networks
            .push((ssid.to_string(), password.to_string()));
        self
    }

    /// Credentials already in flash from an earlier boot
    pub fn with_stored(self, ssid: &str, password: &str) -> Self {
        self.store()
            .save(&Credentials::new(ssid, password).unwrap())
            .unwrap();
        self
    }

    pub fn peripherals(&self) -> Peripherals<TestBoard> {
        Peripherals {
            wifi: FakeWifi(self.world.clone()),
            region: MemRegion(self.world.clone()),
            http: FakeHttp(self.world.clone()),
            mqtt: FakeMqtt(self.world.clone()),
            listener: FakeListener(self.world.clone()),
            sensors: FakeSensors(self.world.clone()),
            delay: NoDelay(self.world.clone()),
        }
    }

    pub fn node(&self) -> Node<TestBoard> {
        Node::new(test_config(), self.peripherals()).unwrap()
    }

    /// A view on the same flash the node writes to
    pub fn store(&self) -> CredentialStore<MemRegion> {
        CredentialStore::new(MemRegion(self.world.clone()))
    }

    pub fn send(&self, request: Request) {
        self.world.borrow_mut().inbox.push_back(request);
    }

    pub fn last_response(&self) -> Response {
        self.world
            .borrow()
            .responses
            .last()
            .cloned()
            .expect("no response recorded")
    }
}
