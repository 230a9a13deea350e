//! Board capability bundle
//!
//! A board crate names its concrete drivers once through [`Board`] and hands
//! them over in a [`Peripherals`] value; the node takes ownership of all of
//! them.

use crate::provisioning::RequestSource;
use crate::publish::MqttTransport;
use crate::registration::HttpClient;
use crate::retry::Delay;
use crate::storage::NvRegion;
use crate::telemetry::SensorReader;
use crate::wifi::Wifi;

pub trait Board {
    type Wifi: Wifi;
    type Region: NvRegion;
    type Http: HttpClient;
    type Mqtt: MqttTransport;
    type Listener: RequestSource;
    type Sensors: SensorReader;
    type Delay: Delay;
}

pub struct Peripherals<B: Board> {
    pub wifi: B::Wifi,
    pub region: B::Region,
    pub http: B::Http,
    pub mqtt: B::Mqtt,
    pub listener: B::Listener,
    pub sensors: B::Sensors,
    pub delay: B::Delay,
}
