//! plantnode firmware for ESP32
//!
//! Boots into the provisioning access point when no network is stored,
//! otherwise joins the stored network, checks registration with the API and
//! streams sensor readings to the MQTT broker.

mod config;
mod http;
mod mqtt;
mod nvs_region;
mod registration;
mod sensors;
mod wifi;

use std::time::Duration;

use esp_idf_svc::{
    eventloop::EspSystemEventLoop, hal::prelude::Peripherals, nvs::EspDefaultNvsPartition,
};
use log::*;
use plantnode_mcu::{Board, Node, StdDelay};

use crate::http::HttpListener;
use crate::mqtt::EspMqtt;
use crate::nvs_region::NvsRegion;
use crate::registration::EspHttpClient;
use crate::sensors::{SensorPins, Sensors};
use crate::wifi::Radio;

struct Esp32Board;

impl Board for Esp32Board {
    type Wifi = Radio;
    type Region = NvsRegion;
    type Http = EspHttpClient;
    type Mqtt = EspMqtt;
    type Listener = HttpListener;
    type Sensors = Sensors;
    type Delay = StdDelay;
}

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("plantnode v{}", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let sensors = Sensors::new(
        SensorPins {
            adc1: peripherals.adc1,
            soil: peripherals.pins.gpio34,
            i2c0: peripherals.i2c0,
            sda: peripherals.pins.gpio21,
            scl: peripherals.pins.gpio22,
            dht: peripherals.pins.gpio4,
        },
        config::SensorWiring::from_env(),
    )?;

    let region = NvsRegion::open(nvs.clone())?;
    let radio = Radio::new(peripherals.modem, sys_loop, nvs)?;

    let mut node = Node::<Esp32Board>::new(
        config::node_config(),
        plantnode_mcu::Peripherals {
            wifi: radio,
            region,
            http: EspHttpClient::new(Duration::from_secs(10)),
            mqtt: EspMqtt::new(),
            listener: HttpListener::new(),
            sensors,
            delay: StdDelay,
        },
    )?;

    node.run();
    restart_device();
}

fn restart_device() -> ! {
    info!("Restarting in 1 second...");
    std::thread::sleep(Duration::from_secs(1));
    unsafe {
        esp_idf_svc::sys::esp_restart();
    }
}
