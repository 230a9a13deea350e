//! Sensor drivers: soil probe on ADC1, BH1750 light meter on I2C, DHT11/22
//!
//! A light or soil read that fails reports `-1.0` so the sample still goes
//! out. The DHT reports `None`.

use bh1750_embedded::blocking::Bh1750;
use bh1750_embedded::{Address, Resolution};
use esp_idf_hal::adc::attenuation::DB_11;
use esp_idf_hal::adc::oneshot::config::AdcChannelConfig;
use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_hal::adc::ADC1;
use esp_idf_hal::delay::{Ets, FreeRtos};
use esp_idf_hal::gpio::{Gpio21, Gpio22, Gpio34, Gpio4, InputOutput, PinDriver, Pull};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver, I2C0};
use esp_idf_hal::units::Hertz;
use log::*;
use plantnode_mcu::SensorReader;

use crate::config::{DhtKind, SensorWiring};

/// BH1750 address with the ADDR pin pulled high
const BH1750_ADDR_HIGH: u8 = 0x5C;

/// Minimum time between two DHT conversations
const DHT_MIN_INTERVAL_US: i64 = 2_000_000;

const FAILED: f32 = -1.0;

pub struct SensorPins {
    pub adc1: ADC1,
    pub soil: Gpio34,
    pub i2c0: I2C0,
    pub sda: Gpio21,
    pub scl: Gpio22,
    pub dht: Gpio4,
}

pub struct Sensors {
    soil: AdcChannelDriver<'static, Gpio34, AdcDriver<'static, ADC1>>,
    light: Bh1750<I2cDriver<'static>, FreeRtos>,
    dht: Dht,
}

impl Sensors {
    pub fn new(pins: SensorPins, wiring: SensorWiring) -> anyhow::Result<Self> {
        let adc = AdcDriver::new(pins.adc1)?;
        let soil = AdcChannelDriver::new(
            adc,
            pins.soil,
            &AdcChannelConfig {
                attenuation: DB_11,
                ..Default::default()
            },
        )?;

        let i2c = I2cDriver::new(
            pins.i2c0,
            pins.sda,
            pins.scl,
            &I2cConfig::new().baudrate(Hertz(wiring.i2c_hz.max(1))),
        )?;
        let address = if wiring.bh1750_address == BH1750_ADDR_HIGH {
            Address::High
        } else {
            Address::Low
        };
        let light = Bh1750::new(i2c, FreeRtos, address);

        let dht = Dht::new(PinDriver::input_output_od(pins.dht)?, wiring.dht)?;

        info!("Sensors ready (DHT {:?}, BH1750 at {:#04x})", wiring.dht, wiring.bh1750_address);
        Ok(Self { soil, light, dht })
    }
}

impl SensorReader for Sensors {
    fn temperature(&mut self) -> Option<f32> {
        self.dht.sample().map(|s| s.temperature)
    }

    fn humidity(&mut self) -> Option<f32> {
        // temperature() ran first in the same acquisition, so this is cached
        self.dht.sample().map(|s| s.humidity)
    }

    fn soil_moisture(&mut self) -> f32 {
        match self.soil.read() {
            Ok(raw) => f32::from(raw),
            Err(e) => {
                warn!("Soil probe read failed: {e}");
                FAILED
            }
        }
    }

    fn light_lux(&mut self) -> f32 {
        match self.light.one_time_measurement(Resolution::High) {
            Ok(lux) => lux,
            Err(e) => {
                warn!("BH1750 one_time_measurement failed: {e:?}");
                FAILED
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DhtSample {
    temperature: f32,
    humidity: f32,
}

struct Dht {
    pin: PinDriver<'static, Gpio4, InputOutput>,
    kind: DhtKind,
    last: Option<DhtSample>,
    last_at: Option<i64>,
}

impl Dht {
    fn new(mut pin: PinDriver<'static, Gpio4, InputOutput>, kind: DhtKind) -> anyhow::Result<Self> {
        pin.set_pull(Pull::Up)?;
        pin.set_high()?;
        Ok(Self {
            pin,
            kind,
            last: None,
            last_at: None,
        })
    }

    /// A fresh sample, or the cached one while the sensor needs rest
    fn sample(&mut self) -> Option<DhtSample> {
        let now = now_us();
        if let Some(at) = self.last_at {
            if now - at < DHT_MIN_INTERVAL_US {
                return self.last;
            }
        }

        self.last_at = Some(now);
        self.last = match self.read_frame() {
            Ok(frame) => Some(self.decode(frame)),
            Err(e) => {
                debug!("DHT read failed: {e}");
                None
            }
        };
        self.last
    }

    fn read_frame(&mut self) -> anyhow::Result<[u8; 5]> {
        // start signal: hold low, then release
        self.pin.set_low()?;
        match self.kind {
            DhtKind::Dht11 => FreeRtos::delay_ms(20),
            DhtKind::Dht22 => Ets::delay_us(1_100),
        }
        self.pin.set_high()?;
        Ets::delay_us(30);

        // response: ~80 us low, ~80 us high, then the first bit
        self.wait_level(false, 100)?;
        self.wait_level(true, 100)?;
        self.wait_level(false, 100)?;

        let mut frame = [0u8; 5];
        for bit in 0..40 {
            self.wait_level(true, 80)?;
            let high = self.wait_level(false, 100)?;
            if high > 40 {
                frame[bit / 8] |= 0x80 >> (bit % 8);
            }
        }

        let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        if sum != frame[4] {
            anyhow::bail!("checksum mismatch");
        }
        Ok(frame)
    }

    /// Spin until the line reaches `high`, returning the microseconds spent
    fn wait_level(&self, high: bool, timeout_us: i64) -> anyhow::Result<i64> {
        let started = now_us();
        loop {
            if self.pin.is_high() == high {
                return Ok(now_us() - started);
            }
            if now_us() - started > timeout_us {
                anyhow::bail!("timed out waiting for {}", if high { "high" } else { "low" });
            }
        }
    }

    fn decode(&self, frame: [u8; 5]) -> DhtSample {
        match self.kind {
            DhtKind::Dht11 => DhtSample {
                humidity: f32::from(frame[0]) + f32::from(frame[1]) / 10.0,
                temperature: f32::from(frame[2]) + f32::from(frame[3] & 0x7f) / 10.0,
            },
            DhtKind::Dht22 => {
                let humidity = f32::from(u16::from_be_bytes([frame[0], frame[1]])) / 10.0;
                let magnitude = f32::from(u16::from_be_bytes([frame[2] & 0x7f, frame[3]])) / 10.0;
                let temperature = if frame[2] & 0x80 != 0 {
                    -magnitude
                } else {
                    magnitude
                };
                DhtSample {
                    temperature,
                    humidity,
                }
            }
        }
    }
}

fn now_us() -> i64 {
    // SAFETY: reads the monotonic system timer
    unsafe { esp_idf_svc::sys::esp_timer_get_time() }
}
