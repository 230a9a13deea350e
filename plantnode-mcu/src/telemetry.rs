//! Sensor acquisition and the publish tick

use log::*;
use plantnode_proto::{telemetry_topic, DeviceIdentity, TelemetryPayload};

use crate::publish::{MqttTransport, PublishError, PublishSession};

/// Raw sensor access, implemented by the board crate
///
/// `None` means the sensor did not produce a reading this time.
pub trait SensorReader {
    fn temperature(&mut self) -> Option<f32>;

    fn humidity(&mut self) -> Option<f32>;

    /// Raw ADC value of the soil probe
    fn soil_moisture(&mut self) -> f32;

    fn light_lux(&mut self) -> f32;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub soil_moisture: f32,
    pub light_lux: f32,
}

impl SensorReading {
    /// Read every sensor once. A failed or non-finite reading is absent;
    /// it never aborts the reading as a whole.
    pub fn acquire(sensors: &mut impl SensorReader) -> Self {
        let temperature = finite(sensors.temperature());
        let humidity = finite(sensors.humidity());
        if temperature.is_none() || humidity.is_none() {
            warn!("Failed to read from DHT sensor");
        }

        Self {
            temperature,
            humidity,
            soil_moisture: sensors.soil_moisture(),
            light_lux: sensors.light_lux(),
        }
    }

    pub fn to_payload(&self) -> TelemetryPayload {
        TelemetryPayload {
            temp: self.temperature,
            humidity: self.humidity,
            soil: self.soil_moisture,
            light: self.light_lux,
        }
    }
}

fn finite(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    StationDown,
    SessionDown,
}

#[derive(Debug)]
pub enum TickOutcome {
    Published(SensorReading),
    Suppressed(SuppressReason),
    Failed(PublishError),
}

pub struct TelemetryLoop<S> {
    sensors: S,
    topic: String,
}

impl<S: SensorReader> TelemetryLoop<S> {
    pub fn new(sensors: S, identity: &DeviceIdentity) -> Self {
        Self {
            sensors,
            topic: telemetry_topic(identity),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// One publish attempt. Sensors are only read when both the station
    /// link and the publish session are up.
    pub fn tick<M: MqttTransport>(
        &mut self,
        session: &mut PublishSession<M>,
        station_up: bool,
    ) -> TickOutcome {
        session.pump();
        if !station_up {
            return TickOutcome::Suppressed(SuppressReason::StationDown);
        }
        if !session.is_connected() {
            return TickOutcome::Suppressed(SuppressReason::SessionDown);
        }

        let reading = SensorReading::acquire(&mut self.sensors);
        let payload = match reading.to_payload().to_bytes() {
            Ok(payload) => payload,
            Err(e) => return TickOutcome::Failed(e.into()),
        };

        if let Err(e) = session.publish(&self.topic, &payload) {
            return TickOutcome::Failed(e);
        }
        info!(
            "Published to {}: {}",
            self.topic,
            String::from_utf8_lossy(&payload)
        );
        TickOutcome::Published(reading)
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }
}
