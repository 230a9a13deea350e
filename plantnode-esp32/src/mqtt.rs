//! MQTT transport on the esp-idf client
//!
//! The esp-idf client reconnects on its own once created; `connect` creates
//! it on first use and afterwards only waits for the broker to accept.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use embedded_svc::mqtt::client::{EventPayload, QoS};
use esp_idf_svc::mqtt::client::{EspMqttClient, EspMqttConnection, MqttClientConfiguration};
use log::*;
use plantnode_mcu::{BrokerConfig, MqttTransport};

/// How long one connect attempt waits for the broker
const CONNECT_WAIT: Duration = Duration::from_secs(5);

pub struct EspMqtt {
    client: Option<EspMqttClient<'static>>,
    connected: Arc<AtomicBool>,
}

impl Default for EspMqtt {
    fn default() -> Self {
        Self::new()
    }
}

impl EspMqtt {
    pub fn new() -> Self {
        Self {
            client: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    fn create(&mut self, client_id: &str, broker: &BrokerConfig) -> anyhow::Result<()> {
        let url = broker.url();
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            username: broker.username.as_deref(),
            password: broker.password.as_deref(),
            ..Default::default()
        };
        let (client, connection) = EspMqttClient::new(&url, &conf)?;
        spawn_event_loop(connection, self.connected.clone())?;
        self.client = Some(client);
        Ok(())
    }
}

fn spawn_event_loop(mut connection: EspMqttConnection, connected: Arc<AtomicBool>) -> anyhow::Result<()> {
    thread::Builder::new()
        .name("mqtt-events".into())
        .stack_size(6 * 1024)
        .spawn(move || {
            while let Ok(event) = connection.next() {
                match event.payload() {
                    EventPayload::Connected(_) => {
                        connected.store(true, Ordering::Relaxed);
                    }
                    EventPayload::Disconnected => {
                        warn!("MQTT disconnected");
                        connected.store(false, Ordering::Relaxed);
                    }
                    EventPayload::Error(e) => warn!("MQTT error: {e:?}"),
                    _ => {}
                }
            }
            connected.store(false, Ordering::Relaxed);
            info!("MQTT connection closed");
        })?;
    Ok(())
}

impl MqttTransport for EspMqtt {
    type Error = anyhow::Error;

    fn connect(&mut self, client_id: &str, broker: &BrokerConfig) -> anyhow::Result<()> {
        if self.client.is_none() {
            self.create(client_id, broker)?;
        }

        let started = Instant::now();
        while !self.connected.load(Ordering::Relaxed) {
            if started.elapsed() > CONNECT_WAIT {
                return Err(anyhow!("broker did not accept within {CONNECT_WAIT:?}"));
            }
            thread::sleep(Duration::from_millis(100));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| anyhow!("MQTT client not created"))?;
        client.publish(topic, QoS::AtMostOnce, false, payload)?;
        Ok(())
    }
}
