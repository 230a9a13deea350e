//! Publish session to the message broker

use std::fmt;

use log::*;

use crate::config::BrokerConfig;
use crate::retry::{retry, Delay, RetryError, RetryPolicy};

/// Publish/subscribe transport, implemented by the board crate
pub trait MqttTransport {
    type Error: fmt::Display;

    /// One connect attempt. Returns once the broker accepted or refused it.
    fn connect(&mut self, client_id: &str, broker: &BrokerConfig) -> Result<(), Self::Error>;

    fn is_connected(&self) -> bool;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error>;

    /// Service the session (keepalives, inbound traffic). Called every
    /// telemetry iteration.
    fn pump(&mut self) {}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnError {
    #[error("station link not up after {attempts} polls")]
    StationTimeout { attempts: u32 },
    #[error("station connect failed: {0}")]
    Station(String),
    #[error("broker connect gave up after {attempts} attempts: {last}")]
    SessionExhausted { attempts: u32, last: String },
    #[error("broker connect cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publish session is not connected")]
    NotConnected,
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("publish failed: {0}")]
    Transport(String),
}

pub struct PublishSession<M> {
    transport: M,
    broker: BrokerConfig,
    client_id: String,
    policy: RetryPolicy,
}

impl<M: MqttTransport> PublishSession<M> {
    pub fn new(
        transport: M,
        broker: BrokerConfig,
        client_id: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            broker,
            client_id: client_id.into(),
            policy,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Connect, retrying on the session policy. `keep_going` is checked
    /// before each attempt so the caller can abandon the loop when the
    /// station link drops.
    pub fn connect(
        &mut self,
        delay: &mut impl Delay,
        keep_going: impl FnMut() -> bool,
    ) -> Result<(), ConnError> {
        if self.transport.is_connected() {
            return Ok(());
        }

        let transport = &mut self.transport;
        let broker = &self.broker;
        let client_id = self.client_id.as_str();
        let policy = &self.policy;

        info!("Connecting to MQTT broker {} as {client_id}", broker.url());
        let result = retry(policy, delay, keep_going, |attempt| {
            transport.connect(client_id, broker).map_err(|e| {
                warn!(
                    "MQTT connect attempt {attempt} failed: {e}, retrying in {}ms",
                    policy.interval_ms
                );
                e.to_string()
            })
        });

        match result {
            Ok(()) => {
                info!("MQTT connected");
                Ok(())
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                Err(ConnError::SessionExhausted { attempts, last })
            }
            Err(RetryError::Cancelled { attempts, .. }) => Err(ConnError::Cancelled { attempts }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if !self.transport.is_connected() {
            return Err(PublishError::NotConnected);
        }
        self.transport
            .publish(topic, payload)
            .map_err(|e| PublishError::Transport(e.to_string()))
    }

    pub fn pump(&mut self) {
        self.transport.pump();
    }

    pub fn transport(&self) -> &M {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut M {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct Broker {
        refuse: u32,
        connected: bool,
        attempts: Vec<String>,
        published: Vec<(String, Vec<u8>)>,
    }

    impl MqttTransport for Broker {
        type Error = String;

        fn connect(&mut self, client_id: &str, _broker: &BrokerConfig) -> Result<(), String> {
            self.attempts.push(client_id.to_string());
            if self.refuse > 0 {
                self.refuse -= 1;
                return Err("connection refused".to_string());
            }
            self.connected = true;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), String> {
            self.published.push((topic.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Sleeps(Vec<Duration>);

    impl Delay for Sleeps {
        fn delay(&mut self, duration: Duration) {
            self.0.push(duration);
        }
    }

    fn session(refuse: u32, policy: RetryPolicy) -> PublishSession<Broker> {
        PublishSession::new(
            Broker {
                refuse,
                ..Default::default()
            },
            BrokerConfig::default(),
            "plantnode-A4CF12F3B201",
            policy,
        )
    }

    #[test]
    fn retries_until_broker_accepts() {
        let mut session = session(3, RetryPolicy::unbounded(2000));
        let mut sleeps = Sleeps::default();
        session.connect(&mut sleeps, || true).unwrap();
        assert!(session.is_connected());
        assert_eq!(session.transport().attempts.len(), 4);
        assert_eq!(sleeps.0, vec![Duration::from_secs(2); 3]);
        assert!(session
            .transport()
            .attempts
            .iter()
            .all(|id| id == "plantnode-A4CF12F3B201"));
    }

    #[test]
    fn already_connected_is_a_no_op() {
        let mut session = session(0, RetryPolicy::unbounded(2000));
        session.transport_mut().connected = true;
        session.connect(&mut Sleeps::default(), || true).unwrap();
        assert!(session.transport().attempts.is_empty());
    }

    #[test]
    fn bounded_policy_reports_last_error() {
        let mut session = session(10, RetryPolicy::bounded(2, 10));
        let err = session.connect(&mut Sleeps::default(), || true).unwrap_err();
        assert_eq!(
            err,
            ConnError::SessionExhausted {
                attempts: 2,
                last: "connection refused".to_string()
            }
        );
    }

    #[test]
    fn station_loss_cancels_connect() {
        let mut session = session(u32::MAX, RetryPolicy::unbounded(2000));
        let mut polls = 0;
        let err = session
            .connect(&mut Sleeps::default(), || {
                polls += 1;
                polls <= 5
            })
            .unwrap_err();
        assert_eq!(err, ConnError::Cancelled { attempts: 5 });
    }

    #[test]
    fn publish_requires_session() {
        let mut session = session(0, RetryPolicy::unbounded(10));
        assert!(matches!(
            session.publish("/sensors/X", b"{}"),
            Err(PublishError::NotConnected)
        ));
        session.connect(&mut Sleeps::default(), || true).unwrap();
        session.publish("/sensors/X", b"{}").unwrap();
        assert_eq!(session.transport().published.len(), 1);
    }
}
