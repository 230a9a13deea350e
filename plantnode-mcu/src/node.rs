//! The cooperative control loop
//!
//! One call to [`Node::step`] does exactly one of: serve a provisioning
//! request, run a telemetry tick, or report that the device must restart.

use log::*;

use crate::board::{Board, Peripherals};
use crate::config::{ConfigError, NodeConfig};
use crate::supervisor::{ConnectionState, Flow, NetworkSupervisor};
use crate::telemetry::{TelemetryLoop, TickOutcome};

pub struct Node<B: Board> {
    supervisor: NetworkSupervisor<B>,
    telemetry: TelemetryLoop<B::Sensors>,
}

impl<B: Board> Node<B> {
    pub fn new(config: NodeConfig, peripherals: Peripherals<B>) -> Result<Self, ConfigError> {
        config.validate()?;
        let (supervisor, sensors) = NetworkSupervisor::new(config, peripherals);
        let telemetry = TelemetryLoop::new(sensors, &supervisor.context().identity);
        Ok(Self {
            supervisor,
            telemetry,
        })
    }

    pub fn boot(&mut self) -> Flow {
        self.supervisor.boot()
    }

    pub fn step(&mut self) -> Flow {
        match self.supervisor.state() {
            ConnectionState::Unprovisioned | ConnectionState::AccessPointMode => {
                self.supervisor.serve_once()
            }
            ConnectionState::ConnectingStation | ConnectionState::StationConnected => {
                self.supervisor.attempt_station()
            }
            ConnectionState::Registered => self.telemetry_tick(),
            ConnectionState::Unregistered => Flow::Restart,
        }
    }

    fn telemetry_tick(&mut self) -> Flow {
        let interval = self.supervisor.config().publish_interval();
        let station_up = self.supervisor.station_up();

        match self.telemetry.tick(self.supervisor.session_mut(), station_up) {
            TickOutcome::Published(_) => {
                self.supervisor.pause(interval);
                Flow::Continue
            }
            TickOutcome::Suppressed(reason) => {
                info!("Publish suppressed: {reason:?}");
                self.supervisor.housekeeping(reason)
            }
            TickOutcome::Failed(e) => {
                warn!("Publish failed: {e}");
                self.supervisor.pause(interval);
                Flow::Continue
            }
        }
    }

    /// Boot, then step until a restart is requested
    pub fn run(&mut self) {
        if self.boot() == Flow::Restart {
            return;
        }
        while self.step() == Flow::Continue {}
        warn!("Restart requested");
    }

    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn supervisor(&self) -> &NetworkSupervisor<B> {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut NetworkSupervisor<B> {
        &mut self.supervisor
    }

    pub fn telemetry(&self) -> &TelemetryLoop<B::Sensors> {
        &self.telemetry
    }
}
