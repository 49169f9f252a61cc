//! Bullet-sync scenario: a follower fires its magazine at an authority over
//! a pair of lossy links until both agree it is empty.

use magsync_shared::{EndpointConfig, SessionConfig, TICK_RATE};
use tracing::info;

use super::{LinkConditions, LinkStats, LossyLink};
use crate::endpoint::ReliableEndpoint;
use crate::error::EndpointError;
use crate::session::{LocalAction, Session, SessionStats, TickReport};
use crate::sync::Role;

/// Scenario parameters.
#[derive(Clone, Debug)]
pub struct ScenarioConfig {
    /// Settings shared by both sessions.
    pub session: SessionConfig,
    /// Conditions applied to both directions.
    pub conditions: LinkConditions,
    /// Seed for the client→server link; the reverse link uses `seed + 1`.
    pub seed: u64,
    /// Give up after this many ticks.
    pub max_ticks: u64,
    /// Simulated seconds per tick.
    pub tick_secs: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            conditions: LinkConditions::default(),
            seed: 42,
            max_ticks: 2000,
            tick_secs: 1.0 / f64::from(TICK_RATE),
        }
    }
}

/// Both sides' view of one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickRecord {
    /// Tick number, from zero.
    pub tick: u64,
    /// Follower report.
    pub client: TickReport,
    /// Authority report.
    pub server: TickReport,
}

/// Final state of a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScenarioSummary {
    /// Ticks executed.
    pub ticks: u64,
    /// Follower's final count.
    pub client_counter: i32,
    /// Authority's final count.
    pub server_counter: i32,
    /// Follower is exhausted, drained, and nothing is in flight.
    pub finished: bool,
    /// Follower statistics.
    pub client_stats: SessionStats,
    /// Authority statistics.
    pub server_stats: SessionStats,
    /// Client→server link.
    pub uplink: LinkStats,
    /// Server→client link.
    pub downlink: LinkStats,
}

impl ScenarioSummary {
    /// Returns true if both counters agree.
    #[must_use]
    pub const fn converged(&self) -> bool {
        self.client_counter == self.server_counter
    }
}

/// Two sessions wired together through simulated links.
pub struct BulletSyncScenario {
    config: ScenarioConfig,
    client: Session<ReliableEndpoint>,
    server: Session<ReliableEndpoint>,
    uplink: LossyLink,
    downlink: LossyLink,
    tick: u64,
}

impl BulletSyncScenario {
    /// Builds both sessions.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Init`] if either endpoint cannot be created.
    pub fn new(config: ScenarioConfig, endpoint: &EndpointConfig) -> Result<Self, EndpointError> {
        let client_endpoint = ReliableEndpoint::create(
            EndpointConfig {
                name: "client".to_string(),
                ..endpoint.clone()
            },
            0.0,
        )?;
        let server_endpoint = ReliableEndpoint::create(
            EndpointConfig {
                name: "server".to_string(),
                ..endpoint.clone()
            },
            0.0,
        )?;

        Ok(Self {
            client: Session::new(&config.session, Role::Follower, client_endpoint),
            server: Session::new(&config.session, Role::Authority, server_endpoint),
            uplink: LossyLink::new(config.conditions, config.seed),
            downlink: LossyLink::new(config.conditions, config.seed.wrapping_add(1)),
            tick: 0,
            config,
        })
    }

    /// Follower session.
    #[must_use]
    pub const fn client(&self) -> &Session<ReliableEndpoint> {
        &self.client
    }

    /// Authority session.
    #[must_use]
    pub const fn server(&self) -> &Session<ReliableEndpoint> {
        &self.server
    }

    /// Returns true once the follower is done and the links are empty.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.client.is_finished() && self.uplink.is_idle() && self.downlink.is_idle()
    }

    /// Runs one tick: follower first, then authority.
    ///
    /// The follower fires whenever its counter is active.
    pub fn step(&mut self) -> TickRecord {
        let tick = self.tick;
        let now = tick as f64 * self.config.tick_secs;

        let action = (!self.client.counter().is_exhausted()).then_some(LocalAction::Fire);
        let client = self.client.tick(now, self.downlink.deliver(tick), action);
        for datagram in self.client.drain_transmit() {
            self.uplink.send(tick, datagram);
        }

        let server = self.server.tick(now, self.uplink.deliver(tick), None);
        for datagram in self.server.drain_transmit() {
            self.downlink.send(tick, datagram);
        }

        self.tick += 1;
        TickRecord {
            tick,
            client,
            server,
        }
    }

    /// Steps until finished or out of ticks, handing each record to `observe`.
    pub fn run_with(&mut self, mut observe: impl FnMut(&TickRecord)) -> ScenarioSummary {
        while self.tick < self.config.max_ticks && !self.is_finished() {
            let record = self.step();
            observe(&record);
        }
        let summary = self.summary();
        info!(
            ticks = summary.ticks,
            client = summary.client_counter,
            server = summary.server_counter,
            finished = summary.finished,
            "Scenario complete"
        );
        summary
    }

    /// Steps until finished or out of ticks.
    pub fn run(&mut self) -> ScenarioSummary {
        self.run_with(|_| {})
    }

    /// Current state as a summary.
    #[must_use]
    pub fn summary(&self) -> ScenarioSummary {
        ScenarioSummary {
            ticks: self.tick,
            client_counter: self.client.counter().value(),
            server_counter: self.server.counter().value(),
            finished: self.is_finished(),
            client_stats: *self.client.stats(),
            server_stats: *self.server.stats(),
            uplink: *self.uplink.stats(),
            downlink: *self.downlink.stats(),
        }
    }

    /// Shuts both sessions down and returns the final summary.
    pub fn finish(self) -> ScenarioSummary {
        let summary = self.summary();
        self.client.shutdown();
        self.server.shutdown();
        summary
    }
}
