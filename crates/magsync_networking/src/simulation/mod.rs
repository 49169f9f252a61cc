//! # Network Simulation
//!
//! Deterministic in-process links for exercising two sessions without
//! sockets.
//!
//! ## Features
//!
//! - Packet loss simulation
//! - Fixed latency, counted in ticks
//! - Seeded randomness (`ChaCha8Rng`): the same seed replays the same drops
//!
//! ## Modules
//!
//! - `scenario`: the bullet-sync exchange between a follower and an authority

mod scenario;

pub use scenario::{BulletSyncScenario, ScenarioConfig, ScenarioSummary, TickRecord};

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Link behaviour for one direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkConditions {
    /// Packet loss percentage (0-100).
    pub packet_loss_percent: u8,
    /// Ticks between send and delivery.
    pub latency_ticks: u64,
}

impl LinkConditions {
    /// No loss, delivered the next tick.
    pub const PERFECT: Self = Self {
        packet_loss_percent: 0,
        latency_ticks: 1,
    };

    /// One datagram in ten lost, like the classic bullet-sync demo.
    pub const LOSSY: Self = Self {
        packet_loss_percent: 10,
        latency_ticks: 1,
    };

    /// Heavy loss and a slow path.
    pub const POOR: Self = Self {
        packet_loss_percent: 30,
        latency_ticks: 4,
    };

    /// Returns true if the packet should be dropped.
    #[must_use]
    pub fn should_drop(&self, rng_value: u32) -> bool {
        (rng_value % 100) < u32::from(self.packet_loss_percent)
    }
}

impl Default for LinkConditions {
    fn default() -> Self {
        Self::LOSSY
    }
}

/// Link statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Datagrams handed to the link.
    pub sent: u64,
    /// Datagrams the link threw away.
    pub dropped: u64,
    /// Datagrams delivered.
    pub delivered: u64,
}

/// One direction of a simulated connection.
#[derive(Debug)]
pub struct LossyLink {
    conditions: LinkConditions,
    rng: ChaCha8Rng,
    /// `(deliver_at_tick, datagram)`, in send order.
    in_flight: VecDeque<(u64, Vec<u8>)>,
    stats: LinkStats,
}

impl LossyLink {
    /// Creates a link with its own seeded random stream.
    #[must_use]
    pub fn new(conditions: LinkConditions, seed: u64) -> Self {
        Self {
            conditions,
            rng: ChaCha8Rng::seed_from_u64(seed),
            in_flight: VecDeque::new(),
            stats: LinkStats::default(),
        }
    }

    /// Puts a datagram on the link at `tick`. Returns false if it was lost.
    pub fn send(&mut self, tick: u64, datagram: Vec<u8>) -> bool {
        self.stats.sent += 1;
        if self.conditions.should_drop(self.rng.gen()) {
            self.stats.dropped += 1;
            return false;
        }
        self.in_flight
            .push_back((tick + self.conditions.latency_ticks, datagram));
        true
    }

    /// Takes every datagram due by `tick`.
    pub fn deliver(&mut self, tick: u64) -> Vec<Vec<u8>> {
        let mut due = Vec::new();
        while self.in_flight.front().is_some_and(|(at, _)| *at <= tick) {
            if let Some((_, datagram)) = self.in_flight.pop_front() {
                due.push(datagram);
            }
        }
        self.stats.delivered += due.len() as u64;
        due
    }

    /// Returns true if nothing is in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Link conditions.
    #[must_use]
    pub const fn conditions(&self) -> LinkConditions {
        self.conditions
    }

    /// Link statistics.
    #[must_use]
    pub const fn stats(&self) -> &LinkStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_drop() {
        let conditions = LinkConditions::LOSSY;
        assert!(conditions.should_drop(5));
        assert!(!conditions.should_drop(10));
        assert!(conditions.should_drop(105));
        assert!(!LinkConditions::PERFECT.should_drop(0));
    }

    #[test]
    fn test_latency() {
        let mut link = LossyLink::new(
            LinkConditions {
                packet_loss_percent: 0,
                latency_ticks: 2,
            },
            1,
        );
        assert!(link.send(10, vec![1]));
        assert!(link.send(11, vec![2]));
        assert!(link.deliver(11).is_empty());
        assert_eq!(link.deliver(12), vec![vec![1]]);
        assert_eq!(link.deliver(20), vec![vec![2]]);
        assert!(link.is_idle());
    }

    #[test]
    fn test_same_seed_same_drops() {
        let conditions = LinkConditions {
            packet_loss_percent: 50,
            latency_ticks: 0,
        };
        let mut a = LossyLink::new(conditions, 7);
        let mut b = LossyLink::new(conditions, 7);
        let drops_a: Vec<bool> = (0..64).map(|tick| a.send(tick, vec![0])).collect();
        let drops_b: Vec<bool> = (0..64).map(|tick| b.send(tick, vec![0])).collect();
        assert_eq!(drops_a, drops_b);
        assert!(a.stats().dropped > 0);
        assert!(a.stats().dropped < 64);
    }
}
