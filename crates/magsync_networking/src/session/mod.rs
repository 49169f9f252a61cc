//! # Sync Session
//!
//! One peer's complete state, driven one tick at a time.
//!
//! ## Tick Order
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ 1. inbound datagrams → endpoint.receive → packet handler   │
//! │ 2. endpoint.update(now)                                    │
//! │ 3. reconcile acks      (retire store entries)              │
//! │ 4. retransmit          (resend + re-key timed-out entries) │
//! │ 5. endpoint.clear_acks                                     │
//! │ 6. originate           (LocalAction::Fire → store)         │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Acks must be reconciled before the sweep, otherwise a packet acked this
//! tick would be resent needlessly. The ack list is cleared exactly once.

mod tick_loop;

pub use tick_loop::{TickLoop, TickStats};

use magsync_shared::{SessionConfig, SyncMode};
use tracing::{debug, info, warn};

use crate::endpoint::{Endpoint, SequenceNumber};
use crate::protocol::{CounterPacket, EventPacket, WirePacket};
use crate::reliability::{
    reconcile_acks, retransmit_timed_out, AckReport, OutstandingStore, RetransmitReport,
    RtoEstimator,
};
use crate::sync::{CounterState, EventDedupe, Reconcile, Role, SyncCounter};

/// Something the local application asks the session to do this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalAction {
    /// Spend one unit and send the packet that reports it.
    Fire,
}

/// What happened during one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    /// Datagrams handed in.
    pub datagrams: usize,
    /// Payloads the endpoint delivered to the handler.
    pub delivered: usize,
    /// Ack reconciliation outcome.
    pub acks: AckReport,
    /// Retransmission outcome.
    pub retransmits: RetransmitReport,
    /// Sequence of the packet originated this tick, if any.
    pub originated: Option<SequenceNumber>,
    /// Local counter after the tick.
    pub counter: i32,
    /// Counter state after the tick.
    pub state: CounterState,
    /// Store entries still awaiting an ack.
    pub outstanding: usize,
}

/// Session-lifetime counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Ticks executed.
    pub ticks: u64,
    /// Application packets originated.
    pub originated: u64,
    /// Fire requests refused because the counter was exhausted.
    pub refused: u64,
    /// Replies sent by the authority.
    pub replies: u64,
    /// Local value overwritten by a received one.
    pub corrections: u64,
    /// Corrective probes sent.
    pub probes_sent: u64,
    /// Corrective probes withheld by the cap.
    pub probes_suppressed: u64,
    /// Corrective probes skipped because a shot was still unanswered.
    pub probes_deferred: u64,
    /// Resent fire events recognized and not re-applied.
    pub duplicate_events: u64,
    /// Payloads that failed to decode.
    pub format_errors: u64,
    /// Retransmissions performed.
    pub retransmits: u64,
    /// Store entries retired by acks.
    pub retired: u64,
    /// Store entries overwritten before being acked.
    pub evictions: u64,
}

/// One peer: endpoint, outstanding store, RTO estimator and counter.
pub struct Session<E: Endpoint> {
    role: Role,
    mode: SyncMode,
    endpoint: E,
    store: OutstandingStore,
    estimator: RtoEstimator,
    counter: SyncCounter,
    dedupe: EventDedupe,
    event_name: String,
    next_event_id: u16,
    stats: SessionStats,
}

impl<E: Endpoint> Session<E> {
    /// Creates a session around an already constructed endpoint.
    pub fn new(config: &SessionConfig, role: Role, endpoint: E) -> Self {
        info!(
            role = role.as_str(),
            mode = ?config.mode,
            initial = config.initial_count,
            capacity = config.store_capacity,
            "Session started"
        );
        Self {
            role,
            mode: config.mode,
            endpoint,
            store: OutstandingStore::new(config.store_capacity),
            estimator: RtoEstimator::from_config(config),
            counter: SyncCounter::new(role, config.initial_count, config.corrective_resend_limit()),
            dedupe: EventDedupe::default(),
            event_name: config.event_name.clone(),
            next_event_id: 0,
            stats: SessionStats::default(),
        }
    }

    /// Runs one tick. See the module docs for the order of steps.
    pub fn tick<I, D>(&mut self, now: f64, inbound: I, action: Option<LocalAction>) -> TickReport
    where
        I: IntoIterator<Item = D>,
        D: AsRef<[u8]>,
    {
        self.stats.ticks += 1;

        let mut datagrams = 0;
        let mut delivered = 0;
        for datagram in inbound {
            datagrams += 1;
            if let Some(packet) = self.endpoint.receive(datagram.as_ref()) {
                delivered += 1;
                self.handle_payload(&packet.payload);
            }
        }

        self.endpoint.update(now);

        let acks = reconcile_acks(&self.endpoint, &mut self.store);
        self.stats.retired += acks.retired as u64;

        let retransmits =
            retransmit_timed_out(&mut self.endpoint, &mut self.store, &self.estimator, now);
        self.stats.retransmits += retransmits.resent as u64;

        self.endpoint.clear_acks();

        let originated = match action {
            Some(LocalAction::Fire) => self.originate(now),
            None => None,
        };

        TickReport {
            datagrams,
            delivered,
            acks,
            retransmits,
            originated,
            counter: self.counter.value(),
            state: self.counter.state(),
            outstanding: self.store.len(),
        }
    }

    /// Decodes a delivered payload and applies it to the counter.
    fn handle_payload(&mut self, payload: &[u8]) {
        let packet = match WirePacket::decode(payload) {
            Ok(packet) => packet,
            Err(err) => {
                self.stats.format_errors += 1;
                warn!(role = self.role.as_str(), %err, "Dropping malformed packet");
                return;
            }
        };

        match self.role {
            Role::Authority => self.answer(packet),
            Role::Follower => self.reconcile(packet),
        }
    }

    /// Authority: apply the packet, reply with the resulting value.
    fn answer(&mut self, packet: WirePacket) {
        let reply = match packet {
            WirePacket::Counter(counter) => {
                let value = if counter.is_probe() {
                    self.counter.value()
                } else {
                    self.counter.consume()
                };
                WirePacket::Counter(CounterPacket::new(value))
            }
            WirePacket::Event(mut event) => {
                if event.is_fire() {
                    if self.dedupe.first_sighting(event.id) {
                        self.counter.consume();
                    } else {
                        self.stats.duplicate_events += 1;
                        debug!(id = event.id, "Resent fire event, not re-applied");
                    }
                }
                event.counter = self.counter.value();
                WirePacket::Event(event)
            }
        };

        debug!(
            proposed = packet.counter(),
            authoritative = reply.counter(),
            "Replying with authoritative count"
        );
        self.endpoint.send(&reply.encode());
        self.stats.replies += 1;
    }

    /// Follower: adopt the authority's value, probe on bare mismatches.
    ///
    /// A reply reflects only the shots the authority had seen when it was
    /// sent. Shots still unacknowledged are discounted from it, so a reply
    /// overtaken by later local fire is not mistaken for a divergence.
    fn reconcile(&mut self, packet: WirePacket) {
        let in_flight = self.unanswered_shots();
        let expected = packet.counter().saturating_sub(in_flight).max(0);
        let Reconcile::Corrected { .. } = self.counter.receive_authoritative(expected) else {
            return;
        };
        self.stats.corrections += 1;

        // Event mode corrects with the next natural application packet.
        let WirePacket::Counter(_) = packet else {
            return;
        };
        if in_flight > 0 {
            // The reply to the unanswered shot carries a fresh value.
            self.stats.probes_deferred += 1;
            return;
        }
        if self.counter.request_correction() {
            self.endpoint.send(&CounterPacket::probe().encode());
            self.stats.probes_sent += 1;
        } else {
            self.stats.probes_suppressed += 1;
        }
    }

    /// Stored packets not covered by any ack received this tick.
    fn unanswered_shots(&self) -> i32 {
        let acks = self.endpoint.acks();
        let pending = self
            .store
            .iter()
            .filter(|entry| !acks.contains(&entry.sequence))
            .count();
        i32::try_from(pending).unwrap_or(i32::MAX)
    }

    /// Spends one unit and sends the packet reporting it.
    fn originate(&mut self, now: f64) -> Option<SequenceNumber> {
        let Some(value) = self.counter.decrement() else {
            self.stats.refused += 1;
            debug!(role = self.role.as_str(), "Counter exhausted, not firing");
            return None;
        };

        let packet = match self.mode {
            SyncMode::Bare => WirePacket::Counter(CounterPacket::new(value)),
            SyncMode::Event => {
                let id = self.next_event_id;
                self.next_event_id = self.next_event_id.wrapping_add(1);
                WirePacket::Event(EventPacket::fire(&self.event_name, id, value))
            }
        };

        let sequence = self.endpoint.next_sequence();
        self.endpoint.send(&packet.encode());
        if self.endpoint.next_sequence() == sequence {
            // Refused by the endpoint: nothing left, nothing spent.
            self.counter.refund();
            if let WirePacket::Event(event) = packet {
                self.next_event_id = event.id;
            }
            debug!(role = self.role.as_str(), "Endpoint refused packet, shot not spent");
            return None;
        }

        if let Some(evicted) = self.store.insert(sequence, packet, now) {
            self.stats.evictions += 1;
            debug!(
                sequence = evicted.sequence,
                retransmits = evicted.retransmit_count,
                "Evicted unacknowledged packet"
            );
        }
        self.stats.originated += 1;
        debug!(sequence, counter = value, "Sent");
        Some(sequence)
    }

    /// Next datagram to put on the wire.
    pub fn poll_transmit(&mut self) -> Option<Vec<u8>> {
        self.endpoint.poll_transmit()
    }

    /// Drains every queued datagram.
    pub fn drain_transmit(&mut self) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| self.endpoint.poll_transmit()).collect()
    }

    /// Role of this session.
    #[inline]
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Local counter.
    #[inline]
    #[must_use]
    pub const fn counter(&self) -> &SyncCounter {
        &self.counter
    }

    /// Outstanding-packet store.
    #[inline]
    #[must_use]
    pub const fn store(&self) -> &OutstandingStore {
        &self.store
    }

    /// Underlying endpoint.
    #[inline]
    #[must_use]
    pub const fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Underlying endpoint, mutably.
    #[inline]
    pub fn endpoint_mut(&mut self) -> &mut E {
        &mut self.endpoint
    }

    /// Session statistics.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Returns true when the counter is exhausted and nothing is in flight.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.counter.is_exhausted() && self.store.is_empty()
    }

    /// Tears the session down, dropping the endpoint.
    pub fn shutdown(self) -> SessionStats {
        info!(
            role = self.role.as_str(),
            counter = self.counter.value(),
            outstanding = self.store.len(),
            originated = self.stats.originated,
            retransmits = self.stats.retransmits,
            corrections = self.stats.corrections,
            "Session shut down"
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::ReliableEndpoint;
    use magsync_shared::EndpointConfig;

    const DT: f64 = 0.05;

    fn session(role: Role, mode: SyncMode, initial: i32) -> Session<ReliableEndpoint> {
        let config = SessionConfig {
            mode,
            initial_count: initial,
            ..SessionConfig::default()
        };
        let endpoint = ReliableEndpoint::create(EndpointConfig::named(role.as_str()), 0.0).unwrap();
        Session::new(&config, role, endpoint)
    }

    /// Follower ticks first, then the authority, with same-tick delivery
    /// towards the authority and next-tick delivery back.
    fn exchange(
        follower: &mut Session<ReliableEndpoint>,
        authority: &mut Session<ReliableEndpoint>,
        backlog: &mut Vec<Vec<u8>>,
        now: f64,
        action: Option<LocalAction>,
    ) {
        follower.tick(now, backlog.drain(..), action);
        let outbound = follower.drain_transmit();
        authority.tick(now, outbound, None);
        backlog.extend(authority.drain_transmit());
    }

    #[test]
    fn test_bare_fire_in_sync() {
        let mut follower = session(Role::Follower, SyncMode::Bare, 30);
        let mut authority = session(Role::Authority, SyncMode::Bare, 30);
        let mut backlog = Vec::new();

        exchange(&mut follower, &mut authority, &mut backlog, 0.0, Some(LocalAction::Fire));
        exchange(&mut follower, &mut authority, &mut backlog, DT, None);

        assert_eq!(follower.counter().value(), 29);
        assert_eq!(authority.counter().value(), 29);
        assert_eq!(follower.stats().corrections, 0);
        assert_eq!(follower.stats().probes_sent, 0);
        assert!(follower.store().is_empty());
    }

    #[test]
    fn test_divergent_counters_converge_with_one_probe() {
        let mut follower = session(Role::Follower, SyncMode::Bare, 30);
        let mut authority = session(Role::Authority, SyncMode::Bare, 28);
        let mut backlog = Vec::new();

        // Follower proposes 29, authority goes 28 -> 27.
        exchange(&mut follower, &mut authority, &mut backlog, 0.0, Some(LocalAction::Fire));
        // Follower corrects to 27 and probes; authority answers 27.
        exchange(&mut follower, &mut authority, &mut backlog, DT, None);
        exchange(&mut follower, &mut authority, &mut backlog, 2.0 * DT, None);
        exchange(&mut follower, &mut authority, &mut backlog, 3.0 * DT, None);

        assert_eq!(follower.counter().value(), 27);
        assert_eq!(authority.counter().value(), 27);
        assert_eq!(follower.stats().corrections, 1);
        assert_eq!(follower.stats().probes_sent, 1);
        assert_eq!(authority.stats().replies, 2);
    }

    #[test]
    fn test_divergence_while_firing_every_tick_probes_once() {
        let mut follower = session(Role::Follower, SyncMode::Bare, 30);
        let mut authority = session(Role::Authority, SyncMode::Bare, 28);
        let mut backlog = Vec::new();

        for tick in 0..10 {
            let now = f64::from(tick) * DT;
            exchange(&mut follower, &mut authority, &mut backlog, now, Some(LocalAction::Fire));
        }
        exchange(&mut follower, &mut authority, &mut backlog, 10.0 * DT, None);
        exchange(&mut follower, &mut authority, &mut backlog, 11.0 * DT, None);

        // The probe's answer overlaps the next shot and is discounted by it.
        assert_eq!(follower.counter().value(), 18);
        assert_eq!(authority.counter().value(), 18);
        assert_eq!(follower.stats().corrections, 1);
        assert_eq!(follower.stats().probes_sent, 1);
        assert_eq!(follower.stats().probes_suppressed, 0);
        assert!(follower.store().is_empty());
    }

    #[test]
    fn test_reply_overtaken_by_unanswered_shot_defers_probe() {
        let mut follower = session(Role::Follower, SyncMode::Bare, 30);
        let mut authority = session(Role::Authority, SyncMode::Bare, 28);

        // Two shots leave before any reply comes back.
        follower.tick(0.0, Vec::<Vec<u8>>::new(), Some(LocalAction::Fire));
        follower.tick(0.01, Vec::<Vec<u8>>::new(), Some(LocalAction::Fire));
        let shots = follower.drain_transmit();
        assert_eq!(shots.len(), 2);

        // Only the first shot reaches the authority: 28 -> 27.
        authority.tick(0.01, shots.into_iter().take(1), None);
        let report = follower.tick(0.02, authority.drain_transmit(), None);

        // 27 with one shot outstanding means the follower should hold 26.
        assert_eq!(report.acks.retired, 1);
        assert_eq!(follower.counter().value(), 26);
        assert_eq!(follower.stats().corrections, 1);
        assert_eq!(follower.stats().probes_deferred, 1);
        assert_eq!(follower.stats().probes_sent, 0);
    }

    #[test]
    fn test_refused_send_does_not_spend() {
        let config = SessionConfig {
            mode: SyncMode::Event,
            ..SessionConfig::default()
        };
        let mut endpoint_config = EndpointConfig::named("client");
        endpoint_config.max_packet_size = 9 + CounterPacket::SIZE;
        let endpoint = ReliableEndpoint::create(endpoint_config, 0.0).unwrap();
        let mut follower = Session::new(&config, Role::Follower, endpoint);

        let report = follower.tick(0.0, Vec::<Vec<u8>>::new(), Some(LocalAction::Fire));
        assert_eq!(report.originated, None);
        assert_eq!(report.counter, 30);
        assert_eq!(report.state, CounterState::Active);
        assert_eq!(follower.stats().originated, 0);
        assert!(follower.store().is_empty());
        assert!(follower.poll_transmit().is_none());
    }

    #[test]
    fn test_exhausted_follower_stops_firing() {
        let mut follower = session(Role::Follower, SyncMode::Event, 1);
        let mut authority = session(Role::Authority, SyncMode::Event, 1);
        let mut backlog = Vec::new();

        exchange(&mut follower, &mut authority, &mut backlog, 0.0, Some(LocalAction::Fire));
        assert!(follower.counter().is_exhausted());

        let report = follower.tick(DT, backlog.drain(..), Some(LocalAction::Fire));
        assert_eq!(report.originated, None);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.state, CounterState::Exhausted);
        assert_eq!(follower.stats().refused, 1);
        assert!(follower.is_finished());
        assert_eq!(authority.counter().value(), 0);
    }

    #[test]
    fn test_resent_event_not_applied_twice() {
        let mut follower = session(Role::Follower, SyncMode::Event, 30);
        let mut authority = session(Role::Authority, SyncMode::Event, 30);

        follower.tick(0.0, Vec::<Vec<u8>>::new(), Some(LocalAction::Fire));
        authority.tick(0.0, follower.drain_transmit(), None);
        assert_eq!(authority.counter().value(), 29);
        // Reply lost: the follower never sees the ack and resends.
        authority.drain_transmit();

        let report = follower.tick(1.0, Vec::<Vec<u8>>::new(), None);
        assert_eq!(report.retransmits.resent, 1);
        authority.tick(1.0, follower.drain_transmit(), None);

        assert_eq!(authority.counter().value(), 29);
        assert_eq!(authority.stats().duplicate_events, 1);
        assert_eq!(authority.stats().replies, 2);

        // The echo of the resent copy retires the re-keyed entry.
        let report = follower.tick(1.0 + DT, authority.drain_transmit(), None);
        assert_eq!(report.acks.retired, 1);
        assert!(follower.store().is_empty());
        assert_eq!(follower.counter().value(), 29);
    }

    #[test]
    fn test_malformed_payload_dropped() {
        let mut follower = session(Role::Follower, SyncMode::Bare, 30);
        let mut authority = session(Role::Authority, SyncMode::Bare, 30);

        follower.endpoint_mut().send(&[1, 2, 3]);
        let report = authority.tick(0.0, follower.drain_transmit(), None);
        assert_eq!(report.delivered, 1);
        assert_eq!(authority.stats().format_errors, 1);
        assert_eq!(authority.counter().value(), 30);
        assert_eq!(authority.stats().replies, 0);
    }

    #[test]
    fn test_shutdown_returns_stats() {
        let mut follower = session(Role::Follower, SyncMode::Event, 30);
        follower.tick(0.0, Vec::<Vec<u8>>::new(), Some(LocalAction::Fire));
        let stats = follower.shutdown();
        assert_eq!(stats.originated, 1);
        assert_eq!(stats.ticks, 1);
    }
}
