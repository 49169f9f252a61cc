//! # Counter Convergence
//!
//! Keeps two copies of a magazine count in agreement over a lossy link.
//!
//! ```text
//!   Follower                              Authority
//!   ────────                              ─────────
//!   decrement()  ── fire(proposed) ──►   consume()
//!                                        echo(value)
//!   receive_authoritative(value)  ◄──────────┘
//!     InSync            → nothing
//!     Corrected{from,to}→ overwrite, corrective resend
//! ```
//!
//! ## Design
//!
//! - **Last writer wins**: no versions, the latest value received overwrites
//! - **Authority saturates**: never decrements below zero
//! - **Bounded corrections**: consecutive corrective resends are capped
//! - **Event dedupe**: resent fire events are recognized by id

use tracing::{info, warn};

/// Which side of the exchange a session plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Owns the authoritative count; decrements on received fire packets.
    Authority,
    /// Decrements optimistically, reconciles against the authority.
    Follower,
}

impl Role {
    /// Short name for log lines.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authority => "authority",
            Self::Follower => "follower",
        }
    }
}

/// Whether the local side may still originate application packets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterState {
    /// Count above zero.
    Active,
    /// Count at or below zero. Replies continue, new packets do not.
    Exhausted,
}

/// Result of comparing a received value against the local one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconcile {
    /// Values matched.
    InSync,
    /// Local value was overwritten.
    Corrected {
        /// Local value before the overwrite.
        from: i32,
        /// Value received.
        to: i32,
    },
}

impl Reconcile {
    /// Returns true if the local value changed.
    #[inline]
    #[must_use]
    pub const fn is_corrected(&self) -> bool {
        matches!(self, Self::Corrected { .. })
    }
}

/// One peer's copy of the synchronized count.
#[derive(Clone, Debug)]
pub struct SyncCounter {
    role: Role,
    value: i32,
    state: CounterState,
    /// `None` means unbounded.
    correction_limit: Option<u32>,
    consecutive_corrections: u32,
}

impl SyncCounter {
    /// Creates a counter starting at `initial`.
    #[must_use]
    pub const fn new(role: Role, initial: i32, correction_limit: Option<u32>) -> Self {
        Self {
            role,
            value: initial,
            state: state_for(initial),
            correction_limit,
            consecutive_corrections: 0,
        }
    }

    /// Current local value.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> i32 {
        self.value
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> CounterState {
        self.state
    }

    /// Role this counter plays.
    #[inline]
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns true once the count has run out.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self.state, CounterState::Exhausted)
    }

    /// Corrections since the last in-sync observation.
    #[inline]
    #[must_use]
    pub const fn consecutive_corrections(&self) -> u32 {
        self.consecutive_corrections
    }

    /// Spends one unit for a locally originated packet.
    ///
    /// Returns the new value, or `None` if already exhausted.
    pub fn decrement(&mut self) -> Option<i32> {
        if self.is_exhausted() {
            return None;
        }
        self.value -= 1;
        self.state = state_for(self.value);
        Some(self.value)
    }

    /// Gives back a unit spent by [`SyncCounter::decrement`] whose packet
    /// never left.
    pub fn refund(&mut self) {
        self.value = self.value.saturating_add(1);
        self.state = state_for(self.value);
    }

    /// Authority side: spends one unit for a received fire packet.
    ///
    /// Saturates at zero; returns the value to echo.
    pub fn consume(&mut self) -> i32 {
        self.value = self.value.saturating_sub(1).max(0);
        self.state = state_for(self.value);
        self.value
    }

    /// Applies a value received from the peer.
    ///
    /// A value above zero reactivates an exhausted counter.
    pub fn receive_authoritative(&mut self, value: i32) -> Reconcile {
        self.state = state_for(value);
        if value == self.value {
            self.consecutive_corrections = 0;
            return Reconcile::InSync;
        }
        let from = self.value;
        self.value = value;
        info!(
            role = self.role.as_str(),
            local = from,
            remote = value,
            "Counter mismatch, synchronizing"
        );
        Reconcile::Corrected { from, to: value }
    }

    /// Asks permission to send a corrective resend after a correction.
    ///
    /// Returns false once the consecutive-correction cap is reached; the
    /// count resets on the next in-sync observation.
    pub fn request_correction(&mut self) -> bool {
        if let Some(limit) = self.correction_limit {
            if self.consecutive_corrections >= limit {
                warn!(
                    role = self.role.as_str(),
                    limit,
                    value = self.value,
                    "Corrective resend cap reached, suppressing"
                );
                return false;
            }
        }
        self.consecutive_corrections += 1;
        true
    }
}

const fn state_for(value: i32) -> CounterState {
    if value > 0 {
        CounterState::Active
    } else {
        CounterState::Exhausted
    }
}

/// Remembers recently seen event ids so resent copies are not re-applied.
#[derive(Clone, Debug)]
pub struct EventDedupe {
    seen: Vec<Option<u16>>,
}

impl EventDedupe {
    /// Default window size.
    pub const WINDOW: usize = 256;

    /// Creates a window of `size` ids (at least one).
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            seen: vec![None; size.max(1)],
        }
    }

    /// Records `id`; returns false if it is already in the window.
    pub fn first_sighting(&mut self, id: u16) -> bool {
        let slot = usize::from(id) % self.seen.len();
        if self.seen[slot] == Some(id) {
            return false;
        }
        self.seen[slot] = Some(id);
        true
    }

    /// Forgets every id.
    pub fn clear(&mut self) {
        self.seen.iter_mut().for_each(|slot| *slot = None);
    }
}

impl Default for EventDedupe {
    fn default() -> Self {
        Self::new(Self::WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convergence_single_exchange() {
        let mut client = SyncCounter::new(Role::Follower, 30, Some(8));
        let mut server = SyncCounter::new(Role::Authority, 28, None);

        let echoed = server.value();
        let result = client.receive_authoritative(echoed);
        assert_eq!(result, Reconcile::Corrected { from: 30, to: 28 });
        assert!(client.request_correction());

        // The corrective probe's reply now matches: no further resend.
        let result = client.receive_authoritative(server.value());
        assert_eq!(result, Reconcile::InSync);
        assert_eq!(client.value(), 28);
        assert_eq!(client.consecutive_corrections(), 0);
    }

    #[test]
    fn test_exhaustion() {
        let mut counter = SyncCounter::new(Role::Follower, 1, None);
        assert_eq!(counter.decrement(), Some(0));
        assert_eq!(counter.state(), CounterState::Exhausted);
        assert_eq!(counter.decrement(), None);
        assert_eq!(counter.value(), 0);

        // Reconciliation still applies while exhausted.
        assert!(counter.receive_authoritative(3).is_corrected());
        assert_eq!(counter.state(), CounterState::Active);
        assert_eq!(counter.decrement(), Some(2));
    }

    #[test]
    fn test_refund_reactivates() {
        let mut counter = SyncCounter::new(Role::Follower, 1, None);
        assert_eq!(counter.decrement(), Some(0));
        counter.refund();
        assert_eq!(counter.value(), 1);
        assert_eq!(counter.state(), CounterState::Active);
    }

    #[test]
    fn test_receiving_zero_exhausts() {
        let mut counter = SyncCounter::new(Role::Follower, 5, None);
        counter.receive_authoritative(0);
        assert!(counter.is_exhausted());
    }

    #[test]
    fn test_authority_saturates() {
        let mut server = SyncCounter::new(Role::Authority, 1, None);
        assert_eq!(server.consume(), 0);
        assert_eq!(server.consume(), 0);
        assert!(server.is_exhausted());
    }

    #[test]
    fn test_correction_cap() {
        let mut client = SyncCounter::new(Role::Follower, 30, Some(2));
        client.receive_authoritative(29);
        assert!(client.request_correction());
        client.receive_authoritative(28);
        assert!(client.request_correction());
        client.receive_authoritative(27);
        assert!(!client.request_correction());

        client.receive_authoritative(27);
        assert!(client.request_correction());
    }

    #[test]
    fn test_unbounded_corrections() {
        let mut client = SyncCounter::new(Role::Follower, 1000, None);
        for value in (0..100).rev() {
            client.receive_authoritative(value);
            assert!(client.request_correction());
        }
    }

    #[test]
    fn test_dedupe_window() {
        let mut dedupe = EventDedupe::default();
        assert!(dedupe.first_sighting(7));
        assert!(!dedupe.first_sighting(7));
        assert!(dedupe.first_sighting(8));

        // 7 + 256 maps to the same slot and pushes 7 out.
        assert!(dedupe.first_sighting(263));
        assert!(dedupe.first_sighting(7));

        dedupe.clear();
        assert!(dedupe.first_sighting(8));
    }
}
