//! Retires store entries the endpoint reports as acknowledged.

use tracing::trace;

use super::store::OutstandingStore;
use crate::endpoint::Endpoint;

/// Outcome of one reconciliation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AckReport {
    /// Acks the endpoint reported this tick.
    pub acks_seen: usize,
    /// Store entries those acks retired.
    pub retired: usize,
}

impl AckReport {
    /// Acks that matched nothing in the store.
    #[inline]
    #[must_use]
    pub const fn spurious(&self) -> usize {
        self.acks_seen - self.retired
    }
}

/// Applies the endpoint's accumulated acks to the store.
///
/// Does not clear the endpoint's ack list; the tick driver does that once
/// the scheduler has also run.
pub fn reconcile_acks<E: Endpoint>(endpoint: &E, store: &mut OutstandingStore) -> AckReport {
    let acks = endpoint.acks();
    let mut report = AckReport {
        acks_seen: acks.len(),
        retired: 0,
    };
    for &sequence in acks {
        if store.mark_acked(sequence) {
            report.retired += 1;
        } else {
            trace!(sequence, "Ack matches no outstanding packet");
        }
    }
    report
}
