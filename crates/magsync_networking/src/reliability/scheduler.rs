//! Resends store entries whose timeout expired.

use tracing::debug;

use super::rto::RtoEstimator;
use super::store::OutstandingStore;
use crate::endpoint::Endpoint;

/// Outcome of one retransmission sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RetransmitReport {
    /// Timeout used for this sweep (seconds).
    pub rto: f64,
    /// Entries resent.
    pub resent: usize,
    /// Highest retransmit count among resent entries.
    pub max_retransmit_count: u32,
}

/// Resends every timed-out entry and re-keys it to its new sequence.
///
/// The RTO is computed from the endpoint's current RTT and loss.
pub fn retransmit_timed_out<E: Endpoint>(
    endpoint: &mut E,
    store: &mut OutstandingStore,
    estimator: &RtoEstimator,
    now: f64,
) -> RetransmitReport {
    let rto = estimator.rto(endpoint.rtt(), endpoint.packet_loss());
    let mut report = RetransmitReport {
        rto,
        ..RetransmitReport::default()
    };

    for expired in store.collect_timed_out_with(now, |count| estimator.timeout_for(rto, count)) {
        let sequence = endpoint.next_sequence();
        endpoint.send(&expired.payload.encode());
        // A send that did not consume the sequence was dropped by the
        // endpoint; keep the old key rather than claim someone else's.
        if endpoint.next_sequence() != sequence {
            store.rekey(expired.slot, sequence);
        }
        debug!(
            old_sequence = expired.sequence,
            new_sequence = sequence,
            retransmit_count = expired.retransmit_count,
            counter = expired.payload.counter(),
            rto,
            "Retransmitting"
        );
        report.resent += 1;
        report.max_retransmit_count = report.max_retransmit_count.max(expired.retransmit_count);
    }
    report
}
