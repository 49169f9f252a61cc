//! # Outstanding-Packet Store
//!
//! Fixed-capacity ring of packets sent but not yet acknowledged.
//!
//! ## Design
//!
//! - Slot index is `sequence % capacity`, insertion never fails
//! - An insertion overwrites whatever the slot held, acknowledged or not
//! - Ack matching scans every slot: O(capacity) per ack. Fine at 256 slots
//!   and a handful of acks per tick, the first thing to fix if either grows
//! - Retransmitted entries are re-keyed in place to their new sequence

use crate::endpoint::SequenceNumber;
use crate::protocol::WirePacket;

/// One in-flight packet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutstandingEntry {
    /// Sequence the latest copy was sent under.
    pub sequence: SequenceNumber,
    /// The packet, kept for retransmission.
    pub payload: WirePacket,
    /// Time the latest copy was sent (seconds).
    pub send_time: f64,
    /// Number of retransmissions so far.
    pub retransmit_count: u32,
}

/// A store entry that exceeded its timeout during a sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimedOut {
    /// Slot holding the entry, for [`OutstandingStore::rekey`].
    pub slot: usize,
    /// Sequence the entry was keyed under when it timed out.
    pub sequence: SequenceNumber,
    /// Packet to resend.
    pub payload: WirePacket,
    /// Retransmission count including this one.
    pub retransmit_count: u32,
}

/// Fixed-capacity ring buffer keyed by sequence number.
#[derive(Clone, Debug)]
pub struct OutstandingStore {
    slots: Vec<Option<OutstandingEntry>>,
    len: usize,
}

impl OutstandingStore {
    /// Creates an empty store. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity],
            len: 0,
        }
    }

    /// Number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing is outstanding.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn slot_of(&self, sequence: SequenceNumber) -> usize {
        usize::from(sequence) % self.slots.len()
    }

    /// Records a freshly sent packet.
    ///
    /// Returns the entry that previously occupied the slot, which is now
    /// forgotten whether or not it was ever acknowledged.
    pub fn insert(
        &mut self,
        sequence: SequenceNumber,
        payload: WirePacket,
        now: f64,
    ) -> Option<OutstandingEntry> {
        let slot = self.slot_of(sequence);
        let evicted = self.slots[slot].replace(OutstandingEntry {
            sequence,
            payload,
            send_time: now,
            retransmit_count: 0,
        });
        if evicted.is_none() {
            self.len += 1;
        }
        evicted
    }

    /// Retires the entry keyed by `sequence`.
    ///
    /// Returns false for spurious acks (no matching entry).
    pub fn mark_acked(&mut self, sequence: SequenceNumber) -> bool {
        let found = self
            .slots
            .iter_mut()
            .find(|slot| slot.is_some_and(|entry| entry.sequence == sequence));
        match found {
            Some(slot) => {
                *slot = None;
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    /// Sweeps for entries older than `rto` seconds.
    ///
    /// Every returned entry has its send time reset to `now` and its
    /// retransmit count incremented.
    pub fn collect_timed_out(&mut self, now: f64, rto: f64) -> Vec<TimedOut> {
        self.collect_timed_out_with(now, |_| rto)
    }

    /// Like [`OutstandingStore::collect_timed_out`], with the timeout chosen
    /// per entry from its retransmit count.
    pub fn collect_timed_out_with(
        &mut self,
        now: f64,
        timeout: impl Fn(u32) -> f64,
    ) -> Vec<TimedOut> {
        let mut expired = Vec::new();
        for (slot, entry) in self.slots.iter_mut().enumerate() {
            let Some(entry) = entry else { continue };
            if now - entry.send_time > timeout(entry.retransmit_count) {
                entry.send_time = now;
                entry.retransmit_count += 1;
                expired.push(TimedOut {
                    slot,
                    sequence: entry.sequence,
                    payload: entry.payload,
                    retransmit_count: entry.retransmit_count,
                });
            }
        }
        expired
    }

    /// Re-keys the entry in `slot` after it was resent under `sequence`.
    ///
    /// The entry stays in its slot so re-keying can never evict another
    /// in-flight packet. Returns false if the slot is empty.
    pub fn rekey(&mut self, slot: usize, sequence: SequenceNumber) -> bool {
        match self.slots.get_mut(slot).and_then(Option::as_mut) {
            Some(entry) => {
                entry.sequence = sequence;
                true
            }
            None => false,
        }
    }

    /// Looks up the entry keyed by `sequence`.
    #[must_use]
    pub fn get(&self, sequence: SequenceNumber) -> Option<&OutstandingEntry> {
        self.iter().find(|entry| entry.sequence == sequence)
    }

    /// Iterates over occupied slots.
    pub fn iter(&self) -> impl Iterator<Item = &OutstandingEntry> {
        self.slots.iter().flatten()
    }

    /// Forgets every entry.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.len = 0;
    }
}
