//! # Sequence Buffer
//!
//! Fixed-size history indexed by `sequence % size`, aware of 16-bit wrap.
//!
//! Used twice by the endpoint: once for packets we sent (ack matching, RTT,
//! loss) and once for packets we received (ack bitfield generation).

use super::{AckBitfield, SequenceNumber};

/// Returns true if `s1` is newer than `s2`, accounting for wrap-around.
#[inline]
#[must_use]
pub const fn sequence_greater_than(s1: SequenceNumber, s2: SequenceNumber) -> bool {
    ((s1 > s2) && (s1 - s2 <= 32768)) || ((s1 < s2) && (s2 - s1 > 32768))
}

/// Returns true if `s1` is older than `s2`, accounting for wrap-around.
#[inline]
#[must_use]
pub const fn sequence_less_than(s1: SequenceNumber, s2: SequenceNumber) -> bool {
    sequence_greater_than(s2, s1)
}

/// Ring of `(sequence, value)` slots.
#[derive(Clone, Debug)]
pub struct SequenceBuffer<T> {
    /// One past the most recent sequence inserted.
    sequence: SequenceNumber,
    /// Slots, `None` when empty.
    entries: Vec<Option<(SequenceNumber, T)>>,
}

impl<T> SequenceBuffer<T> {
    /// Creates an empty buffer with `size` slots.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let mut entries = Vec::with_capacity(size);
        entries.resize_with(size, || None);
        Self { sequence: 0, entries }
    }

    /// Number of slots.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// One past the most recent sequence inserted.
    #[inline]
    #[must_use]
    pub const fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    /// Most recent sequence inserted.
    #[inline]
    #[must_use]
    pub const fn most_recent(&self) -> SequenceNumber {
        self.sequence.wrapping_sub(1)
    }

    #[inline]
    fn index(&self, sequence: SequenceNumber) -> usize {
        usize::from(sequence) % self.entries.len()
    }

    /// Returns true if `sequence` is too old to be represented.
    #[must_use]
    pub fn is_stale(&self, sequence: SequenceNumber) -> bool {
        let window = self.entries.len() as u16;
        sequence_less_than(sequence, self.sequence.wrapping_sub(window))
    }

    /// Stores `value` under `sequence`.
    ///
    /// Advancing past the current head clears every slot skipped over so that
    /// old entries never alias new sequences. Returns `None` if the sequence
    /// is stale.
    pub fn insert(&mut self, sequence: SequenceNumber, value: T) -> Option<&mut T> {
        if self.is_stale(sequence) {
            return None;
        }
        if sequence_greater_than(sequence.wrapping_add(1), self.sequence) {
            self.remove_range(self.sequence, sequence);
            self.sequence = sequence.wrapping_add(1);
        }
        let index = self.index(sequence);
        self.entries[index] = Some((sequence, value));
        self.entries[index].as_mut().map(|(_, value)| value)
    }

    /// Clears slots for `start..=finish` (wrapping).
    fn remove_range(&mut self, start: SequenceNumber, finish: SequenceNumber) {
        let span = usize::from(finish.wrapping_sub(start)) + 1;
        if span >= self.entries.len() {
            self.entries.iter_mut().for_each(|slot| *slot = None);
            return;
        }
        for offset in 0..span {
            let index = self.index(start.wrapping_add(offset as u16));
            self.entries[index] = None;
        }
    }

    /// Returns true if `sequence` is currently stored.
    #[must_use]
    pub fn exists(&self, sequence: SequenceNumber) -> bool {
        self.find(sequence).is_some()
    }

    /// Looks up `sequence`.
    #[must_use]
    pub fn find(&self, sequence: SequenceNumber) -> Option<&T> {
        match &self.entries[self.index(sequence)] {
            Some((stored, value)) if *stored == sequence => Some(value),
            _ => None,
        }
    }

    /// Looks up `sequence` mutably.
    pub fn find_mut(&mut self, sequence: SequenceNumber) -> Option<&mut T> {
        let index = self.index(sequence);
        match &mut self.entries[index] {
            Some((stored, value)) if *stored == sequence => Some(value),
            _ => None,
        }
    }

    /// Builds `(ack, ack_bits)` for an outgoing header.
    ///
    /// `ack` is the most recent sequence; bit `n` of `ack_bits` is set when
    /// `ack - 1 - n` is stored.
    #[must_use]
    pub fn ack_bits(&self) -> (SequenceNumber, AckBitfield) {
        let ack = self.most_recent();
        let mut bits: AckBitfield = 0;
        for n in 0..32u16 {
            if self.exists(ack.wrapping_sub(1 + n)) {
                bits |= 1 << n;
            }
        }
        (ack, bits)
    }
}
