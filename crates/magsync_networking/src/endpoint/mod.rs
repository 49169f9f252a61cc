//! # Transport Endpoint
//!
//! Sequence numbering, ack bitfields, RTT and packet-loss sampling.
//!
//! The sync layer only talks to the [`Endpoint`] trait. [`ReliableEndpoint`]
//! is the production implementation; tests substitute their own.
//!
//! ## Datagram Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (9 bytes, big-endian)                                 │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Flags (1) │ Sequence (2) │ Ack (2) │ AckBits (4)             │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Payload (8 or 34 bytes, see `protocol`)                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod reliable;
mod sequence_buffer;

pub use reliable::{EndpointStats, PacketHeader, ReliableEndpoint};
pub use sequence_buffer::{sequence_greater_than, sequence_less_than, SequenceBuffer};

// Configuration validation assumes an event packet always fits.
const _: () = assert!(
    PacketHeader::SIZE + crate::protocol::EventPacket::SIZE == magsync_shared::MIN_PACKET_SIZE
);

/// Sequence number type alias.
pub type SequenceNumber = u16;

/// Acknowledgment bitfield type alias.
pub type AckBitfield = u32;

/// A payload that survived endpoint-level processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivered {
    /// Sequence the peer sent it under.
    pub sequence: SequenceNumber,
    /// Application bytes, header stripped.
    pub payload: Vec<u8>,
}

/// Operations the sync layer consumes from a transport endpoint.
///
/// Sends are fire-and-forget. Loss is covered by the retransmission
/// scheduler, never by the endpoint.
pub trait Endpoint {
    /// Sequence the next call to [`Endpoint::send`] will use.
    fn next_sequence(&self) -> SequenceNumber;

    /// Submits a payload for transmission under [`Endpoint::next_sequence`].
    fn send(&mut self, payload: &[u8]);

    /// Processes an inbound datagram: extracts acks and samples RTT.
    ///
    /// Returns the payload for the application, or `None` if the datagram
    /// was malformed, stale or a duplicate.
    fn receive(&mut self, datagram: &[u8]) -> Option<Delivered>;

    /// Advances the endpoint clock (seconds).
    fn update(&mut self, now: f64);

    /// Sequences acknowledged since the last [`Endpoint::clear_acks`].
    fn acks(&self) -> &[SequenceNumber];

    /// Forgets the accumulated ack list.
    fn clear_acks(&mut self);

    /// Smoothed round-trip time in seconds.
    fn rtt(&self) -> f32;

    /// Smoothed packet loss as a fraction in `0.0..=1.0`.
    fn packet_loss(&self) -> f32;

    /// Next datagram to put on the wire, oldest first.
    fn poll_transmit(&mut self) -> Option<Vec<u8>>;
}
