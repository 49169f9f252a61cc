//! # Reliable Endpoint
//!
//! Redundant-ack endpoint: every outgoing header acknowledges the most
//! recent received sequence plus the 32 before it, so a single lost ack
//! rarely loses the acknowledgment.

use std::collections::VecDeque;

use magsync_shared::EndpointConfig;

use super::sequence_buffer::SequenceBuffer;
use super::{AckBitfield, Delivered, Endpoint, SequenceNumber};
use crate::error::EndpointError;
use crate::protocol::{WireReader, WireWriter};

/// Endpoint header - present in every datagram.
///
/// Total size: 9 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacketHeader {
    /// Header flags.
    pub flags: u8,
    /// Sequence number of this packet.
    pub sequence: SequenceNumber,
    /// Most recent sequence received from the peer.
    pub ack: SequenceNumber,
    /// Bitmask of received packets before `ack` (ack-1 through ack-32).
    pub ack_bits: AckBitfield,
}

impl PacketHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 9;

    /// Set when `ack`/`ack_bits` are meaningful (something was received).
    pub const FLAG_HAS_ACKS: u8 = 1 << 0;

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut writer = WireWriter::<{ Self::SIZE }>::new();
        let written = writer.write_u8(self.flags)
            && writer.write_u16(self.sequence)
            && writer.write_u16(self.ack)
            && writer.write_u32(self.ack_bits);
        debug_assert!(written);
        writer.finish()
    }

    /// Decodes the header from the front of a datagram.
    #[must_use]
    pub fn decode(datagram: &[u8]) -> Option<Self> {
        let mut reader = WireReader::new(datagram);
        Some(Self {
            flags: reader.read_u8()?,
            sequence: reader.read_u16()?,
            ack: reader.read_u16()?,
            ack_bits: reader.read_u32()?,
        })
    }

    /// Returns true if the header carries acknowledgments.
    #[inline]
    #[must_use]
    pub const fn has_acks(&self) -> bool {
        self.flags & Self::FLAG_HAS_ACKS != 0
    }
}

/// Endpoint statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct EndpointStats {
    /// Datagrams queued for transmission.
    pub packets_sent: u64,
    /// Datagrams delivered to the application.
    pub packets_received: u64,
    /// Sent packets acknowledged by the peer.
    pub packets_acked: u64,
    /// Datagrams dropped as stale.
    pub packets_stale: u64,
    /// Datagrams dropped as duplicates.
    pub packets_duplicate: u64,
    /// Datagrams dropped as malformed.
    pub packets_invalid: u64,
    /// Payloads refused for exceeding the maximum size.
    pub packets_too_large: u64,
}

#[derive(Clone, Copy, Debug)]
struct SentPacket {
    time: f64,
    acked: bool,
}

/// Sequence/ack endpoint with smoothed RTT and loss estimation.
pub struct ReliableEndpoint {
    config: EndpointConfig,
    time: f64,
    rtt: f32,
    rtt_sampled: bool,
    packet_loss: f32,
    sequence: SequenceNumber,
    sent_packets: SequenceBuffer<SentPacket>,
    received_packets: SequenceBuffer<()>,
    received_any: bool,
    acks: Vec<SequenceNumber>,
    outbox: VecDeque<Vec<u8>>,
    stats: EndpointStats,
}

impl ReliableEndpoint {
    /// Creates an endpoint at clock time `now`.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Init`] if the configuration is unusable.
    pub fn create(config: EndpointConfig, now: f64) -> Result<Self, EndpointError> {
        config
            .validate()
            .map_err(|err| EndpointError::Init(err.to_string()))?;
        if config.max_packet_size <= PacketHeader::SIZE {
            return Err(EndpointError::Init(format!(
                "max_packet_size {} leaves no room for a payload",
                config.max_packet_size
            )));
        }

        tracing::debug!(name = %config.name, "endpoint created");

        Ok(Self {
            time: now,
            rtt: 0.0,
            rtt_sampled: false,
            packet_loss: 0.0,
            sequence: 0,
            sent_packets: SequenceBuffer::new(config.sent_packets_buffer_size),
            received_packets: SequenceBuffer::new(config.received_packets_buffer_size),
            received_any: false,
            acks: Vec::with_capacity(64),
            outbox: VecDeque::with_capacity(16),
            stats: EndpointStats::default(),
            config,
        })
    }

    /// Endpoint name from the configuration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Current clock time.
    #[inline]
    #[must_use]
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// Returns endpoint statistics.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &EndpointStats {
        &self.stats
    }

    /// Largest payload accepted by [`Endpoint::send`].
    #[inline]
    #[must_use]
    pub const fn max_payload(&self) -> usize {
        self.config.max_packet_size - PacketHeader::SIZE
    }

    /// Sends a payload, reporting oversize payloads instead of logging them.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::PayloadTooLarge`]; no sequence is consumed.
    pub fn try_send(&mut self, payload: &[u8]) -> Result<SequenceNumber, EndpointError> {
        if payload.len() > self.max_payload() {
            self.stats.packets_too_large += 1;
            return Err(EndpointError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload(),
            });
        }

        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        let (ack, ack_bits) = self.received_packets.ack_bits();
        let header = PacketHeader {
            flags: if self.received_any { PacketHeader::FLAG_HAS_ACKS } else { 0 },
            sequence,
            ack,
            ack_bits,
        };

        self.sent_packets.insert(
            sequence,
            SentPacket {
                time: self.time,
                acked: false,
            },
        );

        let mut datagram = Vec::with_capacity(PacketHeader::SIZE + payload.len());
        datagram.extend_from_slice(&header.encode());
        datagram.extend_from_slice(payload);
        self.outbox.push_back(datagram);
        self.stats.packets_sent += 1;

        tracing::trace!(name = %self.config.name, sequence, bytes = payload.len(), "queued datagram");
        Ok(sequence)
    }

    /// Marks `ack` and every sequence flagged in `ack_bits` as acknowledged.
    fn process_acks(&mut self, ack: SequenceNumber, ack_bits: AckBitfield) {
        self.process_ack(ack);
        for n in 0..32u16 {
            if ack_bits & (1 << n) != 0 {
                self.process_ack(ack.wrapping_sub(1 + n));
            }
        }
    }

    fn process_ack(&mut self, sequence: SequenceNumber) {
        let time = self.time;
        let Some(sent) = self.sent_packets.find_mut(sequence) else {
            return;
        };
        if sent.acked {
            return;
        }
        sent.acked = true;
        let sample = (time - sent.time).max(0.0) as f32;

        self.acks.push(sequence);
        self.stats.packets_acked += 1;

        if !self.rtt_sampled {
            self.rtt = sample;
            self.rtt_sampled = true;
        } else {
            self.rtt += (sample - self.rtt) * self.config.rtt_smoothing_factor;
        }
    }

    /// Fraction of the older half of the sent window still unacknowledged.
    fn sample_packet_loss(&self) -> Option<f32> {
        let size = self.sent_packets.size();
        let samples = size / 2;
        let base = self.sequence.wrapping_sub(size as u16);

        let mut present = 0u32;
        let mut dropped = 0u32;
        for offset in 0..samples {
            if let Some(sent) = self.sent_packets.find(base.wrapping_add(offset as u16)) {
                present += 1;
                if !sent.acked {
                    dropped += 1;
                }
            }
        }

        (present > 0).then(|| dropped as f32 / present as f32)
    }
}

impl Endpoint for ReliableEndpoint {
    fn next_sequence(&self) -> SequenceNumber {
        self.sequence
    }

    fn send(&mut self, payload: &[u8]) {
        if let Err(err) = self.try_send(payload) {
            tracing::warn!(name = %self.config.name, %err, "dropping outgoing payload");
        }
    }

    fn receive(&mut self, datagram: &[u8]) -> Option<Delivered> {
        let Some(header) = PacketHeader::decode(datagram) else {
            self.stats.packets_invalid += 1;
            tracing::warn!(
                name = %self.config.name,
                bytes = datagram.len(),
                "datagram shorter than header"
            );
            return None;
        };

        if self.received_packets.is_stale(header.sequence) {
            self.stats.packets_stale += 1;
            tracing::debug!(name = %self.config.name, sequence = header.sequence, "stale datagram");
            return None;
        }

        if header.has_acks() {
            self.process_acks(header.ack, header.ack_bits);
        }

        if self.received_any && self.received_packets.exists(header.sequence) {
            self.stats.packets_duplicate += 1;
            tracing::debug!(name = %self.config.name, sequence = header.sequence, "duplicate datagram");
            return None;
        }

        self.received_packets.insert(header.sequence, ());
        self.received_any = true;
        self.stats.packets_received += 1;

        Some(Delivered {
            sequence: header.sequence,
            payload: datagram[PacketHeader::SIZE..].to_vec(),
        })
    }

    fn update(&mut self, now: f64) {
        self.time = now;

        if let Some(sample) = self.sample_packet_loss() {
            let factor = self.config.packet_loss_smoothing_factor;
            if (self.packet_loss - sample).abs() < 0.000_01 {
                self.packet_loss = sample;
            } else {
                self.packet_loss += (sample - self.packet_loss) * factor;
            }
        }
    }

    fn acks(&self) -> &[SequenceNumber] {
        &self.acks
    }

    fn clear_acks(&mut self) {
        self.acks.clear();
    }

    fn rtt(&self) -> f32 {
        self.rtt
    }

    fn packet_loss(&self) -> f32 {
        self.packet_loss.clamp(0.0, 1.0)
    }

    fn poll_transmit(&mut self) -> Option<Vec<u8>> {
        self.outbox.pop_front()
    }
}

impl Drop for ReliableEndpoint {
    fn drop(&mut self) {
        tracing::debug!(
            name = %self.config.name,
            sent = self.stats.packets_sent,
            received = self.stats.packets_received,
            acked = self.stats.packets_acked,
            "endpoint destroyed"
        );
    }
}
