//! # Packet Definitions
//!
//! The two application packet variants carried over the endpoint.
//!
//! Both are fixed-size and `Copy`. Neither carries a version or type byte:
//! the datagram length alone selects the variant, so a length that matches
//! neither layout is rejected outright.

use super::serialization::{WireReader, WireWriter};
use crate::error::FormatError;

/// Width of the raw name field.
pub const NAME_LEN: usize = 16;

/// Full input event - the 34-byte variant.
///
/// ```text
/// offset  size  field
///      0    16  name (raw bytes, not NUL-terminated)
///     16     2  id
///     18     1  state_01 (1 = fire)
///     19     1  state_02
///     20     2  button_state
///     22     4  thumb_x (f32 bits)
///     26     4  thumb_y (f32 bits)
///     30     4  counter (i32)
/// ```
///
/// All multi-byte fields are big-endian.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EventPacket {
    /// Raw name bytes.
    pub name: [u8; NAME_LEN],
    /// Event id. Fire events carry a per-session increasing id.
    pub id: u16,
    /// Primary state flag. [`EventPacket::STATE_FIRE`] marks a shot.
    pub state_01: u8,
    /// Secondary state flag.
    pub state_02: u8,
    /// Button bitmask.
    pub button_state: u16,
    /// Thumbstick X axis.
    pub thumb_x: f32,
    /// Thumbstick Y axis.
    pub thumb_y: f32,
    /// Magazine count as seen by the sender.
    pub counter: i32,
}

impl EventPacket {
    /// Size in bytes on the wire.
    pub const SIZE: usize = 34;

    /// `state_01` value for a fire action.
    pub const STATE_FIRE: u8 = 1;

    /// Builds a fire event carrying the sender's magazine count.
    ///
    /// Names longer than 16 bytes are truncated.
    #[must_use]
    pub fn fire(name: &str, id: u16, counter: i32) -> Self {
        let mut raw = [0u8; NAME_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME_LEN);
        raw[..len].copy_from_slice(&bytes[..len]);

        Self {
            name: raw,
            id,
            state_01: Self::STATE_FIRE,
            counter,
            ..Self::default()
        }
    }

    /// Returns true if this event is a shot.
    #[inline]
    #[must_use]
    pub const fn is_fire(&self) -> bool {
        self.state_01 == Self::STATE_FIRE
    }

    /// Name up to the first NUL, for log lines.
    #[must_use]
    pub fn name_str(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// Encodes to the fixed wire layout.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut writer = WireWriter::<{ EventPacket::SIZE }>::new();
        let written = writer.write_bytes(&self.name)
            && writer.write_u16(self.id)
            && writer.write_u8(self.state_01)
            && writer.write_u8(self.state_02)
            && writer.write_u16(self.button_state)
            && writer.write_f32(self.thumb_x)
            && writer.write_f32(self.thumb_y)
            && writer.write_i32(self.counter);
        debug_assert!(written && writer.is_full());
        writer.finish()
    }

    /// Decodes from exactly [`EventPacket::SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::WrongLength`] for any other length.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() != Self::SIZE {
            return Err(FormatError::WrongLength {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }

        let mut reader = WireReader::new(bytes);
        let wrong = FormatError::WrongLength {
            expected: Self::SIZE,
            actual: bytes.len(),
        };
        Ok(Self {
            name: reader.read_array().ok_or(wrong)?,
            id: reader.read_u16().ok_or(wrong)?,
            state_01: reader.read_u8().ok_or(wrong)?,
            state_02: reader.read_u8().ok_or(wrong)?,
            button_state: reader.read_u16().ok_or(wrong)?,
            thumb_x: reader.read_f32().ok_or(wrong)?,
            thumb_y: reader.read_f32().ok_or(wrong)?,
            counter: reader.read_i32().ok_or(wrong)?,
        })
    }
}

/// Counter-only packet - the 8-byte variant.
///
/// Four bytes of native-endian `i32` followed by four bytes of zero padding.
/// This layout predates the event packet and is kept bit-compatible with it,
/// which is why it alone is not big-endian.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterPacket {
    /// Magazine count as seen by the sender.
    pub counter: i32,
}

impl CounterPacket {
    /// Size in bytes on the wire.
    pub const SIZE: usize = 8;

    /// Counter value of a corrective probe. Asks the authority to repeat its
    /// count without consuming a round.
    pub const PROBE: i32 = -1;

    /// Creates a counter packet.
    #[inline]
    #[must_use]
    pub const fn new(counter: i32) -> Self {
        Self { counter }
    }

    /// Creates a corrective probe.
    #[inline]
    #[must_use]
    pub const fn probe() -> Self {
        Self::new(Self::PROBE)
    }

    /// Returns true if this is a corrective probe.
    #[inline]
    #[must_use]
    pub const fn is_probe(&self) -> bool {
        self.counter == Self::PROBE
    }

    /// Encodes to the fixed wire layout.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..4].copy_from_slice(&self.counter.to_ne_bytes());
        out
    }

    /// Decodes from exactly [`CounterPacket::SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::WrongLength`] for any other length and
    /// [`FormatError::NonZeroPadding`] if the padding is dirty.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let Ok(raw) = <[u8; Self::SIZE]>::try_from(bytes) else {
            return Err(FormatError::WrongLength {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        };
        if raw[4..] != [0u8; 4] {
            return Err(FormatError::NonZeroPadding);
        }
        Ok(Self::new(i32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]])))
    }
}

/// Any application packet, selected by datagram length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WirePacket {
    /// 8-byte counter packet.
    Counter(CounterPacket),
    /// 34-byte event packet.
    Event(EventPacket),
}

impl WirePacket {
    /// Magazine count carried by the packet.
    #[inline]
    #[must_use]
    pub const fn counter(&self) -> i32 {
        match self {
            Self::Counter(packet) => packet.counter,
            Self::Event(packet) => packet.counter,
        }
    }

    /// Size of this variant on the wire.
    #[inline]
    #[must_use]
    pub const fn wire_size(&self) -> usize {
        match self {
            Self::Counter(_) => CounterPacket::SIZE,
            Self::Event(_) => EventPacket::SIZE,
        }
    }

    /// Encodes into a freshly allocated buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Counter(packet) => packet.encode().to_vec(),
            Self::Event(packet) => packet.encode().to_vec(),
        }
    }

    /// Decodes whichever variant matches the buffer length.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::UnknownLength`] if no variant matches, or the
    /// variant's own error.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        match bytes.len() {
            CounterPacket::SIZE => CounterPacket::decode(bytes).map(Self::Counter),
            EventPacket::SIZE => EventPacket::decode(bytes).map(Self::Event),
            other => Err(FormatError::UnknownLength(other)),
        }
    }
}

impl From<CounterPacket> for WirePacket {
    fn from(packet: CounterPacket) -> Self {
        Self::Counter(packet)
    }
}

impl From<EventPacket> for WirePacket {
    fn from(packet: EventPacket) -> Self {
        Self::Event(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> EventPacket {
        EventPacket {
            name: *b"weapon_type\0\0\0\0\0",
            id: 0xBEEF,
            state_01: 1,
            state_02: 7,
            button_state: 0x8001,
            thumb_x: -0.5,
            thumb_y: 0.25,
            counter: -42,
        }
    }

    #[test]
    fn test_event_round_trip() {
        let event = sample_event();
        let bytes = event.encode();
        assert_eq!(bytes.len(), EventPacket::SIZE);
        assert_eq!(EventPacket::decode(&bytes).unwrap(), event);
    }

    #[test]
    fn test_event_layout_offsets() {
        let bytes = sample_event().encode();

        assert_eq!(&bytes[..11], b"weapon_type");
        assert_eq!(&bytes[16..18], &[0xBE, 0xEF]);
        assert_eq!(bytes[18], 1);
        assert_eq!(bytes[19], 7);
        assert_eq!(&bytes[20..22], &[0x80, 0x01]);
        assert_eq!(&bytes[22..26], &(-0.5f32).to_bits().to_be_bytes());
        assert_eq!(&bytes[26..30], &0.25f32.to_bits().to_be_bytes());
        assert_eq!(&bytes[30..34], &(-42i32).to_be_bytes());
    }

    #[test]
    fn test_event_name_is_raw_bytes() {
        let mut event = sample_event();
        event.name = [0xFF; NAME_LEN];
        let decoded = EventPacket::decode(&event.encode()).unwrap();
        assert_eq!(decoded.name, [0xFF; NAME_LEN]);
    }

    #[test]
    fn test_event_wrong_length() {
        let bytes = sample_event().encode();
        assert_eq!(
            EventPacket::decode(&bytes[..33]),
            Err(FormatError::WrongLength { expected: 34, actual: 33 })
        );

        let mut long = bytes.to_vec();
        long.push(0);
        assert!(EventPacket::decode(&long).is_err());
    }

    #[test]
    fn test_fire_builder() {
        let event = EventPacket::fire("a_name_that_is_far_too_long", 3, 29);
        assert!(event.is_fire());
        assert_eq!(event.id, 3);
        assert_eq!(event.counter, 29);
        assert_eq!(event.name_str(), "a_name_that_is_f");

        let short = EventPacket::fire("rifle", 1, 0);
        assert_eq!(short.name_str(), "rifle");
    }

    #[test]
    fn test_counter_round_trip() {
        for value in [0, 1, 28, i32::MAX, i32::MIN, CounterPacket::PROBE] {
            let packet = CounterPacket::new(value);
            let bytes = packet.encode();
            assert_eq!(&bytes[4..], &[0, 0, 0, 0]);
            assert_eq!(CounterPacket::decode(&bytes).unwrap(), packet);
        }
    }

    #[test]
    fn test_counter_rejects_dirty_padding() {
        let mut bytes = CounterPacket::new(5).encode();
        bytes[7] = 1;
        assert_eq!(CounterPacket::decode(&bytes), Err(FormatError::NonZeroPadding));
    }

    #[test]
    fn test_wire_dispatch_by_length() {
        let counter = WirePacket::decode(&CounterPacket::new(12).encode()).unwrap();
        assert_eq!(counter, WirePacket::Counter(CounterPacket::new(12)));
        assert_eq!(counter.counter(), 12);

        let event = WirePacket::decode(&sample_event().encode()).unwrap();
        assert_eq!(event.counter(), -42);
        assert_eq!(event.wire_size(), EventPacket::SIZE);

        assert_eq!(WirePacket::decode(&[0u8; 30]), Err(FormatError::UnknownLength(30)));
        assert_eq!(WirePacket::decode(&[]), Err(FormatError::UnknownLength(0)));
    }
}
