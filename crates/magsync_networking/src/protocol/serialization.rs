//! # Field Serialization
//!
//! Field-by-field writers and readers for the fixed wire layouts.
//!
//! ## Design
//!
//! - Fixed-size stack buffers (no heap allocations)
//! - Big-endian (network order) for every multi-byte field
//! - Floats travel as their IEEE-754 bit pattern
//! - Never reinterprets memory as a struct

/// Writes fields into a fixed-size buffer.
///
/// Writes past the end are refused and leave the buffer untouched.
pub struct WireWriter<const N: usize> {
    buffer: [u8; N],
    position: usize,
}

impl<const N: usize> WireWriter<N> {
    /// Creates a writer over a zeroed buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [0u8; N],
            position: 0,
        }
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.position
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.position == 0
    }

    /// Returns true once every byte of the buffer has been written.
    #[inline]
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.position == N
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> bool {
        if self.position + bytes.len() > N {
            return false;
        }
        self.buffer[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        true
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) -> bool {
        self.write_bytes(&[value])
    }

    /// Writes a u16 in big-endian format.
    #[inline]
    pub fn write_u16(&mut self, value: u16) -> bool {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Writes a u32 in big-endian format.
    #[inline]
    pub fn write_u32(&mut self, value: u32) -> bool {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Writes an i32 in big-endian format.
    #[inline]
    pub fn write_i32(&mut self, value: i32) -> bool {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Writes a f32 as its bit pattern in big-endian format.
    #[inline]
    pub fn write_f32(&mut self, value: f32) -> bool {
        self.write_u32(value.to_bits())
    }

    /// Consumes the writer, returning the buffer.
    #[inline]
    #[must_use]
    pub fn finish(self) -> [u8; N] {
        self.buffer
    }
}

impl<const N: usize> Default for WireWriter<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads fields from a borrowed buffer.
pub struct WireReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a reader from a buffer.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Reads exactly `M` raw bytes.
    #[inline]
    pub fn read_array<const M: usize>(&mut self) -> Option<[u8; M]> {
        if self.position + M > self.buffer.len() {
            return None;
        }
        let mut out = [0u8; M];
        out.copy_from_slice(&self.buffer[self.position..self.position + M]);
        self.position += M;
        Some(out)
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_array::<1>().map(|[b]| b)
    }

    /// Reads a u16 in big-endian format.
    #[inline]
    pub fn read_u16(&mut self) -> Option<u16> {
        self.read_array().map(u16::from_be_bytes)
    }

    /// Reads a u32 in big-endian format.
    #[inline]
    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_array().map(u32::from_be_bytes)
    }

    /// Reads an i32 in big-endian format.
    #[inline]
    pub fn read_i32(&mut self) -> Option<i32> {
        self.read_array().map(i32::from_be_bytes)
    }

    /// Reads a f32 from its big-endian bit pattern.
    #[inline]
    pub fn read_f32(&mut self) -> Option<f32> {
        self.read_u32().map(f32::from_bits)
    }
}
