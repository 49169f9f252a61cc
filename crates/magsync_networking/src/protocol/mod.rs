//! # Application Protocol
//!
//! Fixed-layout packets carried inside endpoint datagrams.
//!
//! ## Packet Variants
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Counter (8 bytes)                            │
//! │ counter i32 (native) │ padding (4, zero)     │
//! ├──────────────────────────────────────────────┤
//! │ Event (34 bytes, big-endian)                 │
//! │ name (16) │ id (2) │ state (2) │ buttons (2) │
//! │ thumb_x (4) │ thumb_y (4) │ counter (4)      │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Design Philosophy
//!
//! - Length selects the variant; there is no type byte
//! - Exact length or reject, never a partial decode
//! - Explicit field-by-field encoding, never a memory cast

mod packets;
mod serialization;

pub use packets::{CounterPacket, EventPacket, WirePacket, NAME_LEN};
pub use serialization::{WireReader, WireWriter};
