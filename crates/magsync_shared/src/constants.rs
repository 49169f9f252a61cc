//! # Network Constants
//!
//! Defaults shared by the server, the client and the in-process simulation.
//!
//! **CRITICAL:** These values are baked into both binaries.
//! Changes require rebuilding both peers.

// =============================================================================
// NETWORK CONFIGURATION
// =============================================================================

/// Server port for game traffic.
pub const SERVER_PORT: u16 = 8000;

/// Default server address for client connections (loopback).
pub const SERVER_ADDR: &str = "127.0.0.1:8000";

/// Server bind address (accepts datagrams on all interfaces).
pub const SERVER_BIND: &str = "0.0.0.0:8000";

/// Tick rate of the client loop (updates per second).
///
/// 20Hz, one tick every 50ms.
pub const TICK_RATE: u32 = 20;

/// Maximum datagram size (MTU-safe).
pub const MAX_PACKET_SIZE: usize = 1024;

/// Smallest usable datagram: 9-byte endpoint header plus the 34-byte event
/// packet.
pub const MIN_PACKET_SIZE: usize = 9 + 34;

// =============================================================================
// SYNC CONFIGURATION
// =============================================================================

/// Rounds in a full magazine. Both peers start here.
pub const DEFAULT_MAGAZINE: i32 = 30;

/// Slots in the outstanding-packet ring buffer.
pub const STORE_CAPACITY: usize = 256;

/// Floor applied to the retransmission timeout, in seconds.
pub const MIN_RTO_SECS: f64 = 0.03;

/// Consecutive corrective resends allowed before they are suppressed.
pub const MAX_CORRECTIVE_RESENDS: u32 = 8;
