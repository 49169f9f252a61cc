//! # MAGSYNC Shared
//!
//! Constants and configuration used by both peers of a magazine-sync session.
//!
//! ## CRITICAL RULE
//!
//! Both peers must be built from the same constants. The wire formats carry
//! no version byte, so a mismatch here is silent on the network.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod constants;

pub use config::{
    ConfigError, ConfigResult, EndpointConfig, MagsyncConfig, SessionConfig, SyncMode,
};
pub use constants::{
    DEFAULT_MAGAZINE, MAX_CORRECTIVE_RESENDS, MAX_PACKET_SIZE, MIN_PACKET_SIZE, MIN_RTO_SECS,
    SERVER_ADDR, SERVER_BIND, SERVER_PORT, STORE_CAPACITY, TICK_RATE,
};
