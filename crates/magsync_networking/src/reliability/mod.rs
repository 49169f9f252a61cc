//! # Application-Level Reliability
//!
//! The endpoint acknowledges datagrams but never resends them. This module
//! keeps every application packet until it is acked, and resends it when
//! its timeout passes.
//!
//! ```text
//! send ──► OutstandingStore ──(timeout)──► retransmit_timed_out ──► send
//!                ▲                                   │
//!                └──── reconcile_acks ◄── endpoint acks (re-keyed)
//! ```
//!
//! ## Design
//!
//! - **Ring store**: fixed capacity, oldest slot silently overwritten
//! - **Adaptive RTO**: `rtt * 2 * (1 + loss)`, floored
//! - **Re-keying**: a resent entry answers to the sequence of its latest copy

mod ack;
mod rto;
mod scheduler;
mod store;

pub use ack::{reconcile_acks, AckReport};
pub use rto::RtoEstimator;
pub use scheduler::{retransmit_timed_out, RetransmitReport};
pub use store::{OutstandingEntry, OutstandingStore, TimedOut};
