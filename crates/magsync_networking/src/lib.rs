//! # MAGSYNC Networking
//!
//! Application-level reliability and magazine-count convergence over an
//! unreliable datagram transport.
//!
//! ## Architecture
//!
//! - **Protocol**: fixed-layout 8-byte counter and 34-byte event packets
//! - **Endpoint**: sequence numbers, ack bitfields, RTT and loss estimates
//! - **Reliability**: outstanding-packet ring, adaptive RTO, retransmission
//! - **Sync**: the server owns the count, the client reconciles against it
//! - **Session**: one peer's state, advanced one tick at a time
//!
//! ## Authority Model
//!
//! ```text
//! CLIENT (follower)                    SERVER (authority)
//!   |                                     |
//!   |--- Fire: "I have 29 left" -------->| <- decrements its own copy
//!   |<-- Echo: "You have 29 left" -------|
//!   |                                     |
//!   | mismatch? overwrite, resend         |
//! ```
//!
//! The client never decides the count. It proposes, the server answers.
//!
//! ## Example
//!
//! ```rust,ignore
//! use magsync_networking::{LocalAction, ReliableEndpoint, Role, Session};
//! use magsync_shared::{EndpointConfig, SessionConfig};
//!
//! let endpoint = ReliableEndpoint::create(EndpointConfig::named("client"), 0.0)?;
//! let mut session = Session::new(&SessionConfig::default(), Role::Follower, endpoint);
//!
//! let report = session.tick(0.05, inbound, Some(LocalAction::Fire));
//! while let Some(datagram) = session.poll_transmit() {
//!     socket.send(&datagram);
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod cli;
pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod reliability;
pub mod session;
pub mod simulation;
pub mod sync;
pub mod transport;

// Re-exports for convenience
pub use endpoint::{
    AckBitfield, Delivered, Endpoint, EndpointStats, PacketHeader, ReliableEndpoint,
    SequenceNumber,
};
pub use error::{EndpointError, FormatError, NetError, NetResult};
pub use protocol::{CounterPacket, EventPacket, WirePacket};
pub use reliability::{
    AckReport, OutstandingEntry, OutstandingStore, RetransmitReport, RtoEstimator, TimedOut,
};
pub use session::{LocalAction, Session, SessionStats, TickLoop, TickReport};
pub use simulation::{BulletSyncScenario, LinkConditions, LossyLink, ScenarioConfig};
pub use sync::{CounterState, EventDedupe, Reconcile, Role, SyncCounter};
pub use transport::{TransportStats, UdpTransport};
