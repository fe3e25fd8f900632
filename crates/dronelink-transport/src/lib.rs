//! Connected datagram channel abstraction.
//!
//! The protocol engine only needs two primitives from its transport: send one
//! datagram to the peer, and wait a bounded amount of time for one datagram
//! from the peer. Delivery is best effort, unordered, and lossy.
//!
//! [`UdpChannel`] implements [`DatagramChannel`] over a connected UDP socket.

pub mod error;
pub mod traits;
pub mod udp;

pub use error::{Result, TransportError};
pub use traits::DatagramChannel;
pub use udp::UdpChannel;
