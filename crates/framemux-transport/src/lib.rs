//! Socket abstraction for framemux.
//!
//! This is the lowest layer of framemux. The multiplexer above it only needs
//! two things from a socket:
//! - a non-blocking, message-oriented [`Socket::send`]
//! - a way to pull whole inbound messages ([`Inbound::recv`])
//!
//! [`pair`] gives an in-memory duplex socket for in-process peers and tests.
//! On Unix, [`UnixDomainSocket`] provides the byte-stream transport used by
//! sidecar processes.

pub mod error;
pub mod socket;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use socket::{channel, pair, ChannelSocket, Endpoint, Inbound, Socket};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
