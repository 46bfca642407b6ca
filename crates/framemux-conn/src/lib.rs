//! Stream multiplexing for framemux.
//!
//! A [`Connection`] carries many independent [`Stream`]s over one socket.
//! Each stream has its own half-close state per direction and its own
//! [`BackpressureQueue`] of inbound payloads. Peer-initiated streams are
//! handed to the handler registered with [`Connection::set_handler`].

pub mod connection;
pub mod error;
pub mod io;
pub mod queue;
pub mod stream;

#[cfg(unix)]
pub mod connector;
#[cfg(unix)]
pub mod listener;

pub use connection::{Connection, ConnectionConfig, Role, StreamHandler};
#[cfg(unix)]
pub use connector::{connect, connect_with_config};
pub use error::{ConnError, Result};
pub use io::{spawn_io, ConnectionTask};
#[cfg(unix)]
pub use listener::ConnectionListener;
pub use queue::BackpressureQueue;
pub use stream::Stream;
