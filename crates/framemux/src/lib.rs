//! Multiplexed streaming RPC over a single framed connection.
//!
//! framemux carries many independent request/response and streaming
//! exchanges over one socket, each with its own half-close state and
//! inbound backpressure queue.
//!
//! # Crate Structure
//!
//! - [`transport`]: Message socket abstraction, in-memory pairs, Unix domain sockets
//! - [`frame`]: DATA/HEADERS wire format and byte-stream codec
//! - [`conn`]: Connections, streams and backpressure (behind `conn` feature)
//! - [`rpc`]: Path-routed unary and streaming calls (behind `rpc` feature)

/// Re-export transport types.
pub mod transport {
    pub use framemux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use framemux_frame::*;
}

/// Re-export connection types (requires `conn` feature).
#[cfg(feature = "conn")]
pub mod conn {
    pub use framemux_conn::*;
}

/// Re-export RPC types (requires `rpc` feature).
#[cfg(feature = "rpc")]
pub mod rpc {
    pub use framemux_rpc::*;
}
