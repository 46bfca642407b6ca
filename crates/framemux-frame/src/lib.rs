//! Wire format for framemux multiplexed streams.
//!
//! Every frame is a 9-byte header followed by a type-specific body:
//! - a 3-byte big-endian body length (top bit reserved, 23-bit ceiling)
//! - a 1-byte type code (`DATA` or `HEADERS`; the set is closed)
//! - a 1-byte flags bitmask
//! - a 4-byte big-endian stream id
//!
//! `HEADERS` bodies carry [`Metadata`] as a JSON object of string lists;
//! `DATA` bodies are opaque payload bytes.

pub mod codec;
pub mod data;
pub mod error;
pub mod frame;
pub mod framer;
pub mod header;
pub mod headers;
pub mod metadata;
pub mod reader;
pub mod writer;

pub use codec::{FrameCodec, FrameConfig};
pub use data::DataFrame;
pub use error::{FrameError, Result};
pub use frame::Frame;
pub use framer::Framer;
pub use header::{flags, FrameHeader, FrameType, HEADER_SIZE, MAX_FRAME_SIZE};
pub use headers::{HeadersFrame, Priority};
pub use metadata::{Metadata, PATH, STATUS};
pub use reader::FrameReader;
pub use writer::FrameWriter;
