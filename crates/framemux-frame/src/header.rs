use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: length (3) + type (1) + flags (1) + stream id (4) = 9 bytes.
pub const HEADER_SIZE: usize = 9;

/// Largest body a frame may declare: the top bit of the 24-bit length field
/// is reserved, leaving 23 bits.
pub const MAX_FRAME_SIZE: usize = (1 << 23) - 1;

/// Flag bits carried in the header's flags byte.
pub mod flags {
    /// Last frame the sender will produce on this stream.
    pub const END_STREAM: u8 = 0x01;
    /// HEADERS block is complete (always set on encode).
    pub const END_HEADERS: u8 = 0x04;
    /// Body is prefixed by a pad length and followed by that many pad bytes.
    pub const PADDED: u8 = 0x08;
    /// HEADERS body starts with a 5-byte priority block.
    pub const PRIORITY: u8 = 0x20;
}

/// Frame type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    Data = 0x00,
    Headers = 0x01,
    /// Reserved. Never produced and rejected on decode.
    Ping = 0x06,
}

impl FrameType {
    /// Map a wire code to a frame type.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Data),
            0x01 => Some(Self::Headers),
            0x06 => Some(Self::Ping),
            _ => None,
        }
    }

    /// The wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Human-readable name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Data => "DATA",
            Self::Headers => "HEADERS",
            Self::Ping => "PING",
        }
    }
}

/// The fixed 9-byte prefix of every frame.
///
/// ```text
/// ┌───────────────┬──────────┬───────────┬──────────────────┐
/// │ Length (3B BE)│ Type (1B)│ Flags (1B)│ Stream ID (4B BE)│
/// │ top bit clear │          │           │                  │
/// └───────────────┴──────────┴───────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Body length in bytes (excludes this header).
    pub length: u32,
    /// Raw type code, see [`FrameType`].
    pub frame_type: u8,
    /// Flag bitmask, see [`flags`].
    pub flags: u8,
    pub stream_id: u32,
}

impl FrameHeader {
    pub fn new(length: u32, frame_type: FrameType, flags: u8, stream_id: u32) -> Self {
        Self {
            length,
            frame_type: frame_type.code(),
            flags,
            stream_id,
        }
    }

    /// Read the raw 24-bit length field, reserved bit included.
    ///
    /// Anything above [`MAX_FRAME_SIZE`] has the reserved bit set and must be
    /// rejected before the header is decoded.
    pub fn declared_length(buf: &[u8]) -> Result<usize> {
        if buf.len() < 3 {
            return Err(FrameError::TruncatedHeader(buf.len()));
        }
        Ok(u32::from_be_bytes([0, buf[0], buf[1], buf[2]]) as usize)
    }

    /// Decode a header from the first 9 bytes of `buf`.
    ///
    /// The length ignores the reserved top bit.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(FrameError::TruncatedHeader(buf.len()));
        }
        let length = u32::from_be_bytes([0, buf[0] & 0x7f, buf[1], buf[2]]);
        let stream_id = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]);
        Ok(Self {
            length,
            frame_type: buf[3],
            flags: buf[4],
            stream_id,
        })
    }

    /// Append the 9-byte header to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        let length = self.length.to_be_bytes();
        dst.put_slice(&length[1..]);
        dst.put_u8(self.frame_type);
        dst.put_u8(self.flags);
        dst.put_u32(self.stream_id);
    }

    /// The decoded frame type, if the code is known.
    pub fn kind(&self) -> Option<FrameType> {
        FrameType::from_code(self.frame_type)
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Header plus body size.
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.length as usize
    }
}
