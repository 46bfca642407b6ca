use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::frame::{check_body_len, strip_padding};
use crate::header::{flags, FrameHeader, FrameType, HEADER_SIZE};
use crate::metadata::Metadata;

/// Size of the optional priority block at the start of a HEADERS body.
const PRIORITY_SIZE: usize = 5;

/// Stream priority parsed from a HEADERS frame.
///
/// Accepted on decode for wire compatibility; it has no effect on scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    pub exclusive: bool,
    /// 31-bit id of the stream this one depends on.
    pub stream_dependency_id: u32,
    pub weight: u8,
}

/// A HEADERS frame carrying an encoded [`Metadata`] block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadersFrame {
    pub stream_id: u32,
    pub end_stream: bool,
    pub end_headers: bool,
    /// Decode-only; encoding never emits it.
    pub priority: Option<Priority>,
    pub block_fragment: Bytes,
}

impl HeadersFrame {
    /// A complete (END_HEADERS) frame with the given raw block.
    pub fn new(stream_id: u32, block_fragment: impl Into<Bytes>, end_stream: bool) -> Self {
        Self {
            stream_id,
            end_stream,
            end_headers: true,
            priority: None,
            block_fragment: block_fragment.into(),
        }
    }

    /// A complete frame carrying `metadata`. An empty map yields an empty block.
    pub fn with_metadata(stream_id: u32, metadata: &Metadata, end_stream: bool) -> Result<Self> {
        Ok(Self::new(stream_id, metadata.encode()?, end_stream))
    }

    /// Decode the metadata block.
    pub fn metadata(&self) -> Result<Metadata> {
        Metadata::decode(&self.block_fragment)
    }

    /// Decode a HEADERS body: strip padding, then the priority block if flagged.
    pub fn decode(header: &FrameHeader, body: Bytes) -> Result<Self> {
        let mut payload = if header.has_flag(flags::PADDED) {
            strip_padding(body)?
        } else {
            body
        };

        let priority = if header.has_flag(flags::PRIORITY) {
            if payload.len() < PRIORITY_SIZE {
                return Err(FrameError::PriorityTooShort(payload.len()));
            }
            let dependency = payload.get_u32();
            let weight = payload.get_u8();
            Some(Priority {
                exclusive: dependency & 0x8000_0000 != 0,
                stream_dependency_id: dependency & 0x7fff_ffff,
                weight,
            })
        } else {
            None
        };

        Ok(Self {
            stream_id: header.stream_id,
            end_stream: header.has_flag(flags::END_STREAM),
            end_headers: header.has_flag(flags::END_HEADERS),
            priority,
            block_fragment: payload,
        })
    }

    /// Serialized size including the 9-byte header.
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.block_fragment.len()
    }

    /// Append the encoded frame to `dst`.
    ///
    /// Always sets END_HEADERS; sets END_STREAM only for a half-close.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        let length = check_body_len(self.block_fragment.len())?;
        let mut flags = flags::END_HEADERS;
        if self.end_stream {
            flags |= flags::END_STREAM;
        }
        dst.reserve(self.size());
        FrameHeader::new(length, FrameType::Headers, flags, self.stream_id).encode(dst);
        dst.put_slice(&self.block_fragment);
        Ok(())
    }
}
