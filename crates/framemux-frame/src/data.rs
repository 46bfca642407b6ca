use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Result;
use crate::frame::{check_body_len, strip_padding};
use crate::header::{flags, FrameHeader, FrameType, HEADER_SIZE};

/// A DATA frame: opaque application payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub stream_id: u32,
    pub data: Bytes,
    pub end_stream: bool,
}

impl DataFrame {
    pub fn new(stream_id: u32, data: impl Into<Bytes>, end_stream: bool) -> Self {
        Self {
            stream_id,
            data: data.into(),
            end_stream,
        }
    }

    /// Decode a DATA body. Padding, if flagged, is stripped.
    pub fn decode(header: &FrameHeader, body: Bytes) -> Result<Self> {
        let data = if header.has_flag(flags::PADDED) {
            strip_padding(body)?
        } else {
            body
        };
        Ok(Self {
            stream_id: header.stream_id,
            data,
            end_stream: header.has_flag(flags::END_STREAM),
        })
    }

    /// Serialized size including the 9-byte header.
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.data.len()
    }

    /// Append the encoded frame to `dst`. Never emits padding.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        let length = check_body_len(self.data.len())?;
        let flags = if self.end_stream { flags::END_STREAM } else { 0 };
        dst.reserve(self.size());
        FrameHeader::new(length, FrameType::Data, flags, self.stream_id).encode(dst);
        dst.put_slice(&self.data);
        Ok(())
    }
}
