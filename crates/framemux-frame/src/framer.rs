use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::FrameConfig;
use crate::data::DataFrame;
use crate::error::{FrameError, Result};
use crate::frame::Frame;
use crate::header::{FrameHeader, FrameType, HEADER_SIZE, MAX_FRAME_SIZE};
use crate::headers::HeadersFrame;

/// Stateless translator between whole-frame byte buffers and [`Frame`]s.
#[derive(Debug, Clone)]
pub struct Framer {
    max_frame_size: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    /// The configured limit is clamped to [`MAX_FRAME_SIZE`].
    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            max_frame_size: config.max_frame_size.min(MAX_FRAME_SIZE),
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Encode `frame` into a buffer of exactly `frame.size()` bytes.
    pub fn write_frame(&self, frame: &Frame) -> Result<Bytes> {
        let size = frame.size();
        let body_len = size - HEADER_SIZE;
        if body_len > self.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: body_len,
                max: self.max_frame_size,
            });
        }
        let mut buf = BytesMut::with_capacity(size);
        frame.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode one complete frame from `buf`.
    pub fn read_frame(&self, buf: Bytes) -> Result<Frame> {
        let declared = FrameHeader::declared_length(&buf)?;
        let header = FrameHeader::decode(&buf)?;
        let body = buf.slice(HEADER_SIZE..);

        if declared > self.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: declared,
                max: self.max_frame_size,
            });
        }
        if body.len() != header.length as usize {
            return Err(FrameError::LengthMismatch {
                declared: header.length as usize,
                actual: body.len(),
            });
        }

        trace!(
            stream_id = header.stream_id,
            frame_type = header.frame_type,
            flags = header.flags,
            len = header.length,
            "read frame"
        );

        match header.kind() {
            Some(FrameType::Data) => DataFrame::decode(&header, body).map(Frame::Data),
            Some(FrameType::Headers) => HeadersFrame::decode(&header, body).map(Frame::Headers),
            _ => Err(FrameError::UnknownType(header.frame_type)),
        }
    }
}
