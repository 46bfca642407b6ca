use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{FrameError, Result};
use crate::frame::Frame;
use crate::framer::Framer;
use crate::header::{FrameHeader, HEADER_SIZE, MAX_FRAME_SIZE};

/// Configuration for frame encoding/decoding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum body size in bytes. Default and upper bound: `2^23 - 1`.
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

/// `tokio_util` codec splitting a byte stream into [`Frame`]s.
///
/// The declared length is checked as soon as the 9-byte header is buffered,
/// so an oversized frame is rejected without waiting for its body.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    framer: Framer,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            framer: Framer::with_config(config),
        }
    }

    pub fn framer(&self) -> &Framer {
        &self.framer
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let declared = FrameHeader::declared_length(src)?;
        if declared > self.framer.max_frame_size() {
            return Err(FrameError::FrameTooLarge {
                size: declared,
                max: self.framer.max_frame_size(),
            });
        }

        let total = HEADER_SIZE + declared;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let buf = src.split_to(total).freeze();
        self.framer.read_frame(buf).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let encoded = self.framer.write_frame(&frame)?;
        dst.extend_from_slice(&encoded);
        Ok(())
    }
}

/// Pass-through for frames already encoded by a [`Framer`].
impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(&frame);
        Ok(())
    }
}
