use bytes::Bytes;
use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;

use crate::codec::{FrameCodec, FrameConfig};
use crate::error::Result;
use crate::frame::Frame;

/// Writes complete frames to any `AsyncWrite` byte stream.
pub struct FrameWriter<W> {
    inner: FramedWrite<W, FrameCodec>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, &FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: W, config: &FrameConfig) -> Self {
        Self {
            inner: FramedWrite::new(inner, FrameCodec::with_config(config)),
        }
    }

    /// Encode and write one frame, then flush.
    pub async fn write_frame(&mut self, frame: Frame) -> Result<()> {
        self.inner.send(frame).await
    }

    /// Write one already-encoded frame, then flush.
    pub async fn write_raw(&mut self, frame: Bytes) -> Result<()> {
        self.inner.send(frame).await
    }

    /// Flush buffered bytes to the underlying stream.
    pub async fn flush(&mut self) -> Result<()> {
        <FramedWrite<W, FrameCodec> as SinkExt<Frame>>::flush(&mut self.inner).await
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        self.inner.get_ref()
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}
