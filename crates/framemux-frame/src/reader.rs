use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::codec::{FrameCodec, FrameConfig};
use crate::error::{FrameError, Result};
use crate::frame::Frame;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reads complete frames from any `AsyncRead` byte stream.
///
/// Handles partial reads internally: callers always get complete frames.
pub struct FrameReader<R> {
    inner: FramedRead<R, FrameCodec>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, &FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: R, config: &FrameConfig) -> Self {
        Self {
            inner: FramedRead::with_capacity(
                inner,
                FrameCodec::with_config(config),
                INITIAL_BUFFER_CAPACITY,
            ),
        }
    }

    /// Read the next complete frame.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        match self.inner.next().await {
            Some(result) => result,
            None => Err(FrameError::ConnectionClosed),
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        self.inner.get_mut()
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}
