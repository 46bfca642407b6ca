/// Errors that can occur on a connection or one of its streams.
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] framemux_transport::TransportError),

    /// Frame-level error. Always fatal for the connection.
    #[error("frame error: {0}")]
    Frame(#[from] framemux_frame::FrameError),

    /// The connection has been shut down.
    #[error("connection closed")]
    ConnectionClosed,

    /// The local half of the stream already sent END_STREAM.
    #[error("stream {0}: send after local half-close")]
    SendAfterClose(u32),

    /// The peer sent a frame after ending its half of the stream.
    #[error("stream {0}: frame received after END_STREAM")]
    FrameAfterEndStream(u32),

    /// The peer addressed a stream that has already been closed.
    #[error("stream {0} is closed")]
    StreamClosed(u32),

    /// The peer addressed a stream that was never opened.
    #[error("unknown stream {0}")]
    UnknownStream(u32),

    /// Push on a closed backpressure queue.
    #[error("queue closed")]
    QueueClosed,

    /// A second receive while another is still pending.
    #[error("concurrent receive on single-consumer queue")]
    ConcurrentReceive,

    /// The local stream id space is used up.
    #[error("stream ids exhausted")]
    StreamIdsExhausted,

    /// A connection I/O task panicked or was aborted.
    #[error("connection task failed: {0}")]
    Task(String),
}

impl ConnError {
    /// Whether this error requires tearing the whole connection down.
    ///
    /// Framing and transport failures leave the byte stream in an unknown
    /// state, and protocol violations by the peer are not tolerated.
    /// Everything else is scoped to one stream or call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Frame(_)
                | Self::FrameAfterEndStream(_)
                | Self::StreamClosed(_)
                | Self::UnknownStream(_)
                | Self::Task(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ConnError>;
