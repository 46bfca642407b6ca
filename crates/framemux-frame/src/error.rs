/// Errors that can occur during frame encoding/decoding.
///
/// Every variant except [`FrameError::Io`] describes a malformed frame. There
/// is no partial-frame recovery: a connection that sees one must be torn down.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The declared body length exceeds the frame size ceiling.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The buffer does not hold exactly one frame of the declared length.
    #[error("frame length mismatch (declared {declared} body bytes, got {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    /// The buffer is shorter than the fixed frame header.
    #[error("truncated frame header ({0} bytes)")]
    TruncatedHeader(usize),

    /// The type code is not DATA or HEADERS.
    #[error("unknown frame type 0x{0:02x}")]
    UnknownType(u8),

    /// PADDED flag set but the pad length does not fit in the body.
    #[error("invalid padding: pad length {pad_len} >= body length {body_len}")]
    InvalidPadding { pad_len: usize, body_len: usize },

    /// PRIORITY flag set but the body cannot hold the 5-byte priority block.
    #[error("invalid HEADERS frame: priority flag set, but body is {0} bytes")]
    PriorityTooShort(usize),

    /// The HEADERS block is not a JSON object of string lists.
    #[error("invalid metadata block: {0}")]
    InvalidMetadata(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
