use bytes::{Bytes, BytesMut};

use crate::data::DataFrame;
use crate::error::{FrameError, Result};
use crate::header::{FrameType, MAX_FRAME_SIZE};
use crate::headers::HeadersFrame;

/// One unit of the wire protocol.
///
/// The frame-type set is closed: anything other than DATA or HEADERS is a
/// framing error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data(DataFrame),
    Headers(HeadersFrame),
}

impl Frame {
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Data(_) => FrameType::Data,
            Frame::Headers(_) => FrameType::Headers,
        }
    }

    pub fn stream_id(&self) -> u32 {
        match self {
            Frame::Data(frame) => frame.stream_id,
            Frame::Headers(frame) => frame.stream_id,
        }
    }

    /// Whether this is the sender's last frame on the stream.
    pub fn end_stream(&self) -> bool {
        match self {
            Frame::Data(frame) => frame.end_stream,
            Frame::Headers(frame) => frame.end_stream,
        }
    }

    /// Serialized size including the 9-byte header.
    pub fn size(&self) -> usize {
        match self {
            Frame::Data(frame) => frame.size(),
            Frame::Headers(frame) => frame.size(),
        }
    }

    /// Append the encoded frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        match self {
            Frame::Data(frame) => frame.encode(dst),
            Frame::Headers(frame) => frame.encode(dst),
        }
    }
}

impl From<DataFrame> for Frame {
    fn from(frame: DataFrame) -> Self {
        Frame::Data(frame)
    }
}

impl From<HeadersFrame> for Frame {
    fn from(frame: HeadersFrame) -> Self {
        Frame::Headers(frame)
    }
}

/// Remove the 1-byte pad length prefix and the trailing pad bytes.
pub(crate) fn strip_padding(mut body: Bytes) -> Result<Bytes> {
    let body_len = body.len();
    let pad_len = match body.first() {
        Some(&pad) => pad as usize,
        None => {
            return Err(FrameError::InvalidPadding {
                pad_len: 0,
                body_len: 0,
            })
        }
    };
    if pad_len >= body_len {
        return Err(FrameError::InvalidPadding { pad_len, body_len });
    }
    body.truncate(body_len - pad_len);
    Ok(body.slice(1..))
}

/// Validate a body length against the frame size ceiling.
pub(crate) fn check_body_len(len: usize) -> Result<u32> {
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(len as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_dispatch_by_variant() {
        let data = Frame::from(DataFrame::new(3, Bytes::from_static(b"abc"), true));
        assert_eq!(data.frame_type(), FrameType::Data);
        assert_eq!(data.stream_id(), 3);
        assert!(data.end_stream());
        assert_eq!(data.size(), 12);

        let headers = Frame::from(HeadersFrame::new(4, Bytes::new(), false));
        assert_eq!(headers.frame_type(), FrameType::Headers);
        assert_eq!(headers.stream_id(), 4);
        assert!(!headers.end_stream());
    }

    #[test]
    fn size_matches_encoded_length() {
        let frames = [
            Frame::from(DataFrame::new(1, vec![7u8; 300], false)),
            Frame::from(HeadersFrame::new(2, Bytes::from_static(b"{\"a\":[\"b\"]}"), true)),
        ];
        for frame in frames {
            let mut buf = BytesMut::new();
            frame.encode(&mut buf).unwrap();
            assert_eq!(buf.len(), frame.size());
        }
    }

    #[test]
    fn strip_padding_rejects_empty_body() {
        assert!(matches!(
            strip_padding(Bytes::new()),
            Err(FrameError::InvalidPadding { .. })
        ));
    }

    #[test]
    fn strip_padding_allows_empty_payload() {
        let stripped = strip_padding(Bytes::from_static(&[2, 0, 0])).unwrap();
        assert!(stripped.is_empty());
    }

    #[test]
    fn oversized_body_is_rejected_on_encode() {
        let frame = DataFrame::new(1, vec![0u8; MAX_FRAME_SIZE + 1], false);
        let err = frame.encode(&mut BytesMut::new()).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
    }
}
