use bytes::Bytes;
use framemux_frame::{Metadata, STATUS};

use crate::error::{Result, RpcError};

/// Handler completed successfully.
pub const STATUS_OK: u16 = 200;
/// No handler is registered for the requested path.
pub const STATUS_NOT_FOUND: u16 = 404;
/// The handler failed; the payload carries its message.
pub const STATUS_INTERNAL: u16 = 500;

/// A unary reply as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub metadata: Metadata,
    pub payload: Bytes,
}

impl Response {
    pub(crate) fn new(metadata: Metadata, payload: Bytes) -> Self {
        Self {
            status: status_of(&metadata),
            metadata,
            payload,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The payload for a 2xx reply, otherwise [`RpcError::Status`] with the
    /// payload as the message.
    pub fn into_result(self) -> Result<Bytes> {
        if self.is_success() {
            return Ok(self.payload);
        }
        Err(RpcError::Status {
            status: self.status,
            message: String::from_utf8_lossy(&self.payload).into_owned(),
        })
    }
}

/// Read `:status`; missing, repeated or non-numeric values count as 500.
pub fn status_of(metadata: &Metadata) -> u16 {
    metadata
        .scalar(STATUS)
        .and_then(|status| status.parse().ok())
        .unwrap_or(STATUS_INTERNAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_defaults_to_internal() {
        assert_eq!(status_of(&Metadata::new()), STATUS_INTERNAL);
        assert_eq!(
            status_of(&Metadata::new().with(STATUS, "abc")),
            STATUS_INTERNAL
        );
        let mut repeated = Metadata::new().with(STATUS, "200");
        repeated.append(STATUS, "201");
        assert_eq!(status_of(&repeated), STATUS_INTERNAL);
    }

    #[test]
    fn success_yields_payload() {
        let response = Response::new(
            Metadata::new().with(STATUS, "200"),
            Bytes::from_static(b"ok"),
        );
        assert!(response.is_success());
        assert_eq!(response.into_result().unwrap().as_ref(), b"ok");
    }

    #[test]
    fn failure_carries_message() {
        let response = Response::new(
            Metadata::new().with(STATUS, "500"),
            Bytes::from_static(b"boom"),
        );
        let err = response.into_result().unwrap_err();
        assert!(matches!(
            err,
            RpcError::Status { status: 500, ref message } if message == "boom"
        ));
        assert_eq!(err.status(), Some(500));
    }
}
