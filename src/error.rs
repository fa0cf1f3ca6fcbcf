//! Error types for the WebSocket framing engine.
//!
//! Faults are flat variants so callers can distinguish protocol violations
//! from I/O-level closure from cancellation without string matching.

use thiserror::Error;

use crate::framer::ProtocolState;
use crate::message::CloseCode;

/// Result type alias for framer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket framing operations.
///
/// [`Error::InvalidState`] and argument-validation failures are raised before
/// any I/O and leave the connection usable; every other variant is terminal:
/// once received, the framer should be dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Reserved bits set in a frame header (no extensions are negotiated).
    #[error("reserved bits set in frame header")]
    ReservedBitsSet,

    /// An unknown or reserved opcode appeared on the wire.
    #[error("invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// A control frame arrived with the FIN bit clear.
    #[error("control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// A control frame payload exceeded 125 bytes. Carries the declared
    /// length, straight from the 64-bit extended-length field.
    #[error("control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(u64),

    /// A server received an unmasked frame.
    #[error("client frame must be masked")]
    UnmaskedFrame,

    /// A client received a masked frame.
    #[error("server frame must not be masked")]
    MaskedFrame,

    /// A continuation frame arrived but the previous data frame was final.
    #[error("continuation frame without a message to continue")]
    UnexpectedContinuation,

    /// A text/binary frame arrived while a fragmented message was unfinished.
    #[error("expected continuation frame")]
    ExpectedContinuation,

    /// A close frame carried a status code outside the valid ranges.
    #[error("invalid close status code: {0}")]
    InvalidCloseCode(u16),

    /// A malformed close frame payload: length of exactly one byte, a
    /// non-UTF-8 reason, or an outgoing reason longer than 123 bytes.
    #[error("invalid close frame payload")]
    InvalidClosePayload,

    /// Invalid UTF-8 in a text message or close description.
    #[error("invalid UTF-8 in text payload")]
    InvalidUtf8,

    /// The underlying stream ended before an expected amount of data arrived.
    #[error("connection closed prematurely")]
    ConnectionClosedPrematurely,

    /// The framer was disposed while the operation was outstanding.
    #[error("framer disposed")]
    Disposed,

    /// The operation was cancelled, or the connection was aborted.
    #[error("operation aborted")]
    OperationAborted,

    /// The operation is not allowed in the current protocol state.
    /// Raised before any I/O; the connection remains usable.
    #[error("operation invalid in state {0}")]
    InvalidState(ProtocolState),

    /// A second operation of the named kind was issued while one was already
    /// in flight. The connection is aborted.
    #[error("another {0} operation is already in progress")]
    ConcurrentOperation(&'static str),

    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Whether this error is a wire-protocol violation by the peer.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::ReservedBitsSet
                | Error::InvalidOpcode(_)
                | Error::FragmentedControlFrame
                | Error::ControlFrameTooLarge(_)
                | Error::UnmaskedFrame
                | Error::MaskedFrame
                | Error::UnexpectedContinuation
                | Error::ExpectedContinuation
                | Error::InvalidCloseCode(_)
                | Error::InvalidClosePayload
        )
    }

    /// The close status that should be sent to the peer when this error is
    /// detected on the receive path, if any.
    #[must_use]
    pub const fn close_status(&self) -> Option<CloseCode> {
        if self.is_protocol() {
            Some(CloseCode::ProtocolError)
        } else if matches!(self, Error::InvalidUtf8) {
            Some(CloseCode::InvalidPayload)
        } else {
            None
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::ControlFrameTooLarge(126).to_string(),
            "control frame payload too large: 126 bytes (max: 125)"
        );
        assert_eq!(
            Error::InvalidCloseCode(1005).to_string(),
            "invalid close status code: 1005"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_protocol_classification() {
        assert!(Error::ReservedBitsSet.is_protocol());
        assert!(Error::InvalidClosePayload.is_protocol());
        assert!(!Error::InvalidUtf8.is_protocol());
        assert!(!Error::ConnectionClosedPrematurely.is_protocol());
        assert!(!Error::OperationAborted.is_protocol());
    }

    #[test]
    fn test_close_status_mapping() {
        assert_eq!(
            Error::ReservedBitsSet.close_status(),
            Some(CloseCode::ProtocolError)
        );
        assert_eq!(
            Error::InvalidUtf8.close_status(),
            Some(CloseCode::InvalidPayload)
        );
        assert_eq!(Error::ConnectionClosedPrematurely.close_status(), None);
    }

    #[test]
    fn test_error_clone() {
        let err = Error::InvalidUtf8;
        assert_eq!(err.clone(), err);
    }
}
