//! Message types, receive results, and close codes (RFC 6455 Section 7.4).

/// Type of an outgoing data message.
///
/// Control frames (close, ping, pong) are never sent through
/// [`WebSocketFramer::send`](crate::WebSocketFramer::send); close frames go
/// through the close operations and ping/pong are handled internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Text message. Payload must be valid UTF-8.
    Text,
    /// Binary message. Payload is arbitrary bytes.
    Binary,
}

/// Result of a single [`receive`](crate::WebSocketFramer::receive) call.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReceiveResult {
    /// Payload bytes were copied into the caller's buffer.
    Data {
        /// Number of bytes written to the caller's buffer.
        count: usize,
        /// Message type; continuation frames report the type of the message
        /// they continue.
        kind: MessageType,
        /// `true` if this delivery reaches the end of a final frame.
        end_of_message: bool,
    },
    /// A close frame was received. The status and reason are also recorded on
    /// the framer and readable via
    /// [`close_status`](crate::WebSocketFramer::close_status) /
    /// [`close_description`](crate::WebSocketFramer::close_description).
    Close {
        /// The peer's close status code.
        status: CloseCode,
        /// The peer's close reason, possibly empty.
        reason: String,
    },
}

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000). The connection successfully completed.
    #[default]
    Normal,
    /// Going away (1001). Endpoint is going away.
    GoingAway,
    /// Protocol error (1002). Malformed frame or protocol violation.
    ProtocolError,
    /// Unsupported data (1003). Endpoint received a data type it cannot handle.
    UnsupportedData,
    /// No status received (1005). Synthesized locally when the peer's close
    /// frame carries an empty payload; never valid on the wire.
    NoStatusReceived,
    /// Invalid payload (1007). Message data inconsistent with its type
    /// (e.g. non-UTF-8 in a text message).
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    MessageTooBig,
    /// Mandatory extension (1010).
    MandatoryExtension,
    /// Internal error (1011).
    InternalError,
    /// Any other code (registered 1012-1014, library/application 3000-4999,
    /// or an invalid value observed on the wire).
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1005 => CloseCode::NoStatusReceived,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::NoStatusReceived => 1005,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Check whether a code received in a close frame is acceptable.
    ///
    /// Within the protocol band (1000-2999) only the individually registered
    /// codes are accepted; 3000-3999 (libraries/frameworks) and 4000-4999
    /// (private use) are accepted wholesale; everything else is a protocol
    /// error.
    #[must_use]
    pub const fn is_valid_received(&self) -> bool {
        matches!(self.as_u16(), 1000..=1003 | 1007..=1011 | 3000..=4999)
    }

    /// Check whether this code may be sent in a close frame per RFC 6455
    /// Section 7.4.1.
    ///
    /// Registered codes 1012-1014 are sendable; the reserved codes
    /// 1004-1006 and 1015 are not.
    #[must_use]
    pub const fn is_valid_to_send(&self) -> bool {
        matches!(self.as_u16(), 1000..=1003 | 1007..=1014 | 3000..=4999)
    }

    /// Check if this code is reserved and must never appear in a close frame.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        matches!(self.as_u16(), 1004..=1006 | 1015)
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_code_from_u16() {
        assert_eq!(CloseCode::from_u16(1000), CloseCode::Normal);
        assert_eq!(CloseCode::from_u16(1001), CloseCode::GoingAway);
        assert_eq!(CloseCode::from_u16(1002), CloseCode::ProtocolError);
        assert_eq!(CloseCode::from_u16(1003), CloseCode::UnsupportedData);
        assert_eq!(CloseCode::from_u16(1005), CloseCode::NoStatusReceived);
        assert_eq!(CloseCode::from_u16(1007), CloseCode::InvalidPayload);
        assert_eq!(CloseCode::from_u16(1008), CloseCode::PolicyViolation);
        assert_eq!(CloseCode::from_u16(1009), CloseCode::MessageTooBig);
        assert_eq!(CloseCode::from_u16(1010), CloseCode::MandatoryExtension);
        assert_eq!(CloseCode::from_u16(1011), CloseCode::InternalError);
        assert_eq!(CloseCode::from_u16(4000), CloseCode::Other(4000));
    }

    #[test]
    fn test_close_code_roundtrip() {
        for code in [1000u16, 1001, 1002, 1003, 1007, 1008, 1009, 1010, 1011, 3333, 4999] {
            assert_eq!(CloseCode::from_u16(code).as_u16(), code);
        }
    }

    #[test]
    fn test_received_code_ranges() {
        assert!(CloseCode::Normal.is_valid_received());
        assert!(CloseCode::InternalError.is_valid_received());
        assert!(CloseCode::Other(3000).is_valid_received());
        assert!(CloseCode::Other(4999).is_valid_received());

        assert!(!CloseCode::Other(0).is_valid_received());
        assert!(!CloseCode::Other(999).is_valid_received());
        assert!(!CloseCode::Other(1004).is_valid_received());
        assert!(!CloseCode::Other(1005).is_valid_received());
        assert!(!CloseCode::Other(1006).is_valid_received());
        // Registered after the base RFC; not in the accepted receive set.
        assert!(!CloseCode::Other(1012).is_valid_received());
        assert!(!CloseCode::Other(2999).is_valid_received());
        assert!(!CloseCode::Other(5000).is_valid_received());
    }

    #[test]
    fn test_sendable_code_ranges() {
        assert!(CloseCode::Normal.is_valid_to_send());
        assert!(CloseCode::Other(1012).is_valid_to_send());
        assert!(CloseCode::Other(1014).is_valid_to_send());
        assert!(CloseCode::Other(3000).is_valid_to_send());

        assert!(!CloseCode::Other(1004).is_valid_to_send());
        assert!(!CloseCode::Other(1005).is_valid_to_send());
        assert!(!CloseCode::Other(1006).is_valid_to_send());
        assert!(!CloseCode::Other(1015).is_valid_to_send());
        assert!(!CloseCode::Other(999).is_valid_to_send());
    }

    #[test]
    fn test_reserved_codes() {
        assert!(CloseCode::Other(1004).is_reserved());
        assert!(CloseCode::NoStatusReceived.is_reserved());
        assert!(CloseCode::Other(1006).is_reserved());
        assert!(CloseCode::Other(1015).is_reserved());
        assert!(!CloseCode::Normal.is_reserved());
        assert!(!CloseCode::Other(3000).is_reserved());
    }

    #[test]
    fn test_close_code_display() {
        assert_eq!(CloseCode::Normal.to_string(), "1000");
        assert_eq!(CloseCode::Other(4321).to_string(), "4321");
    }
}
