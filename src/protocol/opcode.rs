//! Frame opcodes (RFC 6455 Section 5.2, 4-bit opcode field).

use crate::error::{Error, Result};

/// The opcode nibble of a frame header.
///
/// Opcodes 0x3-0x7 and 0xB-0xF are reserved and never leave `from_u8`, so
/// everything past parsing can rely on the six real values. Continuation
/// carries no message type of its own; the receive path substitutes the
/// opcode of the frame that opened the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[non_exhaustive]
pub enum OpCode {
    /// Follow-up fragment of a fragmented message (0x0).
    Continuation = 0x0,
    /// UTF-8 text payload (0x1).
    Text = 0x1,
    /// Opaque binary payload (0x2).
    Binary = 0x2,
    /// Close handshake frame (0x8), optional status code plus reason.
    Close = 0x8,
    /// Keep-alive probe (0x9); the receiver answers with a pong.
    Ping = 0x9,
    /// Answer to a ping (0xA), or an unsolicited heartbeat.
    Pong = 0xA,
}

impl OpCode {
    /// Decode the opcode nibble of an incoming frame.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOpcode`] for the reserved values 0x3-0x7 and
    /// 0xB-0xF (and anything above the nibble range).
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(Error::InvalidOpcode(other)),
        }
    }

    /// The wire value, ready to be OR-ed into the first header byte.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this opcode is a control frame (close, ping, pong).
    ///
    /// Control frames may interleave with a fragmented message and are
    /// subject to the final-and-small rules enforced at header parse.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        self.as_u8() & 0x8 != 0
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OpCode::Continuation => "Continuation",
            OpCode::Text => "Text",
            OpCode::Binary => "Binary",
            OpCode::Close => "Close",
            OpCode::Ping => "Ping",
            OpCode::Pong => "Pong",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_value_roundtrip() {
        for opcode in [
            OpCode::Continuation,
            OpCode::Text,
            OpCode::Binary,
            OpCode::Close,
            OpCode::Ping,
            OpCode::Pong,
        ] {
            assert_eq!(OpCode::from_u8(opcode.as_u8()), Ok(opcode));
        }
    }

    #[test]
    fn test_reserved_nibbles_rejected() {
        for byte in (0x3..=0x7).chain(0xB..=0xF) {
            assert_eq!(OpCode::from_u8(byte), Err(Error::InvalidOpcode(byte)));
        }
        // Out of nibble range entirely.
        assert_eq!(OpCode::from_u8(0x10), Err(Error::InvalidOpcode(0x10)));
    }

    #[test]
    fn test_control_bit() {
        assert!(OpCode::Close.is_control());
        assert!(OpCode::Ping.is_control());
        assert!(OpCode::Pong.is_control());
        assert!(!OpCode::Continuation.is_control());
        assert!(!OpCode::Text.is_control());
        assert!(!OpCode::Binary.is_control());
    }

    #[test]
    fn test_display_names() {
        assert_eq!(OpCode::Ping.to_string(), "Ping");
        assert_eq!(OpCode::Continuation.to_string(), "Continuation");
    }
}
