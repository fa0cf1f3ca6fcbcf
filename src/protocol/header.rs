//! Frame header parsing and encoding (RFC 6455 Section 5.2).

use crate::error::{Error, Result};
use crate::protocol::opcode::OpCode;

/// Largest possible frame header: 2 bytes base, 8 bytes extended length,
/// 4 bytes masking key.
pub const MAX_HEADER_SIZE: usize = 14;

/// Maximum payload of a control frame (close, ping, pong).
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// A parsed frame header.
///
/// `payload_remaining` starts at the frame's declared payload length and is
/// counted down by the receive loop as payload bytes are consumed, so the
/// header describes the *rest* of the in-progress frame at any point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Frame opcode.
    pub opcode: OpCode,
    /// FIN bit: `true` if this is the final frame of its message.
    pub fin: bool,
    /// Payload bytes not yet consumed.
    pub payload_remaining: u64,
    /// Masking key, if the frame is masked.
    pub mask: Option<[u8; 4]>,
}

impl FrameHeader {
    /// Header describing a fully consumed final frame. Used as the initial
    /// receive state so the first real frame is not mistaken for an
    /// unexpected continuation.
    #[must_use]
    pub const fn consumed() -> Self {
        Self {
            opcode: OpCode::Text,
            fin: true,
            payload_remaining: 0,
            mask: None,
        }
    }
}

/// Total header size implied by the first two header bytes.
///
/// Call with the second header byte once two bytes are buffered, then buffer
/// the rest of the header before calling [`parse`].
#[must_use]
pub const fn header_size(byte2: u8) -> usize {
    let mut size = 2;
    match byte2 & 0x7F {
        126 => size += 2,
        127 => size += 8,
        _ => {}
    }
    if byte2 & 0x80 != 0 {
        size += 4;
    }
    size
}

/// Parse a complete frame header from the front of `buf`.
///
/// The caller must have buffered at least [`header_size`]`(buf[1])` bytes.
/// Returns the header and the number of header bytes consumed.
///
/// Validates the reserved bits, the opcode, and the control-frame rules
/// (control frames must be final and carry at most 125 payload bytes).
/// Mask presence is reported but not judged here; whether a mask is required
/// or forbidden depends on the endpoint role.
///
/// # Errors
///
/// Returns [`Error::ReservedBitsSet`], [`Error::InvalidOpcode`],
/// [`Error::FragmentedControlFrame`], or [`Error::ControlFrameTooLarge`].
pub fn parse(buf: &[u8]) -> Result<(FrameHeader, usize)> {
    debug_assert!(buf.len() >= 2 && buf.len() >= header_size(buf[1]));

    let byte1 = buf[0];
    let byte2 = buf[1];

    // No extensions are negotiated, so all RSV bits must be clear.
    if byte1 & 0x70 != 0 {
        return Err(Error::ReservedBitsSet);
    }

    let opcode = OpCode::from_u8(byte1 & 0x0F)?;
    let fin = byte1 & 0x80 != 0;
    let masked = byte2 & 0x80 != 0;

    let mut pos = 2;
    let payload_remaining = match byte2 & 0x7F {
        126 => {
            let len = u64::from(u16::from_be_bytes([buf[2], buf[3]]));
            pos += 2;
            len
        }
        127 => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&buf[2..10]);
            pos += 8;
            u64::from_be_bytes(bytes)
        }
        len => u64::from(len),
    };

    if opcode.is_control() {
        if !fin {
            return Err(Error::FragmentedControlFrame);
        }
        if payload_remaining > MAX_CONTROL_PAYLOAD as u64 {
            return Err(Error::ControlFrameTooLarge(payload_remaining));
        }
    }

    let mask = if masked {
        let key = [buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]];
        pos += 4;
        Some(key)
    } else {
        None
    };

    Ok((
        FrameHeader {
            opcode,
            fin,
            payload_remaining,
            mask,
        },
        pos,
    ))
}

/// Encode a frame header into `out`, returning the number of bytes written.
pub fn write(
    opcode: OpCode,
    fin: bool,
    payload_len: usize,
    mask: Option<[u8; 4]>,
    out: &mut [u8; MAX_HEADER_SIZE],
) -> usize {
    out[0] = opcode.as_u8();
    if fin {
        out[0] |= 0x80;
    }

    let mut pos = 2;
    if payload_len <= 125 {
        out[1] = payload_len as u8;
    } else if payload_len <= u16::MAX as usize {
        out[1] = 126;
        out[2..4].copy_from_slice(&(payload_len as u16).to_be_bytes());
        pos += 2;
    } else {
        out[1] = 127;
        out[2..10].copy_from_slice(&(payload_len as u64).to_be_bytes());
        pos += 8;
    }

    if let Some(key) = mask {
        out[1] |= 0x80;
        out[pos..pos + 4].copy_from_slice(&key);
        pos += 4;
    }

    pos
}
