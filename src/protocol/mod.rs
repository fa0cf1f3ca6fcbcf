//! RFC 6455 wire-level protocol: opcodes, frame headers, masking, and
//! incremental UTF-8 validation.

pub mod header;
pub mod mask;
pub mod opcode;
pub mod utf8;

pub use header::{FrameHeader, MAX_CONTROL_PAYLOAD, MAX_HEADER_SIZE};
pub use mask::apply_mask;
pub use opcode::OpCode;
pub use utf8::Utf8Validator;
