//! # wsframe - Managed WebSocket Framing Engine
//!
//! `wsframe` is an RFC 6455 framing engine over an arbitrary, already
//! connected duplex byte stream.
//!
//! ## Features
//!
//! - **Frame parsing and encoding** with bit-exact RFC 6455 headers
//! - **Fragmentation and continuation** with interleaved control frames
//! - **Streaming masking** with the XOR offset carried across partial reads
//! - **Incremental UTF-8 validation** of text messages, split-safe
//! - **Close handshake** in either order, plus hard abort
//! - **Concurrency-safe**: one send and one receive may run at once
//!
//! The HTTP upgrade handshake, extensions, and TLS are the caller's concern:
//! hand the engine a stream on which the handshake has already completed.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tokio_util::sync::CancellationToken;
//! use wsframe::{FramerConfig, MessageType, Role, WebSocketFramer};
//!
//! let ws = WebSocketFramer::from_connected_stream(stream, Role::Client, FramerConfig::new());
//! let cancel = CancellationToken::new();
//! ws.send(b"hello", MessageType::Text, true, &cancel).await?;
//! ```

pub mod config;
pub mod error;
pub mod framer;
pub mod message;
pub mod protocol;

pub use config::FramerConfig;
pub use error::{Error, Result};
pub use framer::{ProtocolState, Role, WebSocketFramer};
pub use message::{CloseCode, MessageType, ReceiveResult};
pub use protocol::OpCode;
