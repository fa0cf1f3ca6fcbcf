//! The connection-level engine: roles, state machine, keep-alive, and the
//! [`WebSocketFramer`] itself.

#[allow(clippy::module_inception)]
mod framer;
mod keepalive;
mod role;
mod state;

pub use framer::WebSocketFramer;
pub use role::Role;
pub use state::ProtocolState;
