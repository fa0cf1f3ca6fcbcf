//! Configuration for the framing engine.

use std::time::Duration;

/// Minimum usable receive buffer: a full frame header (14 bytes) plus the
/// largest control-frame payload (125 bytes).
pub const MIN_RECEIVE_BUFFER_SIZE: usize =
    crate::protocol::MAX_HEADER_SIZE + crate::protocol::MAX_CONTROL_PAYLOAD;

/// Configuration for a [`WebSocketFramer`](crate::WebSocketFramer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramerConfig {
    /// Interval between unsolicited keep-alive pings.
    ///
    /// If `None` (or zero), no keep-alive task is spawned.
    ///
    /// Default: None
    pub keep_alive_interval: Option<Duration>,

    /// Internal receive buffer size (in bytes).
    ///
    /// Values below [`MIN_RECEIVE_BUFFER_SIZE`] are clamped up so that any
    /// frame header and any control-frame payload fit in a single buffered
    /// read.
    ///
    /// Default: 8 KB (8192)
    pub receive_buffer_size: usize,

    /// Negotiated subprotocol, if any. Reported verbatim by
    /// [`subprotocol`](crate::WebSocketFramer::subprotocol).
    ///
    /// Default: None
    pub subprotocol: Option<String>,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            keep_alive_interval: None,
            receive_buffer_size: 8192,
            subprotocol: None,
        }
    }
}

impl FramerConfig {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the keep-alive ping interval.
    ///
    /// A zero interval disables keep-alive, same as never setting one.
    #[must_use]
    pub const fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = if interval.is_zero() {
            None
        } else {
            Some(interval)
        };
        self
    }

    /// Set the receive buffer size.
    #[must_use]
    pub const fn with_receive_buffer_size(mut self, size: usize) -> Self {
        self.receive_buffer_size = size;
        self
    }

    /// Set the negotiated subprotocol.
    #[must_use]
    pub fn with_subprotocol(mut self, subprotocol: impl Into<String>) -> Self {
        self.subprotocol = Some(subprotocol.into());
        self
    }

    /// Receive buffer size after clamping to the minimum.
    #[must_use]
    pub const fn effective_buffer_size(&self) -> usize {
        if self.receive_buffer_size < MIN_RECEIVE_BUFFER_SIZE {
            MIN_RECEIVE_BUFFER_SIZE
        } else {
            self.receive_buffer_size
        }
    }
}
