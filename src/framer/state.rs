//! Connection state machine for the close handshake.
//!
//! The close handshake is symmetric: each side sends a close frame and each
//! side receives one, in either order. Both directions are folded into a
//! single state value with an explicit transition table, so "close sent" is
//! `CloseSent | Closed` and "close received" is `CloseReceived | Closed`
//! rather than separate booleans.

use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::message::CloseCode;

/// Lifecycle state of a WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ProtocolState {
    /// Open for data transfer in both directions.
    #[default]
    Open,
    /// We sent a close frame; still receiving until the peer's close arrives.
    CloseSent,
    /// The peer's close frame was received; we may still send until our own
    /// close frame goes out.
    CloseReceived,
    /// Close frames have been exchanged in both directions.
    Closed,
    /// Torn down without a close handshake.
    Aborted,
}

impl ProtocolState {
    /// Check if the connection has reached a terminal state.
    #[must_use]
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, ProtocolState::Closed | ProtocolState::Aborted)
    }
}

impl std::fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolState::Open => write!(f, "Open"),
            ProtocolState::CloseSent => write!(f, "CloseSent"),
            ProtocolState::CloseReceived => write!(f, "CloseReceived"),
            ProtocolState::Closed => write!(f, "Closed"),
            ProtocolState::Aborted => write!(f, "Aborted"),
        }
    }
}

#[derive(Debug)]
struct StateInner {
    state: ProtocolState,
    disposed: bool,
    close_status: Option<CloseCode>,
    close_description: Option<String>,
}

/// Shared connection state under its own dedicated lock.
///
/// This is the only state touched by both the send and receive paths, so no
/// other lock is ever taken while this one is held.
#[derive(Debug)]
pub(crate) struct StateCell {
    inner: Mutex<StateInner>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(StateInner {
                state: ProtocolState::Open,
                disposed: false,
                close_status: None,
                close_description: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StateInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ProtocolState {
        self.lock().state
    }

    pub(crate) fn close_status(&self) -> Option<CloseCode> {
        self.lock().close_status
    }

    pub(crate) fn close_description(&self) -> Option<String> {
        self.lock().close_description.clone()
    }

    /// Fail fast if an operation is not permitted in the current state.
    ///
    /// Aborted connections report [`Error::OperationAborted`] regardless of
    /// which operation is attempted; a disposed connection reports
    /// [`Error::Disposed`].
    pub(crate) fn check(&self, valid: &[ProtocolState]) -> Result<()> {
        let inner = self.lock();
        if inner.state == ProtocolState::Aborted {
            return Err(Error::OperationAborted);
        }
        if inner.disposed {
            return Err(Error::Disposed);
        }
        if !valid.contains(&inner.state) {
            return Err(Error::InvalidState(inner.state));
        }
        Ok(())
    }

    /// Check whether our close frame has gone out.
    pub(crate) fn sent_close(&self) -> bool {
        matches!(
            self.lock().state,
            ProtocolState::CloseSent | ProtocolState::Closed
        )
    }

    /// Check whether the peer's close frame has been consumed.
    pub(crate) fn received_close(&self) -> bool {
        matches!(
            self.lock().state,
            ProtocolState::CloseReceived | ProtocolState::Closed
        )
    }

    /// Record that our close frame was written to the stream.
    pub(crate) fn on_close_sent(&self) {
        let mut inner = self.lock();
        inner.state = match inner.state {
            ProtocolState::Open | ProtocolState::CloseSent => ProtocolState::CloseSent,
            ProtocolState::CloseReceived | ProtocolState::Closed => ProtocolState::Closed,
            ProtocolState::Aborted => ProtocolState::Aborted,
        };
    }

    /// Record the peer's close frame. The first frame's status and
    /// description win; the close handshake never carries a second one.
    pub(crate) fn on_close_received(&self, status: CloseCode, description: String) {
        let mut inner = self.lock();
        if inner.close_status.is_none() {
            inner.close_status = Some(status);
            inner.close_description = Some(description);
        }
        inner.state = match inner.state {
            ProtocolState::Open | ProtocolState::CloseReceived => ProtocolState::CloseReceived,
            ProtocolState::CloseSent | ProtocolState::Closed => ProtocolState::Closed,
            ProtocolState::Aborted => ProtocolState::Aborted,
        };
    }

    /// Tear down without a handshake. A cleanly closed connection stays
    /// `Closed`; everything else becomes `Aborted`. Returns `true` the first
    /// time the connection actually transitions.
    pub(crate) fn abort(&self) -> bool {
        let mut inner = self.lock();
        inner.disposed = true;
        if matches!(inner.state, ProtocolState::Closed | ProtocolState::Aborted) {
            return false;
        }
        inner.state = ProtocolState::Aborted;
        true
    }

    /// Release the connection after a completed close handshake.
    pub(crate) fn dispose(&self) {
        let mut inner = self.lock();
        inner.disposed = true;
        if inner.state != ProtocolState::Aborted {
            inner.state = ProtocolState::Closed;
        }
    }
}
