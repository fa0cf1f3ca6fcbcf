//! Best-effort keep-alive ping task.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::framer::framer::Shared;
use crate::framer::state::ProtocolState;
use crate::protocol::opcode::OpCode;

/// Spawn the keep-alive task: an empty ping every `interval`, skipped
/// whenever the writer is busy. Pings are never queued behind other traffic;
/// a skipped tick simply waits for the next one.
///
/// The task exits when the connection shuts down, when pings stop being
/// meaningful (close sent), or when a write fails.
pub(crate) fn spawn<S>(shared: Arc<Shared<S>>, interval: Duration) -> tokio::task::JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shared.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if !matches!(
                        shared.state.state(),
                        ProtocolState::Open | ProtocolState::CloseReceived
                    ) {
                        break;
                    }
                    let Ok(mut send) = shared.send.try_lock() else {
                        continue;
                    };
                    if shared
                        .write_frame(&mut send, OpCode::Ping, true, &[])
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
        }
    })
}
