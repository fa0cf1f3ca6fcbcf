//! The framing engine: send and receive paths, close handshake, abort.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::FramerConfig;
use crate::error::{Error, Result};
use crate::framer::keepalive;
use crate::framer::role::Role;
use crate::framer::state::{ProtocolState, StateCell};
use crate::message::{CloseCode, MessageType, ReceiveResult};
use crate::protocol::header::{self, FrameHeader, MAX_CONTROL_PAYLOAD, MAX_HEADER_SIZE};
use crate::protocol::mask::apply_mask;
use crate::protocol::opcode::OpCode;
use crate::protocol::utf8::Utf8Validator;

const VALID_SEND_STATES: &[ProtocolState] = &[ProtocolState::Open, ProtocolState::CloseReceived];
const VALID_RECEIVE_STATES: &[ProtocolState] = &[ProtocolState::Open, ProtocolState::CloseSent];
const VALID_CLOSE_OUTPUT_STATES: &[ProtocolState] =
    &[ProtocolState::Open, ProtocolState::CloseReceived];
const VALID_CLOSE_STATES: &[ProtocolState] = &[
    ProtocolState::Open,
    ProtocolState::CloseSent,
    ProtocolState::CloseReceived,
];

/// Longest close reason: control payload minus the 2-byte status code.
const MAX_CLOSE_REASON: usize = MAX_CONTROL_PAYLOAD - 2;

/// An RFC 6455 framing engine over an already-connected duplex byte stream.
///
/// The engine owns framing only: the opening handshake has already happened
/// on `S` and no extensions are in play. All operations take `&self`; one
/// `send` and one `receive` may run concurrently, and close frames, pong
/// echoes, and keep-alive pings are serialized with sends through an internal
/// writer lock. A second concurrent `send` (or `receive`) is a programming
/// error that aborts the connection.
///
/// # Example
///
/// ```no_run
/// use tokio_util::sync::CancellationToken;
/// use wsframe::{FramerConfig, MessageType, Role, WebSocketFramer};
///
/// # async fn example(stream: tokio::net::TcpStream) -> wsframe::Result<()> {
/// let ws = WebSocketFramer::from_connected_stream(stream, Role::Client, FramerConfig::new());
/// let cancel = CancellationToken::new();
/// ws.send(b"hello", MessageType::Text, true, &cancel).await?;
/// let mut buf = [0u8; 4096];
/// let result = ws.receive(&mut buf, &cancel).await?;
/// # Ok(())
/// # }
/// ```
pub struct WebSocketFramer<S> {
    shared: Arc<Shared<S>>,
    keepalive: Option<tokio::task::JoinHandle<()>>,
}

pub(crate) struct Shared<S> {
    pub(crate) role: Role,
    subprotocol: Option<String>,
    pub(crate) state: StateCell,
    pub(crate) send: Mutex<SendHalf<S>>,
    recv: Mutex<RecvHalf<S>>,
    pub(crate) shutdown: CancellationToken,
    send_in_flight: AtomicBool,
    recv_in_flight: AtomicBool,
}

pub(crate) struct SendHalf<S> {
    stream: WriteHalf<S>,
    scratch: BytesMut,
    fragment_in_progress: bool,
}

struct RecvHalf<S> {
    stream: ReadHalf<S>,
    buffer: BytesMut,
    buffer_size: usize,
    /// Last data-frame header, with `payload_remaining` counting down as
    /// payload is delivered. Carries the message opcode and fin bit between
    /// `receive` calls for continuation sequencing.
    header: FrameHeader,
    mask_offset: usize,
    utf8: Utf8Validator,
}

/// Outcome of one pass of the receive loop, before EOF policy is applied.
/// A clean EOF means different things to `receive` (quiet end of stream) and
/// to `close` (the peer vanished without a close frame).
enum InnerReceive {
    Frame(ReceiveResult),
    Eof,
}

/// Clears the in-flight flag when an operation completes or is cancelled.
struct OpGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn message_kind(opcode: OpCode) -> MessageType {
    match opcode {
        OpCode::Binary => MessageType::Binary,
        _ => MessageType::Text,
    }
}

fn validate_close(status: CloseCode, reason: &str) -> Result<()> {
    if !status.is_valid_to_send() {
        return Err(Error::InvalidCloseCode(status.as_u16()));
    }
    if reason.len() > MAX_CLOSE_REASON {
        return Err(Error::InvalidClosePayload);
    }
    Ok(())
}

fn fresh_mask() -> Result<[u8; 4]> {
    let mut key = [0u8; 4];
    getrandom::getrandom(&mut key).map_err(|e| Error::Io(e.to_string()))?;
    Ok(key)
}

impl<S> WebSocketFramer<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap an already-connected stream on which the WebSocket handshake has
    /// completed.
    ///
    /// Must be called within a Tokio runtime if a keep-alive interval is
    /// configured, since the keep-alive ping task is spawned here.
    #[must_use]
    pub fn from_connected_stream(stream: S, role: Role, config: FramerConfig) -> Self {
        let (read, write) = tokio::io::split(stream);
        let buffer_size = config.effective_buffer_size();
        let shared = Arc::new(Shared {
            role,
            subprotocol: config.subprotocol,
            state: StateCell::new(),
            send: Mutex::new(SendHalf {
                stream: write,
                scratch: BytesMut::new(),
                fragment_in_progress: false,
            }),
            recv: Mutex::new(RecvHalf {
                stream: read,
                buffer: BytesMut::with_capacity(buffer_size),
                buffer_size,
                header: FrameHeader::consumed(),
                mask_offset: 0,
                utf8: Utf8Validator::new(),
            }),
            shutdown: CancellationToken::new(),
            send_in_flight: AtomicBool::new(false),
            recv_in_flight: AtomicBool::new(false),
        });
        let keepalive = config
            .keep_alive_interval
            .map(|interval| keepalive::spawn(Arc::clone(&shared), interval));
        Self { shared, keepalive }
    }

    /// Send one data frame.
    ///
    /// `end_of_message: false` starts (or continues) a fragmented message;
    /// every subsequent `send` goes out as a continuation frame until one
    /// with `end_of_message: true` finishes the message, regardless of the
    /// `kind` passed for the later fragments.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the state is `Open` or `CloseReceived`.
    /// `ConcurrentOperation` if another `send` is in flight (this aborts the
    /// connection). Cancellation aborts the connection and returns
    /// `OperationAborted`.
    pub async fn send(
        &self,
        payload: &[u8],
        kind: MessageType,
        end_of_message: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.shared.state.check(VALID_SEND_STATES)?;
        let _guard = self.enter(&self.shared.send_in_flight, "send")?;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::OperationAborted),
            _ = self.shared.shutdown.cancelled() => Err(Error::OperationAborted),
            r = self.send_data_frame(payload, kind, end_of_message) => r,
        };
        self.finish(result)
    }

    /// Receive the next piece of the incoming stream into `buf`.
    ///
    /// Returns at most one frame's worth of payload; a frame larger than
    /// `buf` is delivered over multiple calls with the mask and UTF-8 state
    /// carried between them. Ping and pong frames are handled internally and
    /// never surfaced (pings are echoed as pongs). A close frame ends the
    /// inbound stream and is returned as [`ReceiveResult::Close`].
    ///
    /// A clean EOF at a frame boundary yields
    /// `Data { count: 0, kind: Text, end_of_message: true }`; EOF inside a
    /// frame is [`Error::ConnectionClosedPrematurely`].
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the state is `Open` or `CloseSent`. Protocol
    /// violations send a close frame to the peer, discard the receive
    /// buffer, and surface the specific protocol error.
    pub async fn receive(
        &self,
        buf: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<ReceiveResult> {
        self.shared.state.check(VALID_RECEIVE_STATES)?;
        let _guard = self.enter(&self.shared.recv_in_flight, "receive")?;
        let shared = &self.shared;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::OperationAborted),
            _ = shared.shutdown.cancelled() => Err(Error::OperationAborted),
            r = async {
                let mut half = shared.recv.lock().await;
                shared.receive_inner(&mut half, buf).await
            } => r,
        };
        match self.finish(result)? {
            InnerReceive::Frame(frame) => Ok(frame),
            InnerReceive::Eof => Ok(ReceiveResult::Data {
                count: 0,
                kind: MessageType::Text,
                end_of_message: true,
            }),
        }
    }

    /// Send a close frame without waiting for the peer's close.
    ///
    /// From `CloseReceived` this completes the handshake and the state
    /// becomes `Closed`; from `Open` the state becomes `CloseSent` and
    /// `receive` keeps working until the peer's close frame arrives.
    ///
    /// # Errors
    ///
    /// `InvalidCloseCode` / `InvalidClosePayload` if `status` is not sendable
    /// or `reason` exceeds 123 UTF-8 bytes. `InvalidState` unless the state
    /// is `Open` or `CloseReceived`.
    pub async fn close_output(
        &self,
        status: CloseCode,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        validate_close(status, reason)?;
        self.shared.state.check(VALID_CLOSE_OUTPUT_STATES)?;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::OperationAborted),
            _ = self.shared.shutdown.cancelled() => Err(Error::OperationAborted),
            r = self.shared.send_close_frame(status, reason) => r,
        };
        self.finish(result)
    }

    /// Perform the full close handshake: send our close frame (unless one
    /// already went out) and drain incoming frames until the peer's close
    /// arrives, then release the connection.
    ///
    /// Coordinates with an in-flight `receive` through the receive-half
    /// lock; if that receive consumes the peer's close frame first, this
    /// completes without reading further.
    ///
    /// # Errors
    ///
    /// Same validation as [`close_output`](Self::close_output), plus
    /// `ConnectionClosedPrematurely` if the peer disconnects without a close
    /// frame. Valid from `Open`, `CloseSent`, or `CloseReceived`.
    pub async fn close(
        &self,
        status: CloseCode,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        validate_close(status, reason)?;
        self.shared.state.check(VALID_CLOSE_STATES)?;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::OperationAborted),
            _ = self.shared.shutdown.cancelled() => Err(Error::OperationAborted),
            r = self.close_inner(status, reason) => r,
        };
        let result = self.finish(result);
        if result.is_ok() {
            self.shared.state.dispose();
            self.shared.shutdown.cancel();
        }
        result
    }

    /// Tear the connection down immediately, without a close handshake.
    ///
    /// Pending and future operations complete with
    /// [`Error::OperationAborted`].
    pub fn abort(&self) {
        self.shared.abort_connection();
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ProtocolState {
        self.shared.state.state()
    }

    /// The peer's close status, once a close frame has been received.
    #[must_use]
    pub fn close_status(&self) -> Option<CloseCode> {
        self.shared.state.close_status()
    }

    /// The peer's close reason, once a close frame has been received.
    #[must_use]
    pub fn close_description(&self) -> Option<String> {
        self.shared.state.close_description()
    }

    /// The negotiated subprotocol, if one was configured.
    #[must_use]
    pub fn subprotocol(&self) -> Option<&str> {
        self.shared.subprotocol.as_deref()
    }

    /// This endpoint's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.shared.role
    }

    fn enter<'a>(&self, flag: &'a AtomicBool, op: &'static str) -> Result<OpGuard<'a>> {
        if flag
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // Two user calls on the same path at once is a caller bug that
            // leaves the wire position undefined.
            self.shared.abort_connection();
            return Err(Error::ConcurrentOperation(op));
        }
        Ok(OpGuard { flag })
    }

    /// Map errors at the operation boundary: cancellation and dead-stream
    /// failures abort the connection, and raw I/O errors surface as
    /// `ConnectionClosedPrematurely` (or `OperationAborted` when the
    /// connection was already aborted).
    fn finish<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Ok(v) => Ok(v),
            Err(Error::OperationAborted) => {
                self.shared.abort_connection();
                Err(Error::OperationAborted)
            }
            Err(Error::Io(_)) | Err(Error::ConnectionClosedPrematurely) => {
                let was_aborted = self.shared.state.state() == ProtocolState::Aborted;
                self.shared.abort_connection();
                Err(if was_aborted {
                    Error::OperationAborted
                } else {
                    Error::ConnectionClosedPrematurely
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn send_data_frame(
        &self,
        payload: &[u8],
        kind: MessageType,
        end_of_message: bool,
    ) -> Result<()> {
        let mut half = self.shared.send.lock().await;
        let opcode = if half.fragment_in_progress {
            OpCode::Continuation
        } else {
            match kind {
                MessageType::Text => OpCode::Text,
                MessageType::Binary => OpCode::Binary,
            }
        };
        self.shared
            .write_frame(&mut half, opcode, end_of_message, payload)
            .await?;
        half.fragment_in_progress = !end_of_message;
        Ok(())
    }

    async fn close_inner(&self, status: CloseCode, reason: &str) -> Result<()> {
        let shared = &self.shared;
        if !shared.state.sent_close() {
            shared.send_close_frame(status, reason).await?;
        }
        let mut scratch = vec![0u8; 4096];
        while !shared.state.received_close() {
            let mut half = shared.recv.lock().await;
            // A concurrent receive may have consumed the close frame while
            // we waited for the lock.
            if shared.state.received_close() {
                break;
            }
            match shared.receive_inner(&mut half, &mut scratch).await? {
                InnerReceive::Frame(ReceiveResult::Close { .. }) => break,
                InnerReceive::Frame(ReceiveResult::Data { .. }) => {}
                InnerReceive::Eof => return Err(Error::ConnectionClosedPrematurely),
            }
        }
        Ok(())
    }
}

impl<S> Shared<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub(crate) fn abort_connection(&self) {
        if self.state.abort() {
            #[cfg(feature = "logging")]
            log::debug!("connection aborted");
        }
        self.shutdown.cancel();
    }

    /// Write one complete frame, masking the payload when the role requires
    /// it. The caller holds the writer lock.
    pub(crate) async fn write_frame(
        &self,
        half: &mut SendHalf<S>,
        opcode: OpCode,
        fin: bool,
        payload: &[u8],
    ) -> Result<()> {
        let mask = if self.role.must_mask() {
            Some(fresh_mask()?)
        } else {
            None
        };
        let mut head = [0u8; MAX_HEADER_SIZE];
        let head_len = header::write(opcode, fin, payload.len(), mask, &mut head);

        half.scratch.clear();
        half.scratch.reserve(head_len + payload.len());
        half.scratch.extend_from_slice(&head[..head_len]);
        half.scratch.extend_from_slice(payload);
        if let Some(key) = mask {
            apply_mask(&mut half.scratch[head_len..], key, 0);
        }

        half.stream.write_all(&half.scratch).await?;
        half.stream.flush().await?;
        #[cfg(feature = "logging")]
        log::trace!("sent {opcode} frame, fin={fin}, {} payload bytes", payload.len());
        Ok(())
    }

    /// Send a close frame and record the transition on success.
    pub(crate) async fn send_close_frame(&self, status: CloseCode, reason: &str) -> Result<()> {
        let mut payload = [0u8; MAX_CONTROL_PAYLOAD];
        payload[..2].copy_from_slice(&status.as_u16().to_be_bytes());
        payload[2..2 + reason.len()].copy_from_slice(reason.as_bytes());

        let mut half = self.send.lock().await;
        self.write_frame(&mut half, OpCode::Close, true, &payload[..2 + reason.len()])
            .await?;
        drop(half);
        self.state.on_close_sent();
        Ok(())
    }

    /// Protocol failure on the receive path: notify the peer with a close
    /// frame carrying the matching status (unless our close already went
    /// out), discard all buffered input, and hand the error back.
    async fn fault(&self, half: &mut RecvHalf<S>, error: Error) -> Error {
        half.buffer.clear();
        half.header = FrameHeader::consumed();
        half.mask_offset = 0;
        half.utf8.reset();
        if let Some(status) = error.close_status() {
            if !self.state.sent_close() {
                let _ = self.send_close_frame(status, "").await;
            }
        }
        #[cfg(feature = "logging")]
        log::debug!("receive failed: {error}");
        error
    }

    /// Read until at least `needed` bytes are buffered. Returns `false` on
    /// EOF before that.
    async fn ensure_buffered(&self, half: &mut RecvHalf<S>, needed: usize) -> Result<bool> {
        while half.buffer.len() < needed {
            if half.buffer.capacity() == half.buffer.len() {
                half.buffer.reserve(half.buffer_size);
            }
            let read = half.stream.read_buf(&mut half.buffer).await?;
            if read == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn receive_inner(&self, half: &mut RecvHalf<S>, buf: &mut [u8]) -> Result<InnerReceive> {
        loop {
            if half.header.payload_remaining == 0 {
                // Previous frame fully consumed; read the next header.
                if !self.ensure_buffered(half, 2).await? {
                    if half.buffer.is_empty() {
                        return Ok(InnerReceive::Eof);
                    }
                    return Err(self.fault(half, Error::ConnectionClosedPrematurely).await);
                }
                let header_len = header::header_size(half.buffer[1]);
                if !self.ensure_buffered(half, header_len).await? {
                    return Err(self.fault(half, Error::ConnectionClosedPrematurely).await);
                }
                let parsed = match header::parse(&half.buffer[..header_len]) {
                    Ok((h, consumed)) => {
                        half.buffer.advance(consumed);
                        h
                    }
                    Err(e) => return Err(self.fault(half, e).await),
                };

                // Masking direction is a role rule, not a header rule.
                if parsed.mask.is_some() != self.role.expects_masked() {
                    let e = if parsed.mask.is_some() {
                        Error::MaskedFrame
                    } else {
                        Error::UnmaskedFrame
                    };
                    return Err(self.fault(half, e).await);
                }

                if parsed.opcode.is_control() {
                    match self.handle_control(half, parsed).await? {
                        Some(result) => return Ok(InnerReceive::Frame(result)),
                        None => continue,
                    }
                }

                // Fragment sequencing against the previous data header.
                let effective = match parsed.opcode {
                    OpCode::Continuation => {
                        if half.header.fin {
                            return Err(self.fault(half, Error::UnexpectedContinuation).await);
                        }
                        FrameHeader {
                            opcode: half.header.opcode,
                            ..parsed
                        }
                    }
                    _ => {
                        if !half.header.fin {
                            return Err(self.fault(half, Error::ExpectedContinuation).await);
                        }
                        parsed
                    }
                };
                half.header = effective;
                half.mask_offset = 0;

                if half.header.payload_remaining == 0 {
                    let kind = message_kind(half.header.opcode);
                    let end = half.header.fin;
                    if kind == MessageType::Text && !half.utf8.validate(&[], end) {
                        return Err(self.fault(half, Error::InvalidUtf8).await);
                    }
                    if end {
                        half.utf8.reset();
                    }
                    return Ok(InnerReceive::Frame(ReceiveResult::Data {
                        count: 0,
                        kind,
                        end_of_message: end,
                    }));
                }
            }

            // Deliver payload from the frame in progress.
            let kind = message_kind(half.header.opcode);
            if buf.is_empty() {
                return Ok(InnerReceive::Frame(ReceiveResult::Data {
                    count: 0,
                    kind,
                    end_of_message: false,
                }));
            }
            if half.buffer.is_empty() && !self.ensure_buffered(half, 1).await? {
                return Err(self.fault(half, Error::ConnectionClosedPrematurely).await);
            }

            let n = half
                .header
                .payload_remaining
                .min(buf.len() as u64)
                .min(half.buffer.len() as u64) as usize;
            buf[..n].copy_from_slice(&half.buffer[..n]);
            half.buffer.advance(n);
            if let Some(key) = half.header.mask {
                half.mask_offset = apply_mask(&mut buf[..n], key, half.mask_offset);
            }
            half.header.payload_remaining -= n as u64;

            let end = half.header.fin && half.header.payload_remaining == 0;
            if kind == MessageType::Text && !half.utf8.validate(&buf[..n], end) {
                return Err(self.fault(half, Error::InvalidUtf8).await);
            }
            if end {
                half.utf8.reset();
            }
            return Ok(InnerReceive::Frame(ReceiveResult::Data {
                count: n,
                kind,
                end_of_message: end,
            }));
        }
    }

    /// Consume one control frame. Pings are echoed, pongs are dropped, close
    /// frames are parsed and surfaced.
    async fn handle_control(
        &self,
        half: &mut RecvHalf<S>,
        header: FrameHeader,
    ) -> Result<Option<ReceiveResult>> {
        // Control payload fits in the minimum buffer (validated at parse).
        let len = header.payload_remaining as usize;
        if !self.ensure_buffered(half, len).await? {
            return Err(self.fault(half, Error::ConnectionClosedPrematurely).await);
        }
        let mut payload = [0u8; MAX_CONTROL_PAYLOAD];
        payload[..len].copy_from_slice(&half.buffer[..len]);
        half.buffer.advance(len);
        if let Some(key) = header.mask {
            apply_mask(&mut payload[..len], key, 0);
        }
        let payload = &payload[..len];

        match header.opcode {
            OpCode::Ping => {
                // Echo with the ping's own payload.
                let mut send = self.send.lock().await;
                self.write_frame(&mut send, OpCode::Pong, true, payload)
                    .await?;
                Ok(None)
            }
            OpCode::Close => {
                let (status, reason) = match payload.len() {
                    0 => (CloseCode::NoStatusReceived, String::new()),
                    // A lone status-code byte can never be a valid code.
                    1 => return Err(self.fault(half, Error::InvalidClosePayload).await),
                    _ => {
                        let code = u16::from_be_bytes([payload[0], payload[1]]);
                        let status = CloseCode::from_u16(code);
                        if !status.is_valid_received() {
                            return Err(self.fault(half, Error::InvalidCloseCode(code)).await);
                        }
                        let reason = match std::str::from_utf8(&payload[2..]) {
                            Ok(s) => s.to_owned(),
                            Err(_) => {
                                return Err(self.fault(half, Error::InvalidClosePayload).await);
                            }
                        };
                        (status, reason)
                    }
                };
                #[cfg(feature = "logging")]
                log::debug!("received close frame: {status} {reason:?}");
                self.state.on_close_received(status, reason.clone());
                Ok(Some(ReceiveResult::Close { status, reason }))
            }
            // Pong, solicited or not: drain and move on.
            _ => Ok(None),
        }
    }
}

impl<S> Drop for WebSocketFramer<S> {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
        if let Some(task) = self.keepalive.take() {
            task.abort();
        }
    }
}
