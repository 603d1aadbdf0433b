//! TCP connection to brickd and its receive loop.
//!
//! # Event Loop
//!
//! [`IpConnection::connect`] spawns a tokio task that handles:
//!
//! - Outgoing frames from the Rust API, written in submission order
//! - Incoming responses, matched to waiting callers by sequence number
//! - Incoming events, forwarded to a blocking callback worker that runs the
//!   [`DispatchRegistry`]
//!
//! Each connect starts a new session with its own pending-request table.
//! [`IpConnection::disconnect`] fails that table right away and stops the
//! loop through a shutdown signal that does not queue behind outgoing frames,
//! so a peer that stops reading cannot hold it up.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, ErrorCode, Result};
use crate::protocol::{EVENT_SEQUENCE, Frame, FrameCodec, MAX_SEQUENCE};

use super::builder::IpConnectionBuilder;
use super::dispatch::{DispatchRegistry, ErrorSink, TracingErrorSink};
use super::options::ConnectionOptions;

// ============================================================================
// Types
// ============================================================================

/// Channel a waiting caller receives its response on.
type ResponseSender = oneshot::Sender<Result<Frame>>;

/// Pending table of one session.
type SharedPending = Arc<Mutex<PendingTable>>;

/// Public view of the connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Socket open and receive loop running.
    Connected,
}

/// A running connection.
struct Session {
    id: u64,
    command_tx: mpsc::UnboundedSender<Frame>,
    shutdown_tx: oneshot::Sender<()>,
    pending: SharedPending,
    task: JoinHandle<()>,
}

/// Lifecycle slot guarded by the connection mutex.
enum Slot {
    Disconnected,
    /// Holds the id the attempt will use as its session id.
    Connecting(u64),
    Connected(Session),
}

impl Slot {
    fn state(&self) -> ConnectionState {
        match self {
            Self::Disconnected => ConnectionState::Disconnected,
            Self::Connecting(_) => ConnectionState::Connecting,
            Self::Connected(_) => ConnectionState::Connected,
        }
    }
}

// ============================================================================
// PendingTable
// ============================================================================

/// One caller waiting for a response.
struct PendingEntry {
    /// Distinguishes reuse of the same sequence number.
    token: u64,
    tx: ResponseSender,
}

/// Requests awaiting a response, keyed by sequence number.
///
/// Allocation and insertion happen under a single lock so two callers can
/// never be handed the same sequence number. Once closed, nothing can be
/// allocated.
#[derive(Default)]
struct PendingTable {
    entries: FxHashMap<u8, PendingEntry>,
    next_sequence: u8,
    next_token: u64,
    closed: bool,
}

impl PendingTable {
    /// Reserves a free sequence number in `1..=15` for `tx`.
    fn allocate(&mut self, tx: ResponseSender) -> Option<(u8, u64)> {
        for _ in 0..MAX_SEQUENCE {
            self.next_sequence = if self.next_sequence >= MAX_SEQUENCE {
                1
            } else {
                self.next_sequence + 1
            };
            let sequence = self.next_sequence;

            if !self.entries.contains_key(&sequence) {
                self.next_token += 1;
                let token = self.next_token;
                self.entries.insert(sequence, PendingEntry { token, tx });
                return Some((sequence, token));
            }
        }
        None
    }

    /// Removes and returns the waiter for a response.
    fn take(&mut self, sequence: u8) -> Option<ResponseSender> {
        self.entries.remove(&sequence).map(|entry| entry.tx)
    }

    /// Removes an entry only if it still belongs to the given request.
    fn cancel(&mut self, sequence: u8, token: u64) -> bool {
        match self.entries.get(&sequence) {
            Some(entry) if entry.token == token => {
                self.entries.remove(&sequence);
                true
            }
            _ => false,
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the table and returns every waiter.
    fn close(&mut self) -> Vec<ResponseSender> {
        self.closed = true;
        self.entries.drain().map(|(_, entry)| entry.tx).collect()
    }
}

// ============================================================================
// ConnectGuard
// ============================================================================

/// Resets a `Connecting` slot if the connect future is dropped or fails.
struct ConnectGuard<'a> {
    slot: &'a Mutex<Slot>,
    attempt: u64,
    armed: bool,
}

impl<'a> ConnectGuard<'a> {
    fn new(slot: &'a Mutex<Slot>, attempt: u64) -> Self {
        Self {
            slot,
            attempt,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Connecting(attempt) if attempt == self.attempt) {
            *slot = Slot::Disconnected;
            debug!(attempt = self.attempt, "Connect attempt abandoned");
        }
    }
}

// ============================================================================
// ConnectionInner
// ============================================================================

/// State shared by all handles to one connection.
pub(crate) struct ConnectionInner {
    slot: Mutex<Slot>,
    registry: Arc<DispatchRegistry>,
    options: Mutex<ConnectionOptions>,
    next_session: AtomicU64,
}

impl ConnectionInner {
    /// Clears the slot if it still holds the given session.
    fn clear_session(&self, session_id: u64) {
        let mut slot = self.slot.lock();
        if matches!(&*slot, Slot::Connected(session) if session.id == session_id) {
            *slot = Slot::Disconnected;
            info!(session_id, "Connection lost");
        }
    }
}

// ============================================================================
// IpConnection
// ============================================================================

/// Connection to a brickd daemon.
///
/// Create it, hand it to device proxies, then [`connect`](Self::connect).
/// Proxies only keep a weak reference: dropping the last `IpConnection`
/// handle closes the socket.
///
/// # Thread Safety
///
/// `IpConnection` is `Send + Sync` and cheap to clone; clones share the same
/// socket and listener registry.
#[derive(Clone)]
pub struct IpConnection {
    inner: Arc<ConnectionInner>,
}

impl fmt::Debug for IpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpConnection")
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .field("listeners", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}

impl Default for IpConnection {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// IpConnection - Constructors
// ============================================================================

impl IpConnection {
    /// Creates a disconnected connection with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(ConnectionOptions::default(), Arc::new(TracingErrorSink))
    }

    /// Creates a builder for custom options and error sink.
    #[inline]
    #[must_use]
    pub fn builder() -> IpConnectionBuilder {
        IpConnectionBuilder::new()
    }

    pub(crate) fn with_parts(options: ConnectionOptions, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                slot: Mutex::new(Slot::Disconnected),
                registry: Arc::new(DispatchRegistry::new(sink)),
                options: Mutex::new(options),
                next_session: AtomicU64::new(1),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<ConnectionInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<ConnectionInner>) -> Self {
        Self { inner }
    }
}

// ============================================================================
// IpConnection - Accessors
// ============================================================================

impl IpConnection {
    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.slot.lock().state()
    }

    /// Returns `true` if connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns the number of requests awaiting a response on the current
    /// session. Zero when not connected.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        match &*self.inner.slot.lock() {
            Slot::Connected(session) => session.pending.lock().len(),
            _ => 0,
        }
    }

    /// Returns the request timeout.
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.inner.options.lock().request_timeout
    }

    /// Changes the request timeout for subsequent requests.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero duration.
    pub fn set_timeout(&self, request_timeout: Duration) -> Result<()> {
        let mut options = self.inner.options.lock();
        let updated = options.with_request_timeout(request_timeout);
        updated.validate()?;
        *options = updated;
        Ok(())
    }

    /// Returns the listener registry shared by all proxies.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &DispatchRegistry {
        &self.inner.registry
    }
}

// ============================================================================
// IpConnection - Lifecycle
// ============================================================================

impl IpConnection {
    /// Connects to a daemon at `host:port`.
    ///
    /// Starts the receive loop and the callback worker. Dropping the returned
    /// future before it completes leaves the connection disconnected.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if already connected, the address is
    ///   unreachable, or [`disconnect`](Self::disconnect) cancelled the attempt
    /// - [`Error::ConnectionTimeout`] if the connect timeout elapses
    pub async fn connect(&self, address: impl AsRef<str>) -> Result<()> {
        let address = address.as_ref();
        let session_id = self.inner.next_session.fetch_add(1, Ordering::Relaxed);

        {
            let mut slot = self.inner.slot.lock();
            match &*slot {
                Slot::Disconnected => *slot = Slot::Connecting(session_id),
                Slot::Connecting(_) => {
                    return Err(Error::connection("connect already in progress"));
                }
                Slot::Connected(_) => return Err(Error::connection("already connected")),
            }
        }
        let mut guard = ConnectGuard::new(&self.inner.slot, session_id);

        let connect_timeout = self.inner.options.lock().connect_timeout;
        let stream = match timeout(connect_timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!(address, error = %e, "Connect failed");
                return Err(Error::connection(format!("{address}: {e}")));
            }
            Err(_) => {
                warn!(address, "Connect timed out");
                return Err(Error::connection_timeout(millis(connect_timeout)));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }

        // Hold the slot while spawning so a loop that dies immediately cannot
        // clear the slot before the session is stored.
        let mut slot = self.inner.slot.lock();
        if !matches!(*slot, Slot::Connecting(attempt) if attempt == session_id) {
            drop(slot);
            debug!(address, session_id, "Connect cancelled by disconnect");
            return Err(Error::connection("connect cancelled by disconnect"));
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let pending = SharedPending::default();

        Self::spawn_dispatch_worker(Arc::clone(&self.inner.registry), event_rx);

        let task = tokio::spawn(Self::run_receive_loop(
            Framed::new(stream, FrameCodec),
            command_rx,
            shutdown_rx,
            Arc::clone(&pending),
            event_tx,
            self.downgrade(),
            session_id,
        ));
        *slot = Slot::Connected(Session {
            id: session_id,
            command_tx,
            shutdown_tx,
            pending,
            task,
        });
        guard.disarm();
        drop(slot);

        info!(address, session_id, "Connected");
        Ok(())
    }

    /// Disconnects from the daemon.
    ///
    /// Idempotent: does nothing when not connected, and cancels an attempt
    /// still in [`Connecting`](ConnectionState::Connecting). Pending requests
    /// fail with [`Error::ConnectionClosed`] before this returns. Frames still
    /// queued for writing are discarded.
    pub async fn disconnect(&self) {
        let session = {
            let mut slot = self.inner.slot.lock();
            match std::mem::replace(&mut *slot, Slot::Disconnected) {
                Slot::Connected(session) => session,
                Slot::Connecting(attempt) => {
                    debug!(attempt, "Connect attempt cancelled");
                    return;
                }
                Slot::Disconnected => return,
            }
        };

        let Session {
            id,
            shutdown_tx,
            pending,
            task,
            ..
        } = session;

        let _ = shutdown_tx.send(());
        Self::fail_pending_requests(&pending);

        if let Err(e) = task.await {
            error!(error = %e, "Receive loop ended abnormally");
        }

        info!(session_id = id, "Disconnected");
    }
}

// ============================================================================
// IpConnection - Requests
// ============================================================================

impl IpConnection {
    /// Sends `frame` as a request and waits for the matching response.
    ///
    /// A sequence number is allocated and the response-expected flag set.
    /// Responses carrying an error code are returned as [`Error::Device`].
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if not connected or the connection drops
    /// - [`Error::RequestTimeout`] if no response arrives in time
    /// - [`Error::Protocol`] if all fifteen sequence numbers are in use
    /// - [`Error::InvalidArgument`] for a broadcast (uid 0) frame
    pub async fn send_request(&self, mut frame: Frame) -> Result<Frame> {
        let uid = frame
            .uid()
            .ok_or_else(|| Error::invalid_argument("Requests must address a device"))?;
        let function_id = frame.function_id();
        let (command_tx, pending) = self.session_channels()?;

        let (response_tx, response_rx) = oneshot::channel();
        let (sequence, token) = {
            let mut table = pending.lock();
            if table.is_closed() {
                return Err(Error::ConnectionClosed);
            }
            table.allocate(response_tx).ok_or_else(|| {
                warn!(pending = table.len(), "Too many pending requests");
                Error::protocol(format!(
                    "Too many pending requests: {}/{MAX_SEQUENCE}",
                    table.len()
                ))
            })?
        };

        frame.header.sequence = sequence;
        frame.header.response_expected = true;

        if command_tx.send(frame).is_err() {
            pending.lock().cancel(sequence, token);
            return Err(Error::ConnectionClosed);
        }

        trace!(%uid, function_id, sequence, "Request queued");

        let request_timeout = self.timeout();
        let response = match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(Error::ConnectionClosed),
            Err(_) => {
                pending.lock().cancel(sequence, token);
                debug!(%uid, function_id, sequence, "Request timed out");
                return Err(Error::request_timeout(
                    uid,
                    function_id,
                    sequence,
                    millis(request_timeout),
                ));
            }
        };

        match response.header.error_code {
            ErrorCode::Ok => Ok(response),
            code => Err(Error::device(uid, function_id, code)),
        }
    }

    /// Writes `frame` without waiting for a response.
    ///
    /// The frame is sent with sequence number 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if not connected.
    pub fn send_fire_and_forget(&self, mut frame: Frame) -> Result<()> {
        let (command_tx, _) = self.session_channels()?;

        frame.header.sequence = EVENT_SEQUENCE;
        frame.header.response_expected = false;

        trace!(
            uid = frame.header.uid,
            function_id = frame.function_id(),
            "Fire-and-forget queued"
        );

        command_tx.send(frame).map_err(|_| Error::ConnectionClosed)
    }

    /// Returns the current session's command channel and pending table.
    fn session_channels(&self) -> Result<(mpsc::UnboundedSender<Frame>, SharedPending)> {
        match &*self.inner.slot.lock() {
            Slot::Connected(session) => Ok((
                session.command_tx.clone(),
                Arc::clone(&session.pending),
            )),
            _ => Err(Error::ConnectionClosed),
        }
    }
}

// ============================================================================
// IpConnection - Event Loop
// ============================================================================

impl IpConnection {
    /// Receive loop that owns the socket.
    ///
    /// The shutdown signal is polled first, so it wins even while a write is
    /// stuck on a peer that does not read. Dropping the sender (the session
    /// going away with the last handle) counts as shutdown.
    async fn run_receive_loop(
        framed: Framed<TcpStream, FrameCodec>,
        command_rx: mpsc::UnboundedReceiver<Frame>,
        shutdown_rx: oneshot::Receiver<()>,
        pending: SharedPending,
        event_tx: mpsc::UnboundedSender<Frame>,
        inner: Weak<ConnectionInner>,
        session_id: u64,
    ) {
        tokio::select! {
            biased;

            _ = shutdown_rx => debug!(session_id, "Shutdown requested"),
            () = Self::pump_frames(framed, command_rx, &pending, &event_tx) => {}
        }

        // The socket and the command receiver are gone at this point.
        Self::fail_pending_requests(&pending);

        if let Some(inner) = inner.upgrade() {
            inner.clear_session(session_id);
        }

        debug!(session_id, "Receive loop terminated");
    }

    /// Moves frames between the socket and the API until either side ends.
    async fn pump_frames(
        framed: Framed<TcpStream, FrameCodec>,
        mut command_rx: mpsc::UnboundedReceiver<Frame>,
        pending: &Mutex<PendingTable>,
        event_tx: &mpsc::UnboundedSender<Frame>,
    ) {
        let (mut sink, mut stream) = framed.split();

        loop {
            tokio::select! {
                // Incoming frames from the daemon
                incoming = stream.next() => {
                    match incoming {
                        Some(Ok(frame)) => {
                            Self::handle_incoming_frame(frame, pending, event_tx);
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "Socket read failed");
                            break;
                        }

                        None => {
                            debug!("Connection closed by daemon");
                            break;
                        }
                    }
                }

                // Frames from the Rust API
                command = command_rx.recv() => {
                    match command {
                        Some(frame) => {
                            if let Err(e) = sink.send(frame).await {
                                error!(error = %e, "Socket write failed");
                                break;
                            }
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Refuse new frames before the pending table is failed.
        command_rx.close();
    }

    /// Routes one inbound frame.
    fn handle_incoming_frame(
        frame: Frame,
        pending: &Mutex<PendingTable>,
        event_tx: &mpsc::UnboundedSender<Frame>,
    ) {
        if frame.header.is_event() {
            trace!(
                uid = frame.header.uid,
                function_id = frame.function_id(),
                "Event received"
            );
            if event_tx.send(frame).is_err() {
                warn!("Callback worker stopped, event dropped");
            }
            return;
        }

        let sequence = frame.sequence();
        let waiter = pending.lock().take(sequence);

        match waiter {
            Some(tx) => {
                let _ = tx.send(Ok(frame));
            }
            None => {
                warn!(
                    sequence,
                    function_id = frame.function_id(),
                    "Response for unknown request"
                );
            }
        }
    }

    /// Runs listeners off the receive loop.
    fn spawn_dispatch_worker(
        registry: Arc<DispatchRegistry>,
        mut event_rx: mpsc::UnboundedReceiver<Frame>,
    ) {
        tokio::task::spawn_blocking(move || {
            while let Some(frame) = event_rx.blocking_recv() {
                registry.dispatch(frame);
            }
            trace!("Callback worker stopped");
        });
    }

    /// Closes a session's table and fails its requests with ConnectionClosed.
    fn fail_pending_requests(pending: &Mutex<PendingTable>) {
        let waiters = pending.lock().close();
        let count = waiters.len();

        for tx in waiters {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on shutdown");
        }
    }
}

/// Converts a duration to whole milliseconds, saturating.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
