//! Listener registry for event frames.
//!
//! Event frames (sequence number 0) are routed to at most one listener per
//! `(uid, event id)` pair. Listener failures never reach the receive loop:
//! errors and panics are converted to [`Error::Callback`] and handed to the
//! registry's [`ErrorSink`].

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{error, trace};

use crate::error::{Error, Result};
use crate::identifiers::Uid;
use crate::protocol::Frame;

// ============================================================================
// Types
// ============================================================================

/// Raw event listener.
///
/// Receives the event payload; returning an error reports it to the sink.
pub type Listener = Arc<dyn Fn(Bytes) -> Result<()> + Send + Sync>;

/// Registry key.
type ListenerKey = (Uid, u8);

// ============================================================================
// ErrorSink
// ============================================================================

/// Destination for listener failures.
pub trait ErrorSink: Send + Sync {
    /// Reports one failed listener invocation.
    fn report(&self, error: Error);
}

/// Default sink: logs failures through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, error: Error) {
        error!(error = %error, "Listener failed");
    }
}

impl<F> ErrorSink for F
where
    F: Fn(Error) + Send + Sync,
{
    fn report(&self, error: Error) {
        self(error);
    }
}

// ============================================================================
// DispatchRegistry
// ============================================================================

/// Maps `(uid, event id)` to listeners.
///
/// # Thread Safety
///
/// Registration happens on caller tasks while dispatch runs on the
/// connection's callback worker. Listeners are cloned out of the lock before
/// being invoked, so a listener may itself register or unregister.
pub struct DispatchRegistry {
    listeners: RwLock<FxHashMap<ListenerKey, Listener>>,
    sink: Arc<dyn ErrorSink>,
}

impl fmt::Debug for DispatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRegistry")
            .field("listeners", &self.listeners.read().len())
            .finish_non_exhaustive()
    }
}

impl Default for DispatchRegistry {
    fn default() -> Self {
        Self::new(Arc::new(TracingErrorSink))
    }
}

impl DispatchRegistry {
    /// Creates an empty registry reporting to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            listeners: RwLock::new(FxHashMap::default()),
            sink,
        }
    }

    /// Registers `listener`, replacing any previous one for the same key.
    pub fn register(&self, uid: Uid, event_id: u8, listener: Listener) {
        let replaced = self
            .listeners
            .write()
            .insert((uid, event_id), listener)
            .is_some();
        trace!(%uid, event_id, replaced, "Listener registered");
    }

    /// Removes the listener for a key.
    ///
    /// Returns `true` if one was registered.
    pub fn unregister(&self, uid: Uid, event_id: u8) -> bool {
        let removed = self.listeners.write().remove(&(uid, event_id)).is_some();
        trace!(%uid, event_id, removed, "Listener unregistered");
        removed
    }

    /// Returns `true` if a listener exists for the key.
    #[inline]
    #[must_use]
    pub fn is_registered(&self, uid: Uid, event_id: u8) -> bool {
        self.listeners.read().contains_key(&(uid, event_id))
    }

    /// Returns the number of registered listeners.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Routes an event frame to its listener.
    ///
    /// Frames without a listener, and broadcast frames, are discarded.
    /// Returns `true` if a listener ran successfully.
    pub fn dispatch(&self, frame: Frame) -> bool {
        let Some(uid) = frame.uid() else {
            trace!(function_id = frame.function_id(), "Broadcast event discarded");
            return false;
        };
        let event_id = frame.function_id();

        let listener = self.listeners.read().get(&(uid, event_id)).cloned();
        let Some(listener) = listener else {
            trace!(%uid, event_id, "No listener, event discarded");
            return false;
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| listener(frame.payload)));

        let failure = match outcome {
            Ok(Ok(())) => return true,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
        };

        self.sink.report(Error::callback(uid, event_id, failure));
        false
    }
}

/// Extracts the message of a panic payload.
fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

// ============================================================================
// Tests
// ============================================================================
