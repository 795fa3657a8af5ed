//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! The signaling transport seam.
//!
//! Rust consumers talk to a [`Transport`] through a [`TransportHandle`];
//! the handle resolves the current transport at send time, so a reconnect
//! can swap the underlying socket without reaching into live calls.

use std::fmt;
use std::sync::Arc;

use crate::common::state::StateLock;

pub mod websocket;

/// What a transport reports back to its owner.  Delivered on the
/// transport's own thread; the session re-posts onto its executor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket is open and frames can flow.
    Connected,
    /// One inbound text frame, verbatim.
    Frame(String),
    /// The socket is gone.  `error` is set when it closed abnormally.
    Closed { error: Option<String> },
}

impl fmt::Display for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "Connected"),
            Self::Frame(frame) => write!(f, "Frame({} bytes)", frame.len()),
            Self::Closed { error } => write!(f, "Closed({:?})", error),
        }
    }
}

/// Callback the owner installs to receive [`TransportEvent`]s.
pub type TransportEventSink = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// An abstract signaling socket.  Production uses
/// [`websocket::WebSocketTransport`]; tests use a simulation.
///
/// A transport is never reused after `destroy()`; reconnect allocates a
/// fresh one.
pub trait Transport: Send + Sync {
    /// Writes one text frame.  When the socket is not open the frame is
    /// discarded and logged; there is no queuing.
    fn send(&self, frame: String);

    /// Closes the socket and cancels in-flight work.
    fn destroy(&self);

    fn is_connected(&self) -> bool;
}

/// The swap point between the session, its calls, and the current socket.
#[derive(Clone)]
pub struct TransportHandle {
    current: Arc<StateLock<Option<Arc<dyn Transport>>>>,
}

impl Default for TransportHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportHandle {
    pub fn new() -> Self {
        Self {
            current: Arc::new(StateLock::new(None, "transport_handle")),
        }
    }

    /// Installs a fresh transport, returning the previous one so the
    /// caller can destroy it.
    pub fn install(&self, transport: Arc<dyn Transport>) -> Option<Arc<dyn Transport>> {
        self.current.lock().replace(transport)
    }

    /// Removes the current transport without destroying it.
    pub fn take(&self) -> Option<Arc<dyn Transport>> {
        self.current.lock().take()
    }

    /// Sends through the current transport.  A missing or closed socket
    /// drops the frame (the supervisor replays the login after reconnect,
    /// so nothing here needs to queue).
    pub fn send(&self, frame: String) {
        let transport = self.current.lock().clone();
        match transport {
            Some(transport) => transport.send(frame),
            None => {
                warn!("transport_handle: no socket installed, dropping outbound frame");
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .map(|transport| transport.is_connected())
            .unwrap_or(false)
    }
}
