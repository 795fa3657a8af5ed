//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Simulation transport: a socket whose far end is the test.
//!
//! Tests inspect the frames the engine sent and inject the frames the
//! gateway would have delivered.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use serde_json::Value;

use crate::transport::{Transport, TransportEvent, TransportEventSink};

struct SimTransportInner {
    sink: TransportEventSink,
    connected: AtomicBool,
    destroyed: AtomicBool,
    sent: Mutex<Vec<String>>,
}

#[derive(Clone)]
pub struct SimTransport {
    inner: Arc<SimTransportInner>,
}

impl SimTransport {
    pub fn new(sink: TransportEventSink) -> Self {
        Self {
            inner: Arc::new(SimTransportInner {
                sink,
                connected: AtomicBool::new(false),
                destroyed: AtomicBool::new(false),
                sent: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Completes the "handshake": marks the socket open and reports
    /// `Connected`.
    pub fn open(&self) {
        self.inner.connected.store(true, Ordering::Release);
        (self.inner.sink)(TransportEvent::Connected);
    }

    /// Delivers one inbound frame, as if the gateway had sent it.
    pub fn receive_frame(&self, frame: &str) {
        (self.inner.sink)(TransportEvent::Frame(frame.to_string()));
    }

    /// Simulates an abnormal socket close.
    pub fn close_with_error(&self, error: &str) {
        self.inner.connected.store(false, Ordering::Release);
        (self.inner.sink)(TransportEvent::Closed {
            error: Some(error.to_string()),
        });
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    pub fn sent_frames(&self) -> Vec<String> {
        self.inner.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.inner.sent.lock().unwrap().len()
    }

    pub fn last_frame(&self) -> Option<String> {
        self.inner.sent.lock().unwrap().last().cloned()
    }

    /// The `method` field of every sent frame, in order.
    pub fn sent_methods(&self) -> Vec<String> {
        self.sent_frames()
            .iter()
            .filter_map(|frame| {
                serde_json::from_str::<Value>(frame)
                    .ok()
                    .and_then(|v| v["method"].as_str().map(str::to_string))
            })
            .collect()
    }

    /// Parsed frames whose `method` matches, in order.
    pub fn sent_with_method(&self, method: &str) -> Vec<Value> {
        self.sent_frames()
            .iter()
            .filter_map(|frame| serde_json::from_str::<Value>(frame).ok())
            .filter(|v| v["method"] == method)
            .collect()
    }
}

impl Transport for SimTransport {
    fn send(&self, frame: String) {
        if !self.inner.connected.load(Ordering::Acquire) {
            warn!("sim_transport: send on closed socket, dropping frame");
            return;
        }
        self.inner.sent.lock().unwrap().push(frame);
    }

    fn destroy(&self) {
        info!("sim_transport: destroy()");
        self.inner.connected.store(false, Ordering::Release);
        self.inner.destroyed.store(true, Ordering::Release);
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }
}
