//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! TLS WebSocket transport over tokio-tungstenite.
//!
//! Each instance owns a small tokio runtime that services the socket's
//! read and write halves.  Inbound text frames are handed to the owner's
//! event sink verbatim; the owner does all parsing, so a malformed frame
//! never disconnects the socket.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::common::state::StateLock;
use crate::common::Result;
use crate::error::VertoError;
use crate::transport::{Transport, TransportEvent, TransportEventSink};

pub struct WebSocketTransport {
    /// Runtime servicing the socket; taken on destroy.
    runtime: StateLock<Option<tokio::runtime::Runtime>>,
    outgoing: mpsc::UnboundedSender<String>,
    shutdown: Arc<Notify>,
    connected: Arc<AtomicBool>,
    /// Ensures the owner hears about the close exactly once.
    close_reported: Arc<AtomicBool>,
}

impl WebSocketTransport {
    /// Opens `wss://host:port` in the background.  The sink sees
    /// `Connected` once the handshake finishes, then one `Frame` per
    /// inbound text message, then exactly one `Closed`.
    pub fn connect(host: &str, port: u16, sink: TransportEventSink) -> Result<Self> {
        let url = format!("wss://{}:{}", host, port);
        info!("websocket: connecting to {}", url);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("signaling-ws")
            .enable_all()
            .build()?;

        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());
        let connected = Arc::new(AtomicBool::new(false));
        let close_reported = Arc::new(AtomicBool::new(false));

        runtime.spawn(run_socket(
            url,
            outgoing_rx,
            sink,
            shutdown.clone(),
            connected.clone(),
            close_reported.clone(),
        ));

        Ok(Self {
            runtime: StateLock::new(Some(runtime), "websocket_runtime"),
            outgoing,
            shutdown,
            connected,
            close_reported,
        })
    }
}

impl Transport for WebSocketTransport {
    fn send(&self, frame: String) {
        if !self.connected.load(Ordering::Acquire) {
            warn!("websocket: send on closed socket, dropping frame");
            return;
        }
        if self.outgoing.send(frame).is_err() {
            warn!("websocket: writer is gone, dropping frame");
        }
    }

    fn destroy(&self) {
        info!("websocket: destroy()");
        self.connected.store(false, Ordering::Release);
        // Destroy is deliberate teardown, not a failure the owner needs
        // to hear about.
        self.close_reported.store(true, Ordering::Release);
        self.shutdown.notify_waiters();
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

async fn run_socket(
    url: String,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    sink: TransportEventSink,
    shutdown: Arc<Notify>,
    connected: Arc<AtomicBool>,
    close_reported: Arc<AtomicBool>,
) {
    let report_closed = |error: Option<String>| {
        connected.store(false, Ordering::Release);
        if !close_reported.swap(true, Ordering::AcqRel) {
            sink(TransportEvent::Closed { error });
        }
    };

    let stream = tokio::select! {
        result = connect_async(&url) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                let error = VertoError::TransportConnectFailed(e.to_string());
                error!("websocket: {}", error);
                report_closed(Some(error.to_string()));
                return;
            }
        },
        _ = shutdown.notified() => return,
    };

    info!("websocket: connection established");
    connected.store(true, Ordering::Release);
    sink(TransportEvent::Connected);

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                let _ = write.close().await;
                return;
            }
            frame = outgoing.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = write.send(Message::text(frame)).await {
                        warn!("websocket: write failed: {}", e);
                        report_closed(Some(e.to_string()));
                        return;
                    }
                }
                // Sender dropped; the transport is going away.
                None => {
                    let _ = write.close().await;
                    return;
                }
            },
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => sink(TransportEvent::Frame(text.to_string())),
                // Pings are answered by tungstenite; binary frames are
                // not part of this protocol.
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(close_frame))) => {
                    info!("websocket: closed by remote: {:?}", close_frame);
                    report_closed(None);
                    return;
                }
                Some(Ok(other)) => {
                    debug!("websocket: ignoring non-text message: {:?}", other);
                }
                Some(Err(e)) => {
                    warn!("websocket: read failed: {}", e);
                    report_closed(Some(e.to_string()));
                    return;
                }
                None => {
                    report_closed(None);
                    return;
                }
            },
        }
    }
}
