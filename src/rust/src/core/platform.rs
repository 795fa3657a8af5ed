//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Platform trait describing the interface an operating system platform
//! must implement for calling.

use std::fmt;
use std::sync::Arc;

use crate::common::{ClientEvent, Result, ServerConfig};
use crate::transport::{Transport, TransportEventSink};
use crate::webrtc::peer_connection::{IceServers, PeerConnection};

/// Handle through which the platform reports network reachability
/// changes back into the engine.
#[derive(Clone)]
pub struct NetworkObserver {
    on_change: Arc<dyn Fn(bool) + Send + Sync>,
}

impl NetworkObserver {
    pub fn new(on_change: impl Fn(bool) + Send + Sync + 'static) -> Self {
        Self {
            on_change: Arc::new(on_change),
        }
    }

    pub fn network_available(&self) {
        (self.on_change)(true);
    }

    pub fn network_unavailable(&self) {
        (self.on_change)(false);
    }
}

impl fmt::Debug for NetworkObserver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NetworkObserver")
    }
}

/// A trait describing the interface an operating system platform must
/// implement for calling.
///
/// The engine mutates state only on its own executor; platform methods
/// are invoked from that thread and must not block for long.
pub trait Platform: fmt::Debug + fmt::Display + Send + Sized + 'static {
    /// Platform specific WebRTC peer connection.
    type AppPeerConnection: PeerConnection;

    /// Opens a signaling socket to the configured gateway.  Production
    /// platforms return a
    /// [`WebSocketTransport`](crate::transport::websocket::WebSocketTransport).
    fn create_transport(
        &self,
        config: &ServerConfig,
        sink: TransportEventSink,
    ) -> Result<Arc<dyn Transport>>;

    /// Builds a peer connection configured with the given ICE servers.
    fn create_peer_connection(&self, ice_servers: IceServers) -> Result<Self::AppPeerConnection>;

    /// Notify the client application about an event.
    fn on_event(&self, event: ClientEvent) -> Result<()>;

    /// A cheap reachability probe, consulted before opening a socket.
    fn network_is_reachable(&self) -> bool;

    /// Installs the engine's network observer.  Called at most once per
    /// session; the engine guards against double registration.
    fn register_network_observer(&self, observer: NetworkObserver) -> Result<()>;

    fn unregister_network_observer(&self) -> Result<()>;

    /// OS microphone mute.
    fn set_microphone_mute(&self, mute: bool) -> Result<()>;

    /// OS speakerphone routing.
    fn set_loudspeaker(&self, enabled: bool) -> Result<()>;

    /// Starts the incoming-call ringtone.  `media` is the host-specific
    /// resource configured at login, if any.
    fn play_ringtone(&self, media: Option<&str>) -> Result<()>;

    /// Starts the outbound ringback tone.
    fn play_ringback(&self, media: Option<&str>) -> Result<()>;

    /// Stops any ringtone/ringback playback.
    fn stop_media(&self) -> Result<()>;

    /// Identifier reported to the gateway in `userVariables`.
    fn push_notification_provider(&self) -> &'static str {
        "android"
    }
}
