//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Simulation Platform implementation.
//!
//! Counts everything the engine asks of the host, hands out sim
//! transports and peer connections, and lets tests flip network
//! reachability and inject faults.

use std::collections::HashMap;
use std::fmt;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use crate::common::{ClientEvent, ClientEventKind, Result, ServerConfig};
use crate::core::platform::{NetworkObserver, Platform};
use crate::sim::peer_connection::SimPeerConnection;
use crate::sim::transport::SimTransport;
use crate::transport::{Transport, TransportEventSink};
use crate::webrtc::peer_connection::IceServers;

#[derive(Default)]
struct SimStats {
    ringtone_plays: AtomicUsize,
    ringback_plays: AtomicUsize,
    media_stops: AtomicUsize,
}

pub struct SimPlatform {
    stats: Arc<SimStats>,
    /// Every event the engine surfaced, in order.
    events: Arc<Mutex<Vec<ClientEvent>>>,
    /// Event frequencies by kind.
    event_map: Arc<Mutex<HashMap<ClientEventKind, usize>>>,
    transports: Arc<Mutex<Vec<SimTransport>>>,
    peer_connections: Arc<Mutex<Vec<SimPeerConnection>>>,
    network_observer: Arc<Mutex<Option<NetworkObserver>>>,
    network_reachable: Arc<AtomicBool>,
    /// When true (the default), created transports report `Connected`
    /// immediately.
    auto_open_transports: Arc<AtomicBool>,
    /// When true, created peer connections fail to produce descriptions.
    fail_descriptions: Arc<AtomicBool>,
    microphone_muted: Arc<AtomicBool>,
    loudspeaker_enabled: Arc<AtomicBool>,
}

impl Clone for SimPlatform {
    fn clone(&self) -> Self {
        Self {
            stats: Arc::clone(&self.stats),
            events: Arc::clone(&self.events),
            event_map: Arc::clone(&self.event_map),
            transports: Arc::clone(&self.transports),
            peer_connections: Arc::clone(&self.peer_connections),
            network_observer: Arc::clone(&self.network_observer),
            network_reachable: Arc::clone(&self.network_reachable),
            auto_open_transports: Arc::clone(&self.auto_open_transports),
            fail_descriptions: Arc::clone(&self.fail_descriptions),
            microphone_muted: Arc::clone(&self.microphone_muted),
            loudspeaker_enabled: Arc::clone(&self.loudspeaker_enabled),
        }
    }
}

impl fmt::Display for SimPlatform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SimPlatform")
    }
}

impl fmt::Debug for SimPlatform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self {
            stats: Arc::default(),
            events: Arc::default(),
            event_map: Arc::default(),
            transports: Arc::default(),
            peer_connections: Arc::default(),
            network_observer: Arc::default(),
            network_reachable: Arc::new(AtomicBool::new(true)),
            auto_open_transports: Arc::new(AtomicBool::new(true)),
            fail_descriptions: Arc::new(AtomicBool::new(false)),
            microphone_muted: Arc::new(AtomicBool::new(false)),
            loudspeaker_enabled: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SimPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    // --- test controls ---

    pub fn set_network_reachable(&self, reachable: bool) {
        self.network_reachable.store(reachable, Ordering::Release);
    }

    pub fn set_auto_open_transports(&self, auto_open: bool) {
        self.auto_open_transports.store(auto_open, Ordering::Release);
    }

    pub fn set_fail_descriptions(&self, fail: bool) {
        self.fail_descriptions.store(fail, Ordering::Release);
    }

    /// The observer the engine registered, for driving reachability
    /// changes from tests.
    pub fn network_observer(&self) -> Option<NetworkObserver> {
        self.network_observer.lock().unwrap().clone()
    }

    pub fn observer_registered(&self) -> bool {
        self.network_observer.lock().unwrap().is_some()
    }

    // --- inspection ---

    pub fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_count(&self, kind: ClientEventKind) -> usize {
        *self.event_map.lock().unwrap().get(&kind).unwrap_or(&0)
    }

    pub fn error_count(&self) -> usize {
        self.event_count(ClientEventKind::Error)
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ClientEvent::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
        self.event_map.lock().unwrap().clear();
    }

    pub fn transport_count(&self) -> usize {
        self.transports.lock().unwrap().len()
    }

    pub fn transport(&self) -> SimTransport {
        self.transports
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no transport created yet")
    }

    pub fn nth_transport(&self, index: usize) -> SimTransport {
        self.transports.lock().unwrap()[index].clone()
    }

    pub fn peer_connection_count(&self) -> usize {
        self.peer_connections.lock().unwrap().len()
    }

    pub fn peer_connection(&self) -> SimPeerConnection {
        self.peer_connections
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no peer connection created yet")
    }

    pub fn microphone_muted(&self) -> bool {
        self.microphone_muted.load(Ordering::Acquire)
    }

    pub fn loudspeaker_enabled(&self) -> bool {
        self.loudspeaker_enabled.load(Ordering::Acquire)
    }

    pub fn ringtone_plays(&self) -> usize {
        self.stats.ringtone_plays.load(Ordering::Acquire)
    }

    pub fn ringback_plays(&self) -> usize {
        self.stats.ringback_plays.load(Ordering::Acquire)
    }

    pub fn media_stops(&self) -> usize {
        self.stats.media_stops.load(Ordering::Acquire)
    }
}

impl Platform for SimPlatform {
    type AppPeerConnection = SimPeerConnection;

    fn create_transport(
        &self,
        _config: &ServerConfig,
        sink: TransportEventSink,
    ) -> Result<Arc<dyn Transport>> {
        info!("sim_platform: create_transport()");
        let transport = SimTransport::new(sink);
        if self.auto_open_transports.load(Ordering::Acquire) {
            transport.open();
        }
        self.transports.lock().unwrap().push(transport.clone());
        Ok(Arc::new(transport))
    }

    fn create_peer_connection(&self, ice_servers: IceServers) -> Result<SimPeerConnection> {
        info!(
            "sim_platform: create_peer_connection(): turn: {}, stun: {}",
            ice_servers.turn_url, ice_servers.stun_url
        );
        let pc = SimPeerConnection::new(self.fail_descriptions.load(Ordering::Acquire));
        self.peer_connections.lock().unwrap().push(pc.clone());
        Ok(pc)
    }

    fn on_event(&self, event: ClientEvent) -> Result<()> {
        info!("sim_platform: on_event(): {}", event);
        let mut map = self.event_map.lock().unwrap();
        map.entry(event.kind()).and_modify(|e| *e += 1).or_insert(1);
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    fn network_is_reachable(&self) -> bool {
        self.network_reachable.load(Ordering::Acquire)
    }

    fn register_network_observer(&self, observer: NetworkObserver) -> Result<()> {
        info!("sim_platform: register_network_observer()");
        *self.network_observer.lock().unwrap() = Some(observer);
        Ok(())
    }

    fn unregister_network_observer(&self) -> Result<()> {
        info!("sim_platform: unregister_network_observer()");
        *self.network_observer.lock().unwrap() = None;
        Ok(())
    }

    fn set_microphone_mute(&self, mute: bool) -> Result<()> {
        self.microphone_muted.store(mute, Ordering::Release);
        Ok(())
    }

    fn set_loudspeaker(&self, enabled: bool) -> Result<()> {
        self.loudspeaker_enabled.store(enabled, Ordering::Release);
        Ok(())
    }

    fn play_ringtone(&self, media: Option<&str>) -> Result<()> {
        info!("sim_platform: play_ringtone({:?})", media);
        self.stats.ringtone_plays.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn play_ringback(&self, media: Option<&str>) -> Result<()> {
        info!("sim_platform: play_ringback({:?})", media);
        self.stats.ringback_plays.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn stop_media(&self) -> Result<()> {
        self.stats.media_stops.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
