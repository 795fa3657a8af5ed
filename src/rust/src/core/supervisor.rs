//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Connection supervision: network reachability and reconnect.
//!
//! When the network drops, the session is marked reconnecting and the
//! host hears one error.  When the network returns and login material is
//! saved, one supervisor pass runs: a fresh transport replaces the old
//! one behind the [`TransportHandle`](crate::transport::TransportHandle)
//! (live calls keep sending through it), and the login is replayed once
//! the new socket reports `Connected`.  All passes run on the session
//! executor, so repeated network flaps serialize into single passes.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::common::{ClientEvent, Result};
use crate::core::platform::{NetworkObserver, Platform};
use crate::core::session::Session;
use crate::error::VertoError;

/// Supervision flags shared by all clones of a session.
#[derive(Clone, Default)]
pub struct ConnectionSupervisor {
    /// Network was lost; a reconnect pass is owed when it returns.
    reconnecting: Arc<AtomicBool>,
    /// Guards against registering the platform callback twice.
    network_callback_registered: Arc<AtomicBool>,
    /// The login is re-sent when the fresh transport connects.
    login_replay_pending: Arc<AtomicBool>,
}

impl ConnectionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::Acquire)
    }

    /// Marks the outage; true the first time per outage.
    fn mark_reconnecting(&self) -> bool {
        !self.reconnecting.swap(true, Ordering::AcqRel)
    }

    fn clear_reconnecting(&self) {
        self.reconnecting.store(false, Ordering::Release);
    }

    fn mark_callback_registered(&self) -> bool {
        !self.network_callback_registered.swap(true, Ordering::AcqRel)
    }

    fn clear_callback_registered(&self) {
        self.network_callback_registered
            .store(false, Ordering::Release);
    }

    pub(crate) fn request_login_replay(&self) {
        self.login_replay_pending.store(true, Ordering::Release);
    }

    pub(crate) fn take_login_replay(&self) -> bool {
        self.login_replay_pending.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn reset(&self) {
        self.clear_reconnecting();
        self.login_replay_pending.store(false, Ordering::Release);
    }
}

impl<T> Session<T>
where
    T: Platform,
{
    /// Installs the reachability observer, once per session.
    pub(crate) fn register_network_observer(&self) -> Result<()> {
        if !self.supervisor.mark_callback_registered() {
            return Ok(());
        }
        let session = self.clone();
        let observer = NetworkObserver::new(move |available| {
            let session = session.clone();
            let executor = session.handle.executor.clone();
            executor.post(move || {
                let result = if available {
                    session.on_network_available()
                } else {
                    session.on_network_unavailable()
                };
                if let Err(e) = result {
                    error!("supervisor: network callback failed: {}", e);
                }
            });
        });
        self.handle
            .platform
            .lock()
            .register_network_observer(observer)
    }

    pub(crate) fn unregister_network_observer(&self) {
        if !self
            .supervisor
            .network_callback_registered
            .load(Ordering::Acquire)
        {
            return;
        }
        self.supervisor.clear_callback_registered();
        if let Err(e) = self.handle.platform.lock().unregister_network_observer() {
            warn!("supervisor: unregister failed: {}", e);
        }
    }

    fn on_network_unavailable(&self) -> Result<()> {
        if self.supervisor.mark_reconnecting() {
            warn!("supervisor: network lost");
            self.handle
                .notify(ClientEvent::Error(VertoError::NetworkUnavailable.to_string()));
        }
        Ok(())
    }

    fn on_network_available(&self) -> Result<()> {
        if !self.supervisor.is_reconnecting() {
            return Ok(());
        }
        if self.handle.saved_login.lock().is_none() {
            // Nothing to replay; the host never logged in.
            info!("supervisor: network back, no saved login");
            self.supervisor.clear_reconnecting();
            return Ok(());
        }
        info!("supervisor: network back, reconnecting");
        self.supervisor.clear_reconnecting();
        self.reconnect()
    }

    /// One reconnect pass: fresh socket, login replay on establishment.
    fn reconnect(&self) -> Result<()> {
        // The registration handshake starts over on the new link.
        self.logged_in.store(false, Ordering::Release);
        self.reset_registration_cycle();

        self.supervisor.request_login_replay();
        // `open_transport` bumps the generation, so anything the dying
        // socket still reports is discarded, and installs the new
        // transport behind the shared handle for session and calls alike.
        self.open_transport()
    }
}
