//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Simulation peer connection.
//!
//! Produces canned SDP instead of driving a WebRTC engine, and records
//! everything the engine would have been asked to do.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use crate::common::Result;
use crate::error::VertoError;
use crate::webrtc::peer_connection::{PeerConnection, SessionDescription};

#[derive(Default)]
struct SimPeerConnectionInner {
    local_description: Mutex<Option<SessionDescription>>,
    remote_description: Mutex<Option<SessionDescription>>,
    capture_started: AtomicBool,
    outgoing_audio_disabled: AtomicBool,
    closed: AtomicBool,
    /// When set, description generation yields nothing, simulating an
    /// engine that failed to produce SDP.
    fail_descriptions: AtomicBool,
}

#[derive(Clone, Default)]
pub struct SimPeerConnection {
    inner: Arc<SimPeerConnectionInner>,
}

impl SimPeerConnection {
    pub fn new(fail_descriptions: bool) -> Self {
        let pc = Self::default();
        pc.inner
            .fail_descriptions
            .store(fail_descriptions, Ordering::Release);
        pc
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.inner.remote_description.lock().unwrap().clone()
    }

    pub fn capture_started(&self) -> bool {
        self.inner.capture_started.load(Ordering::Acquire)
    }

    pub fn outgoing_audio_enabled(&self) -> bool {
        !self.inner.outgoing_audio_disabled.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl PeerConnection for SimPeerConnection {
    fn start_audio_capture(&self) -> Result<()> {
        info!("sim_pc: start_audio_capture()");
        self.inner.capture_started.store(true, Ordering::Release);
        Ok(())
    }

    fn create_offer(&self) -> Result<()> {
        info!("sim_pc: create_offer()");
        if !self.inner.fail_descriptions.load(Ordering::Acquire) {
            let offer = SessionDescription::offer("v=0\r\no=sim-offer\r\n".to_string());
            *self.inner.local_description.lock().unwrap() = Some(offer);
        }
        Ok(())
    }

    fn create_answer(&self) -> Result<()> {
        info!("sim_pc: create_answer()");
        if !self.inner.fail_descriptions.load(Ordering::Acquire) {
            let answer = SessionDescription::answer("v=0\r\no=sim-answer\r\n".to_string());
            *self.inner.local_description.lock().unwrap() = Some(answer);
        }
        Ok(())
    }

    fn local_description(&self) -> Option<SessionDescription> {
        self.inner.local_description.lock().unwrap().clone()
    }

    fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        info!("sim_pc: set_remote_description()");
        if self.inner.fail_descriptions.load(Ordering::Acquire) {
            return Err(VertoError::SetRemoteDescription.into());
        }
        *self.inner.remote_description.lock().unwrap() = Some(description);
        Ok(())
    }

    fn set_outgoing_audio_enabled(&self, enabled: bool) -> Result<()> {
        info!("sim_pc: set_outgoing_audio_enabled({})", enabled);
        self.inner
            .outgoing_audio_disabled
            .store(!enabled, Ordering::Release);
        Ok(())
    }

    fn close(&self) {
        info!("sim_pc: close()");
        self.inner.closed.store(true, Ordering::Release);
    }
}
