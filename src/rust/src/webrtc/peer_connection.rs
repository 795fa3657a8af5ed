//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! The seam to the WebRTC peer-connection engine.
//!
//! This crate never looks inside an SDP blob; it shuttles descriptions
//! between the wire and whichever engine the platform provides.  SDP
//! generation, ICE, and audio capture all live behind this trait.

use std::fmt;

use crate::common::Result;
use crate::core::util::redact_sdp;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

/// An opaque SDP blob plus its offer/answer role.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: String) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp,
        }
    }

    pub fn answer(sdp: String) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp,
        }
    }
}

impl fmt::Debug for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}({})", self.sdp_type, redact_sdp(&self.sdp))
    }
}

/// ICE server URLs handed to the engine when a connection is built.
#[derive(Clone, Debug)]
pub struct IceServers {
    pub turn_url: String,
    pub stun_url: String,
}

/// One WebRTC peer connection, scoped to a single call.
///
/// `create_offer`/`create_answer` kick off asynchronous SDP generation
/// and ICE candidate gathering inside the engine; the generated
/// description is read back later through `local_description()`, which
/// reflects whatever candidates gathering has produced so far.
pub trait PeerConnection: Send + 'static {
    /// Starts local audio capture for this connection.
    fn start_audio_capture(&self) -> Result<()>;

    fn create_offer(&self) -> Result<()>;

    fn create_answer(&self) -> Result<()>;

    /// The current local description, if generation has produced one.
    fn local_description(&self) -> Option<SessionDescription>;

    fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    /// Enables or disables the outgoing audio track (mute).
    fn set_outgoing_audio_enabled(&self, enabled: bool) -> Result<()>;

    /// Tears the connection down.  Idempotent.
    fn close(&self);
}
