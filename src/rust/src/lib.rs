//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! # VertoRTC -- A Rust Verto Signaling Engine
//!
//! This crate provides the client side of a Verto-dialect JSON-RPC
//! signaling session over a secure WebSocket, driving WebRTC voice calls
//! against a telephony gateway: login and gateway registration, per-call
//! lifecycle state machines, and connection supervision with reconnect.
//!
//! The WebRTC engine itself, audio routing, and ringtone playback are
//! host concerns, reached through [`core::platform::Platform`].

#[macro_use]
extern crate log;

pub mod common;

pub mod error;

/// Core, platform independent functionality.
pub mod core {
    pub mod call;
    pub mod platform;
    pub mod registry;
    pub mod session;
    pub mod supervisor;
    pub mod util;
}

/// Wire protocol: the Verto JSON-RPC dialect.
pub mod protocol;

/// Signaling socket: trait, handle, and the production WebSocket.
pub mod transport;

/// Seam to the WebRTC peer-connection engine.
pub mod webrtc {
    pub mod peer_connection;
}

/// Simulation implementations for tests.
pub mod sim {
    pub mod peer_connection;
    pub mod sim_platform;
    pub mod transport;
}
