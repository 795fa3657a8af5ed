//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Common error codes.

use thiserror::Error;

use crate::common::CallId;

/// Platform independent error conditions.
#[derive(Error, Debug)]
pub enum VertoError {
    // Project wide common error codes
    #[error("Expecting non-none option value in: {0}, var: {1}")]
    OptionValueNotSet(String, String),

    // Connection error codes
    #[error("No Network Connection")]
    NetworkUnavailable,
    #[error("Gateway registration has timed out")]
    GatewayRegistrationTimeout,
    #[error("Signaling error from remote: {0}")]
    RemoteError(String),

    // Session error codes
    #[error("Session is not ready, login first")]
    SessionNotReady,
    #[error("No call found for call_id: {0}")]
    UnknownCall(CallId),
    #[error("Unable to parse inbound frame: {0}")]
    MalformedFrame(String),

    // Call error codes
    #[error("Local SDP description is not available")]
    LocalDescriptionUnavailable,
    #[error("Unable to apply remote SDP description")]
    SetRemoteDescription,

    // Transport error codes
    #[error("WebSocket is not connected")]
    TransportNotConnected,
    #[error("WebSocket connect failed: {0}")]
    TransportConnectFailed(String),
}
