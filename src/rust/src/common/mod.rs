//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Common types used throughout the library.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod executor;
pub mod state;

/// Common Result type, using `anyhow::Error` for Error.
pub type Result<T> = anyhow::Result<T>;

/// Unique call identification number, one per dialog.  Serializes as the
/// hyphenated UUID string the wire protocol uses for `callID`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses the `callID` field of an inbound frame.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for CallId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Tracks the lifecycle of a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallState {
    /// Call object exists but no SDP has moved yet.
    New,
    /// Early media arrived before the answer; waiting for the final answer.
    Connecting,
    /// The call is ringing, either direction.
    Ringing,
    /// The call is answered and media is flowing.
    Active,
    /// The call is on hold.
    Held,
    /// Terminal state.  The call is finished and removed from the registry.
    Done,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The call direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallDirection {
    Incoming,
    Outgoing,
}

impl fmt::Display for CallDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Registration state of the remote SIP gateway, as reported in
/// `telnyx_rtc.gatewayState` frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatewayState {
    Idle,
    Trying,
    Register,
    Reged,
    Unreged,
    Unregister,
    Attached,
    Failed,
    FailWait,
    Expired,
    Noreg,
    Noauthed,
}

impl GatewayState {
    /// Parses the `state` value of a gateway-state frame.  Unknown values
    /// are reported as `None` and the polling loop keeps running.
    pub fn from_remote(state: &str) -> Option<Self> {
        match state {
            "IDLE" => Some(Self::Idle),
            "TRYING" => Some(Self::Trying),
            "REGISTER" => Some(Self::Register),
            "REGED" => Some(Self::Reged),
            "UNREGED" => Some(Self::Unreged),
            "UNREGISTER" => Some(Self::Unregister),
            "ATTACHED" => Some(Self::Attached),
            "FAILED" => Some(Self::Failed),
            "FAIL_WAIT" => Some(Self::FailWait),
            "EXPIRED" => Some(Self::Expired),
            "NOREG" => Some(Self::Noreg),
            "NOAUTHED" => Some(Self::Noauthed),
            _ => None,
        }
    }
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Log verbosity requested by the host application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    All,
    None,
    Verbo,
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::All | Self::Verbo => log::LevelFilter::Trace,
            Self::None => log::LevelFilter::Off,
            Self::Debug => log::LevelFilter::Debug,
            Self::Info => log::LevelFilter::Info,
            Self::Warning => log::LevelFilter::Warn,
            Self::Error => log::LevelFilter::Error,
        }
    }
}

/// Events surfaced to the host application, one tagged stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// The signaling socket is open.  The host may now log in.
    ConnectionEstablished,
    /// Login and gateway registration both succeeded.  Carries the
    /// remote-assigned session id.
    Login(String),
    /// Emitted directly after `Login`; the readiness signal hosts key off.
    ClientReady,
    /// An inbound call arrived.
    Invite {
        call_id: CallId,
        caller_id_name: String,
        caller_id_number: String,
        sdp: String,
        telnyx_session_id: Option<String>,
    },
    /// The remote answered an outbound call.
    Answer { call_id: CallId, sdp: String },
    /// The remote leg is ringing.
    Ringing { call_id: CallId },
    /// Early media arrived for a call.
    Media { call_id: CallId },
    /// The remote hung up.
    Bye { call_id: CallId },
    /// Any user-visible failure.
    Error(String),
}

impl ClientEvent {
    pub fn kind(&self) -> ClientEventKind {
        match self {
            Self::ConnectionEstablished => ClientEventKind::ConnectionEstablished,
            Self::Login(_) => ClientEventKind::Login,
            Self::ClientReady => ClientEventKind::ClientReady,
            Self::Invite { .. } => ClientEventKind::Invite,
            Self::Answer { .. } => ClientEventKind::Answer,
            Self::Ringing { .. } => ClientEventKind::Ringing,
            Self::Media { .. } => ClientEventKind::Media,
            Self::Bye { .. } => ClientEventKind::Bye,
            Self::Error(_) => ClientEventKind::Error,
        }
    }
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Login(sessid) => write!(f, "Login({})", sessid),
            Self::Invite { call_id, .. } => write!(f, "Invite({})", call_id),
            Self::Answer { call_id, .. } => write!(f, "Answer({})", call_id),
            Self::Ringing { call_id } => write!(f, "Ringing({})", call_id),
            Self::Media { call_id } => write!(f, "Media({})", call_id),
            Self::Bye { call_id } => write!(f, "Bye({})", call_id),
            Self::Error(message) => write!(f, "Error({})", message),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Payload-free tags for [`ClientEvent`], convenient for counting in tests
/// and for hosts that switch on the event type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientEventKind {
    ConnectionEstablished,
    Login,
    ClientReady,
    Invite,
    Answer,
    Ringing,
    Media,
    Bye,
    Error,
}

/// Timer and retry tuning for a session.  The defaults are the production
/// values; tests shorten them.
#[derive(Clone, Copy, Debug)]
pub struct SessionTiming {
    /// How long to wait for a gateway-state response before re-polling.
    pub gateway_poll_period: Duration,
    /// How many re-polls are allowed before registration times out.
    pub max_reg_retries: u32,
    /// How long to let ICE gathering run before the invite is sent.
    pub ice_gather_delay: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            gateway_poll_period: Duration::from_millis(3000),
            max_reg_retries: 2,
            ice_gather_delay: Duration::from_millis(300),
        }
    }
}

/// Connection parameters for the signaling gateway.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub turn: String,
    pub stun: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "rtc.telnyx.com".to_string(),
            port: 14938,
            turn: "turn:turn.telnyx.com:3478?transport=tcp".to_string(),
            stun: "stun:stun.telnyx.com:3843".to_string(),
        }
    }
}

/// SIP-user/password login configuration.
#[derive(Clone, Debug)]
pub struct CredentialConfig {
    pub sip_user: String,
    pub sip_password: String,
    pub sip_caller_id_name: String,
    pub sip_caller_id_number: String,
    pub fcm_token: Option<String>,
    pub ringtone: Option<String>,
    pub ringback_tone: Option<String>,
    pub log_level: LogLevel,
}

/// JWT login configuration.
#[derive(Clone, Debug)]
pub struct TokenConfig {
    pub sip_token: String,
    pub sip_caller_id_name: String,
    pub sip_caller_id_number: String,
    pub fcm_token: Option<String>,
    pub ringtone: Option<String>,
    pub ringback_tone: Option<String>,
    pub log_level: LogLevel,
}

/// Saved login material, replayed on reconnect.
#[derive(Clone, Debug)]
pub enum LoginConfig {
    Credential(CredentialConfig),
    Token(TokenConfig),
}

impl LoginConfig {
    pub fn fcm_token(&self) -> Option<&str> {
        match self {
            Self::Credential(c) => c.fcm_token.as_deref(),
            Self::Token(c) => c.fcm_token.as_deref(),
        }
    }

    pub fn ringtone(&self) -> Option<&str> {
        match self {
            Self::Credential(c) => c.ringtone.as_deref(),
            Self::Token(c) => c.ringtone.as_deref(),
        }
    }

    pub fn ringback_tone(&self) -> Option<&str> {
        match self {
            Self::Credential(c) => c.ringback_tone.as_deref(),
            Self::Token(c) => c.ringback_tone.as_deref(),
        }
    }
}
