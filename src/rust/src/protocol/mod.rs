//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! The Verto JSON-RPC dialect: outgoing request bodies, the inbound
//! envelope, and classification of inbound frames by `method`.
//!
//! Everything on the wire is a JSON text frame.  Requests we send carry a
//! fresh UUID id; responses from the remote echo it.  Server-initiated
//! notifications carry `method` + `params` and no `result`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{CallId, Result};
use crate::core::util::redact_sdp;
use crate::error::VertoError;

pub const JSONRPC_VERSION: &str = "2.0";

/// SIP cause carried on a locally initiated bye.
pub const USER_BUSY_CAUSE: &str = "USER_BUSY";
pub const USER_BUSY_CAUSE_CODE: i32 = 17;

/// Wire method names.
pub mod method {
    pub const LOGIN: &str = "login";
    pub const CLIENT_READY: &str = "telnyx_rtc.clientReady";
    pub const GATEWAY_STATE: &str = "telnyx_rtc.gatewayState";
    pub const INVITE: &str = "telnyx_rtc.invite";
    pub const ANSWER: &str = "telnyx_rtc.answer";
    pub const MEDIA: &str = "telnyx_rtc.media";
    pub const RINGING: &str = "telnyx_rtc.ringing";
    pub const BYE: &str = "telnyx_rtc.bye";
    pub const MODIFY: &str = "telnyx_rtc.modify";
    pub const INFO: &str = "telnyx_rtc.info";
}

/// The `userVariables` object sent with a login.  Keys are snake_case on
/// the wire.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserVariables {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_device_token: Option<String>,
    pub push_notification_provider: String,
}

/// Body of a `login` request, either credential or token based.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LoginParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passwd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_token: Option<String>,
    #[serde(rename = "userVariables")]
    pub user_variables: UserVariables,
}

impl fmt::Debug for LoginParams {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LoginParams")
            .field("login", &self.login)
            .field("passwd", &self.passwd.as_ref().map(|_| "<redacted>"))
            .field("login_token", &self.login_token.as_ref().map(|_| "<redacted>"))
            .field("user_variables", &self.user_variables)
            .finish()
    }
}

/// Dialog bookkeeping attached to call-scoped requests.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DialogParams {
    #[serde(rename = "callID")]
    pub call_id: CallId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_id_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_id_number: Option<String>,
    /// Opaque host state, base64.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_number: Option<String>,
}

impl DialogParams {
    pub fn for_call(call_id: CallId) -> Self {
        Self {
            call_id,
            caller_id_name: None,
            caller_id_number: None,
            client_state: None,
            destination_number: None,
        }
    }
}

/// Body of an `invite` or `answer` request: the local SDP plus dialog data.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CallParams {
    pub sessid: String,
    pub sdp: String,
    #[serde(rename = "dialogParams")]
    pub dialog_params: DialogParams,
}

impl fmt::Debug for CallParams {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CallParams")
            .field("sessid", &self.sessid)
            .field("sdp", &redact_sdp(&self.sdp))
            .field("dialog_params", &self.dialog_params)
            .finish()
    }
}

/// Body of a locally initiated `bye`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ByeParams {
    pub sessid: String,
    #[serde(rename = "causeCode")]
    pub cause_code: i32,
    #[serde(rename = "causeName")]
    pub cause_name: String,
    #[serde(rename = "dialogParams")]
    pub dialog_params: DialogParams,
}

impl ByeParams {
    pub fn user_busy(sessid: String, call_id: CallId) -> Self {
        Self {
            sessid,
            cause_code: USER_BUSY_CAUSE_CODE,
            cause_name: USER_BUSY_CAUSE.to_string(),
            dialog_params: DialogParams::for_call(call_id),
        }
    }
}

/// Body of a `modify` request (hold / unhold).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ModifyParams {
    pub sessid: String,
    pub action: String,
    #[serde(rename = "dialogParams")]
    pub dialog_params: DialogParams,
}

/// Body of an `info` request (DTMF).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InfoParams {
    pub sessid: String,
    pub dtmf: String,
    #[serde(rename = "dialogParams")]
    pub dialog_params: DialogParams,
}

/// Body of a `gatewayState` poll.  `state` is serialized as an explicit
/// null, which the remote answers with the current registration state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct StateParams {
    pub state: Option<String>,
}

/// Every request body this client can put on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    Login(LoginParams),
    Invite(CallParams),
    Answer(CallParams),
    Bye(ByeParams),
    Modify(ModifyParams),
    Info(InfoParams),
    GatewayState(StateParams),
}

impl OutboundMessage {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Login(_) => method::LOGIN,
            Self::Invite(_) => method::INVITE,
            Self::Answer(_) => method::ANSWER,
            Self::Bye(_) => method::BYE,
            Self::Modify(_) => method::MODIFY,
            Self::Info(_) => method::INFO,
            Self::GatewayState(_) => method::GATEWAY_STATE,
        }
    }

    fn params(&self) -> Result<Value> {
        let value = match self {
            Self::Login(p) => serde_json::to_value(p)?,
            Self::Invite(p) | Self::Answer(p) => serde_json::to_value(p)?,
            Self::Bye(p) => serde_json::to_value(p)?,
            Self::Modify(p) => serde_json::to_value(p)?,
            Self::Info(p) => serde_json::to_value(p)?,
            Self::GatewayState(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }
}

impl fmt::Display for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({})", self.method())
    }
}

#[derive(Serialize)]
struct RequestEnvelope<'a> {
    jsonrpc: &'static str,
    id: &'a str,
    method: &'static str,
    params: Value,
}

/// Encodes a request body into the text frame put on the wire.
pub fn encode_request(id: &str, message: &OutboundMessage) -> Result<String> {
    let envelope = RequestEnvelope {
        jsonrpc: JSONRPC_VERSION,
        id,
        method: message.method(),
        params: message.params()?,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Inbound `invite` (a remote offer).  The caller id and Telnyx
/// correlation ids are snake_case on the wire.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct InviteParams {
    #[serde(rename = "callID")]
    pub call_id: CallId,
    pub sdp: String,
    #[serde(default)]
    pub caller_id_name: Option<String>,
    #[serde(default)]
    pub caller_id_number: Option<String>,
    #[serde(default)]
    pub telnyx_session_id: Option<String>,
    #[serde(default)]
    pub telnyx_leg_id: Option<String>,
}

impl fmt::Debug for InviteParams {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InviteParams")
            .field("call_id", &self.call_id)
            .field("sdp", &redact_sdp(&self.sdp))
            .field("caller_id_name", &self.caller_id_name)
            .field("caller_id_number", &self.caller_id_number)
            .finish()
    }
}

/// Inbound `answer`.  The `sdp` may be absent when early media already
/// delivered one.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AnswerParams {
    #[serde(rename = "callID")]
    pub call_id: CallId,
    #[serde(default)]
    pub sdp: Option<String>,
}

/// Inbound `media` (early media SDP before the answer).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MediaParams {
    #[serde(rename = "callID")]
    pub call_id: CallId,
    #[serde(default)]
    pub sdp: Option<String>,
}

/// Inbound `ringing`, carrying the remote's correlation ids.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RingingParams {
    #[serde(rename = "callID")]
    pub call_id: CallId,
    #[serde(default)]
    pub telnyx_session_id: Option<String>,
    #[serde(default)]
    pub telnyx_leg_id: Option<String>,
}

/// Inbound `bye`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ByeReceivedParams {
    #[serde(rename = "callID")]
    pub call_id: CallId,
    #[serde(default)]
    pub cause: Option<String>,
    #[serde(default, rename = "causeCode")]
    pub cause_code: Option<i32>,
}

/// Every inbound frame, classified.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    /// A response carrying `result.sessid` -- the login acknowledgment.
    LoginResult { id: Option<String>, sessid: String },
    /// Gateway registration state.  `state` is left raw; unknown values
    /// keep the polling loop alive.
    GatewayState {
        sessid: Option<String>,
        state: String,
    },
    ClientReady,
    Invite(InviteParams),
    Answer(AnswerParams),
    Media(MediaParams),
    Ringing(RingingParams),
    Bye(ByeReceivedParams),
    /// Envelope with a top-level `error`.
    RemoteError {
        code: Option<i64>,
        message: String,
    },
    /// A method this client does not handle; logged and dropped.
    Unhandled { method: String },
}

impl InboundMessage {
    /// The call this frame is scoped to, if any.
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            Self::Invite(p) => Some(p.call_id),
            Self::Answer(p) => Some(p.call_id),
            Self::Media(p) => Some(p.call_id),
            Self::Ringing(p) => Some(p.call_id),
            Self::Bye(p) => Some(p.call_id),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RemoteErrorBody>,
}

#[derive(Deserialize)]
struct RemoteErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Decodes and classifies one inbound text frame.
///
/// Parse failures are reported as [`VertoError::MalformedFrame`]; the
/// caller logs and drops the frame without touching the connection.
pub fn decode(frame: &str) -> Result<InboundMessage> {
    let envelope: Envelope = serde_json::from_str(frame)
        .map_err(|e| VertoError::MalformedFrame(e.to_string()))?;

    if let Some(error) = envelope.error {
        return Ok(InboundMessage::RemoteError {
            code: error.code,
            message: error.message.unwrap_or_else(|| "unknown error".to_string()),
        });
    }

    if let Some(method) = envelope.method.as_deref() {
        return classify_method(method, &envelope);
    }

    if let Some(result) = &envelope.result {
        if let Some(sessid) = result.get("sessid").and_then(Value::as_str) {
            return Ok(InboundMessage::LoginResult {
                id: envelope.id.as_ref().and_then(Value::as_str).map(str::to_string),
                sessid: sessid.to_string(),
            });
        }
        // A response we did not ask anything specific of; harmless.
        return Ok(InboundMessage::Unhandled {
            method: "(bare result)".to_string(),
        });
    }

    Err(VertoError::MalformedFrame("no method, result, or error".to_string()).into())
}

fn classify_method(method: &str, envelope: &Envelope) -> Result<InboundMessage> {
    match method {
        method::GATEWAY_STATE => decode_gateway_state(envelope),
        method::CLIENT_READY => Ok(InboundMessage::ClientReady),
        method::INVITE => Ok(InboundMessage::Invite(call_params(envelope)?)),
        method::ANSWER => Ok(InboundMessage::Answer(call_params(envelope)?)),
        method::MEDIA => Ok(InboundMessage::Media(call_params(envelope)?)),
        method::RINGING => Ok(InboundMessage::Ringing(call_params(envelope)?)),
        method::BYE => Ok(InboundMessage::Bye(call_params(envelope)?)),
        other => Ok(InboundMessage::Unhandled {
            method: other.to_string(),
        }),
    }
}

fn call_params<P: serde::de::DeserializeOwned>(envelope: &Envelope) -> Result<P> {
    let params = envelope
        .params
        .clone()
        .ok_or_else(|| VertoError::MalformedFrame("missing params".to_string()))?;
    serde_json::from_value(params).map_err(|e| VertoError::MalformedFrame(e.to_string()).into())
}

/// The gateway-state body arrives either as a notification
/// (`params.state`) or attached to a poll response
/// (`result.params.state` + `result.sessid`); accept both.
fn decode_gateway_state(envelope: &Envelope) -> Result<InboundMessage> {
    let (container, sessid) = match (&envelope.result, &envelope.params) {
        (Some(result), _) => (
            result.get("params"),
            result.get("sessid").and_then(Value::as_str),
        ),
        (None, Some(params)) => (
            Some(params),
            params.get("sessid").and_then(Value::as_str),
        ),
        (None, None) => (None, None),
    };

    let state = container
        .and_then(|v| v.get("state"))
        .and_then(Value::as_str)
        .ok_or_else(|| VertoError::MalformedFrame("gatewayState without state".to_string()))?;

    Ok(InboundMessage::GatewayState {
        sessid: sessid.map(str::to_string),
        state: state.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::CallId;

    fn round_trip(message: OutboundMessage) {
        let encoded = encode_request("11111111-2222-3333-4444-555555555555", &message);
        let encoded = encoded.unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["jsonrpc"], JSONRPC_VERSION);
        assert_eq!(value["method"], message.method());
        // Decoding the params back into the typed body must be lossless.
        match &message {
            OutboundMessage::Login(p) => {
                let back: LoginParams = serde_json::from_value(value["params"].clone()).unwrap();
                assert_eq!(&back, p);
            }
            OutboundMessage::Invite(p) | OutboundMessage::Answer(p) => {
                let back: CallParams = serde_json::from_value(value["params"].clone()).unwrap();
                assert_eq!(&back, p);
            }
            OutboundMessage::Bye(p) => {
                let back: ByeParams = serde_json::from_value(value["params"].clone()).unwrap();
                assert_eq!(&back, p);
            }
            OutboundMessage::Modify(p) => {
                let back: ModifyParams = serde_json::from_value(value["params"].clone()).unwrap();
                assert_eq!(&back, p);
            }
            OutboundMessage::Info(p) => {
                let back: InfoParams = serde_json::from_value(value["params"].clone()).unwrap();
                assert_eq!(&back, p);
            }
            OutboundMessage::GatewayState(p) => {
                let back: StateParams = serde_json::from_value(value["params"].clone()).unwrap();
                assert_eq!(&back, p);
            }
        }
    }

    #[test]
    fn round_trip_login() {
        round_trip(OutboundMessage::Login(LoginParams {
            login: Some("user".to_string()),
            passwd: Some("pass".to_string()),
            login_token: None,
            user_variables: UserVariables {
                push_device_token: Some("fcm-token".to_string()),
                push_notification_provider: "android".to_string(),
            },
        }));
    }

    #[test]
    fn round_trip_invite() {
        round_trip(OutboundMessage::Invite(CallParams {
            sessid: "S1".to_string(),
            sdp: "v=0\r\n".to_string(),
            dialog_params: DialogParams {
                call_id: CallId::random(),
                caller_id_name: Some("Alice".to_string()),
                caller_id_number: Some("1000".to_string()),
                client_state: Some("c3RhdGVY".to_string()),
                destination_number: Some("2000".to_string()),
            },
        }));
    }

    #[test]
    fn round_trip_bye_modify_info_state() {
        let call_id = CallId::random();
        round_trip(OutboundMessage::Bye(ByeParams::user_busy(
            "S1".to_string(),
            call_id,
        )));
        round_trip(OutboundMessage::Modify(ModifyParams {
            sessid: "S1".to_string(),
            action: "hold".to_string(),
            dialog_params: DialogParams::for_call(call_id),
        }));
        round_trip(OutboundMessage::Info(InfoParams {
            sessid: "S1".to_string(),
            dtmf: "5".to_string(),
            dialog_params: DialogParams::for_call(call_id),
        }));
        round_trip(OutboundMessage::GatewayState(StateParams::default()));
    }

    #[test]
    fn gateway_state_poll_serializes_null_state() {
        let encoded =
            encode_request("id-1", &OutboundMessage::GatewayState(StateParams::default())).unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert!(value["params"]["state"].is_null());
    }

    #[test]
    fn bye_carries_user_busy_cause() {
        let params = ByeParams::user_busy("S1".to_string(), CallId::random());
        assert_eq!(params.cause_code, 17);
        assert_eq!(params.cause_name, "USER_BUSY");
    }

    #[test]
    fn decode_gateway_state_result_form() {
        let frame = r#"{"jsonrpc":"2.0","id":"1","method":"telnyx_rtc.gatewayState","result":{"sessid":"S1","params":{"state":"REGED"}}}"#;
        let message = decode(frame).unwrap();
        assert_eq!(
            message,
            InboundMessage::GatewayState {
                sessid: Some("S1".to_string()),
                state: "REGED".to_string(),
            }
        );
    }

    #[test]
    fn decode_gateway_state_notification_form() {
        let frame = r#"{"jsonrpc":"2.0","method":"telnyx_rtc.gatewayState","params":{"state":"TRYING"}}"#;
        let message = decode(frame).unwrap();
        assert_eq!(
            message,
            InboundMessage::GatewayState {
                sessid: None,
                state: "TRYING".to_string(),
            }
        );
    }

    #[test]
    fn decode_login_result() {
        let frame = r#"{"jsonrpc":"2.0","id":"abc","result":{"sessid":"S9"}}"#;
        let message = decode(frame).unwrap();
        assert_eq!(
            message,
            InboundMessage::LoginResult {
                id: Some("abc".to_string()),
                sessid: "S9".to_string(),
            }
        );
    }

    #[test]
    fn decode_invite() {
        let frame = r#"{"jsonrpc":"2.0","method":"telnyx_rtc.invite","params":{"callID":"01234567-89ab-cdef-0123-456789abcdef","sdp":"v=0","caller_id_name":"Bob","caller_id_number":"3000","telnyx_session_id":"ts","telnyx_leg_id":"tl"}}"#;
        match decode(frame).unwrap() {
            InboundMessage::Invite(params) => {
                assert_eq!(params.caller_id_name.as_deref(), Some("Bob"));
                assert_eq!(params.sdp, "v=0");
                assert_eq!(params.telnyx_leg_id.as_deref(), Some("tl"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn decode_answer_without_sdp() {
        let frame = r#"{"jsonrpc":"2.0","method":"telnyx_rtc.answer","params":{"callID":"01234567-89ab-cdef-0123-456789abcdef"}}"#;
        match decode(frame).unwrap() {
            InboundMessage::Answer(params) => assert!(params.sdp.is_none()),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn decode_top_level_error() {
        let frame = r#"{"jsonrpc":"2.0","id":"1","error":{"code":-32000,"message":"Authentication Required"}}"#;
        assert_eq!(
            decode(frame).unwrap(),
            InboundMessage::RemoteError {
                code: Some(-32000),
                message: "Authentication Required".to_string(),
            }
        );
    }

    #[test]
    fn decode_unknown_method_is_unhandled() {
        let frame = r#"{"jsonrpc":"2.0","method":"telnyx_rtc.punt","params":{}}"#;
        assert_eq!(
            decode(frame).unwrap(),
            InboundMessage::Unhandled {
                method: "telnyx_rtc.punt".to_string(),
            }
        );
    }

    #[test]
    fn decode_garbage_is_malformed() {
        assert!(decode("not json at all").is_err());
        assert!(decode("{}").is_err());
    }
}
