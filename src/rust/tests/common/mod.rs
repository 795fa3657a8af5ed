//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Common test utilities

use std::env;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde_json::json;

use vertortc::common::{
    CallId, ClientEventKind, CredentialConfig, LogLevel, ServerConfig, SessionTiming,
};
use vertortc::core::session::Session;
use vertortc::sim::sim_platform::SimPlatform;
use vertortc::sim::transport::SimTransport;

macro_rules! error_line {
    () => {
        concat!(module_path!(), ":", line!())
    };
}

static PRNG: OnceLock<Mutex<ChaCha20Rng>> = OnceLock::new();

/// A freshly seeded PRNG shared by the tests; seed with RANDOM_SEED to
/// reproduce a failure.
pub fn prng_gen_u16() -> u16 {
    let prng = PRNG.get_or_init(|| {
        let seed = env::var("RANDOM_SEED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        println!("*** Using random seed: {}", seed);
        Mutex::new(ChaCha20Rng::seed_from_u64(seed))
    });
    prng.lock().unwrap().gen::<u16>()
}

pub fn test_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Timer periods short enough for tests to drive wall-clock scenarios.
pub fn test_timing() -> SessionTiming {
    SessionTiming {
        gateway_poll_period: Duration::from_millis(50),
        max_reg_retries: 2,
        ice_gather_delay: Duration::from_millis(20),
    }
}

pub struct TestContext {
    platform: SimPlatform,
    session: Session<SimPlatform>,
}

impl Drop for TestContext {
    fn drop(&mut self) {
        log::info!("test: dropping TestContext");
        self.session.close();
    }
}

impl TestContext {
    pub fn new() -> Self {
        test_init();
        let platform = SimPlatform::new();
        let session = Session::with_timing(platform.clone(), test_timing());
        Self { platform, session }
    }

    pub fn session(&self) -> Session<SimPlatform> {
        self.session.clone()
    }

    pub fn platform(&self) -> &SimPlatform {
        &self.platform
    }

    /// Flushes the session executor, twice: a task posted by the first
    /// flushed batch (a transport event, say) lands in the second.
    pub fn synchronize(&self) {
        self.session.synchronize();
        self.session.synchronize();
    }

    /// Lets delayed tasks come due, then flushes.
    pub fn wait(&self, duration: Duration) {
        std::thread::sleep(duration);
        self.synchronize();
    }

    pub fn connect(&self) {
        self.session.connect(ServerConfig::default());
        self.synchronize();
    }

    pub fn transport(&self) -> SimTransport {
        self.platform.transport()
    }

    /// Connect, log in, and complete gateway registration with
    /// session id `sessid`.
    pub fn connect_and_login(&self, sessid: &str) {
        self.connect();
        self.session.credential_login(credential_config());
        self.synchronize();
        let transport = self.transport();
        transport.receive_frame(&client_ready_frame());
        transport.receive_frame(&gateway_state_frame("REGED", Some(sessid)));
        self.synchronize();
        assert!(self.session.is_logged_in(), "login flow did not complete");
    }

    pub fn event_count(&self, kind: ClientEventKind) -> usize {
        self.platform.event_count(kind)
    }

    pub fn error_count(&self) -> usize {
        self.platform.error_count()
    }
}

pub fn credential_config() -> CredentialConfig {
    CredentialConfig {
        sip_user: format!("user-{}", prng_gen_u16()),
        sip_password: "sekret".to_string(),
        sip_caller_id_name: "Test Caller".to_string(),
        sip_caller_id_number: "1000".to_string(),
        fcm_token: Some("fcm-token".to_string()),
        ringtone: Some("ringtone.mp3".to_string()),
        ringback_tone: Some("ringback.mp3".to_string()),
        log_level: LogLevel::Info,
    }
}

// --- inbound frame builders ---

pub fn client_ready_frame() -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "telnyx_rtc.clientReady",
        "params": {}
    })
    .to_string()
}

pub fn gateway_state_frame(state: &str, sessid: Option<&str>) -> String {
    match sessid {
        Some(sessid) => json!({
            "jsonrpc": "2.0",
            "id": "1",
            "method": "telnyx_rtc.gatewayState",
            "result": { "sessid": sessid, "params": { "state": state } }
        })
        .to_string(),
        None => json!({
            "jsonrpc": "2.0",
            "method": "telnyx_rtc.gatewayState",
            "params": { "state": state }
        })
        .to_string(),
    }
}

pub fn login_result_frame(id: &str, sessid: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": { "sessid": sessid }
    })
    .to_string()
}

pub fn invite_frame(call_id: CallId, sdp: &str, name: &str, number: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "telnyx_rtc.invite",
        "params": {
            "callID": call_id.to_string(),
            "sdp": sdp,
            "caller_id_name": name,
            "caller_id_number": number,
            "telnyx_session_id": "remote-session",
            "telnyx_leg_id": "remote-leg"
        }
    })
    .to_string()
}

pub fn answer_frame(call_id: CallId, sdp: Option<&str>) -> String {
    let mut params = json!({ "callID": call_id.to_string() });
    if let Some(sdp) = sdp {
        params["sdp"] = json!(sdp);
    }
    json!({
        "jsonrpc": "2.0",
        "method": "telnyx_rtc.answer",
        "params": params
    })
    .to_string()
}

pub fn media_frame(call_id: CallId, sdp: Option<&str>) -> String {
    let mut params = json!({ "callID": call_id.to_string() });
    if let Some(sdp) = sdp {
        params["sdp"] = json!(sdp);
    }
    json!({
        "jsonrpc": "2.0",
        "method": "telnyx_rtc.media",
        "params": params
    })
    .to_string()
}

pub fn ringing_frame(call_id: CallId) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "telnyx_rtc.ringing",
        "params": {
            "callID": call_id.to_string(),
            "telnyx_session_id": "remote-session",
            "telnyx_leg_id": "remote-leg"
        }
    })
    .to_string()
}

pub fn bye_frame(call_id: CallId) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "telnyx_rtc.bye",
        "params": { "callID": call_id.to_string(), "cause": "NORMAL_CLEARING", "causeCode": 16 }
    })
    .to_string()
}

pub fn error_frame(message: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": "1",
        "error": { "code": -32000, "message": message }
    })
    .to_string()
}
