//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Tests for connecting, logging in, gateway registration, and
//! connection supervision.

use std::time::Duration;

use vertortc::common::{ClientEvent, ClientEventKind, GatewayState, ServerConfig};
use vertortc::protocol::method;

#[macro_use]
mod common;
use common::{
    client_ready_frame, credential_config, error_frame, gateway_state_frame, login_result_frame,
    TestContext,
};

// Simple test that:
// -- creates a session
// -- shuts it down
#[test]
fn create_session() {
    let _ = TestContext::new();
}

// Reachability probe fails: the error is surfaced and no socket opens.
#[test]
fn connect_without_network() {
    let context = TestContext::new();
    context.platform().set_network_reachable(false);

    context.connect();

    assert_eq!(
        context.platform().error_messages(),
        vec!["No Network Connection".to_string()]
    );
    assert_eq!(context.platform().transport_count(), 0);
}

#[test]
fn connect_emits_connection_established() {
    let context = TestContext::new();
    context.connect();

    assert_eq!(context.platform().transport_count(), 1);
    assert!(context.session().is_connected());
    assert_eq!(context.event_count(ClientEventKind::ConnectionEstablished), 1);
}

// Login sends a credential frame with userVariables.
#[test]
fn login_frame_shape() {
    let context = TestContext::new();
    context.connect();

    let config = credential_config();
    let user = config.sip_user.clone();
    context.session().credential_login(config);
    context.synchronize();

    let logins = context.transport().sent_with_method(method::LOGIN);
    assert_eq!(logins.len(), 1);
    let params = &logins[0]["params"];
    assert_eq!(params["login"], user.as_str());
    assert_eq!(params["passwd"], "sekret");
    assert_eq!(params["userVariables"]["push_device_token"], "fcm-token");
    assert_eq!(params["userVariables"]["push_notification_provider"], "android");
    assert!(logins[0]["id"].is_string());
}

// The login result stores the session id, but readiness only comes with
// gateway registration.
#[test]
fn login_result_stores_session_id() {
    let context = TestContext::new();
    context.connect();
    context.session().credential_login(credential_config());
    context.synchronize();

    let login_id = context.transport().sent_with_method(method::LOGIN)[0]["id"]
        .as_str()
        .unwrap()
        .to_string();
    context
        .transport()
        .receive_frame(&login_result_frame(&login_id, "S7"));
    context.synchronize();

    assert_eq!(context.session().session_id().as_deref(), Some("S7"));
    assert!(!context.session().is_logged_in());
    assert_eq!(context.event_count(ClientEventKind::Login), 0);
}

// Gateway REGED: session id is stored, login succeeds, and the two
// readiness events arrive in order.
#[test]
fn gateway_reged() {
    let context = TestContext::new();
    context.connect_and_login("S1");

    let session = context.session();
    assert_eq!(session.session_id().as_deref(), Some("S1"));
    assert!(session.is_logged_in());
    assert_eq!(session.gateway_state(), GatewayState::Reged);

    let events = context.platform().events();
    let login_at = events
        .iter()
        .position(|e| *e == ClientEvent::Login("S1".to_string()))
        .expect("no Login event");
    let ready_at = events
        .iter()
        .position(|e| *e == ClientEvent::ClientReady)
        .expect("no ClientReady event");
    assert!(login_at < ready_at, "Login must precede ClientReady");
    assert_eq!(context.event_count(ClientEventKind::Login), 1);
    assert_eq!(context.event_count(ClientEventKind::ClientReady), 1);
    assert_eq!(context.error_count(), 0);

    // REGED cancelled the poll timer: no further state requests go out.
    context.wait(Duration::from_millis(150));
    assert_eq!(
        context
            .transport()
            .sent_with_method(method::GATEWAY_STATE)
            .len(),
        1
    );
}

// Gateway NOREG is terminal: timeout error, no login.
#[test]
fn gateway_noreg() {
    let context = TestContext::new();
    context.connect();
    context.session().credential_login(credential_config());
    context.synchronize();

    let transport = context.transport();
    transport.receive_frame(&client_ready_frame());
    transport.receive_frame(&gateway_state_frame("NOREG", Some("S1")));
    context.synchronize();

    assert!(!context.session().is_logged_in());
    assert_eq!(context.event_count(ClientEventKind::Login), 0);
    assert_eq!(
        context.platform().error_messages(),
        vec!["Gateway registration has timed out".to_string()]
    );
}

// Intermediate gateway states keep the polling loop alive.
#[test]
fn gateway_intermediate_state_keeps_polling() {
    let context = TestContext::new();
    context.connect();
    context.session().credential_login(credential_config());
    context.synchronize();

    let transport = context.transport();
    transport.receive_frame(&client_ready_frame());
    transport.receive_frame(&gateway_state_frame("TRYING", None));
    context.synchronize();

    assert_eq!(context.session().gateway_state(), GatewayState::Trying);
    assert_eq!(context.error_count(), 0);
    assert!(!context.session().is_logged_in());

    // The poll timer re-sends the state request.
    context.wait(Duration::from_millis(80));
    assert!(
        context
            .transport()
            .sent_with_method(method::GATEWAY_STATE)
            .len()
            >= 2
    );
}

// No gateway response at all: three polls (initial plus two retries),
// then the timeout error.
#[test]
fn gateway_timeout() {
    let context = TestContext::new();
    context.connect();
    context.session().credential_login(credential_config());
    context.synchronize();

    context.transport().receive_frame(&client_ready_frame());
    context.synchronize();
    assert_eq!(
        context
            .transport()
            .sent_with_method(method::GATEWAY_STATE)
            .len(),
        1
    );

    // Three poll periods plus margin: retries at ~50ms and ~100ms, the
    // timeout at ~150ms.
    context.wait(Duration::from_millis(400));

    assert_eq!(
        context
            .transport()
            .sent_with_method(method::GATEWAY_STATE)
            .len(),
        3
    );
    assert_eq!(
        context.platform().error_messages(),
        vec!["Gateway registration has timed out".to_string()]
    );
    assert!(!context.session().is_logged_in());

    // The budget is spent; nothing else fires.
    context.wait(Duration::from_millis(150));
    assert_eq!(context.error_count(), 1);
}

// A top-level error envelope is propagated verbatim.
#[test]
fn remote_error_is_propagated() {
    let context = TestContext::new();
    context.connect_and_login("S1");

    context
        .transport()
        .receive_frame(&error_frame("Authentication Required"));
    context.synchronize();

    assert_eq!(
        context.platform().error_messages(),
        vec!["Authentication Required".to_string()]
    );
}

// Garbage on the socket is dropped without disconnecting.
#[test]
fn malformed_frames_are_dropped() {
    let context = TestContext::new();
    context.connect();
    context.session().credential_login(credential_config());
    context.synchronize();

    let transport = context.transport();
    transport.receive_frame("this is not json");
    transport.receive_frame("{}");
    context.synchronize();

    assert_eq!(context.error_count(), 0);
    assert!(context.session().is_connected());

    // The link still works.
    transport.receive_frame(&client_ready_frame());
    transport.receive_frame(&gateway_state_frame("REGED", Some("S1")));
    context.synchronize();
    assert!(context.session().is_logged_in());
}

// Abnormal socket close surfaces one error and drops the logged-in flag.
#[test]
fn socket_error_notifies_once() {
    let context = TestContext::new();
    context.connect_and_login("S1");

    context.transport().close_with_error("connection reset");
    context.synchronize();

    assert!(!context.session().is_logged_in());
    assert_eq!(
        context.platform().error_messages(),
        vec!["connection reset".to_string()]
    );
}

// connect -> disconnect -> connect lands in the same observable state as
// a first connect.
#[test]
fn disconnect_then_reconnect_is_clean() {
    let context = TestContext::new();
    context.connect_and_login("S1");

    let session = context.session();
    session.disconnect();

    assert_eq!(session.session_id(), None);
    assert!(!session.is_logged_in());
    assert_eq!(session.gateway_state(), GatewayState::Idle);
    assert!(!session.ongoing_call());
    assert!(context.platform().nth_transport(0).is_destroyed());
    assert!(!context.platform().observer_registered());

    session.connect(ServerConfig::default());
    context.synchronize();

    assert_eq!(context.platform().transport_count(), 2);
    assert!(session.is_connected());
    assert!(!session.is_logged_in());
    assert_eq!(session.gateway_state(), GatewayState::Idle);
}

// Network loss marks the session reconnecting and surfaces one error,
// no matter how often the platform repeats itself.
#[test]
fn network_loss_is_reported_once() {
    let context = TestContext::new();
    context.connect_and_login("S1");

    let observer = context.platform().network_observer().expect(error_line!());
    observer.network_unavailable();
    observer.network_unavailable();
    context.synchronize();

    assert_eq!(
        context.platform().error_messages(),
        vec!["No Network Connection".to_string()]
    );
}

// Network recovery: fresh transport, old one destroyed, login replayed
// once the new socket reports Connected.
#[test]
fn reconnect_replays_login() {
    let context = TestContext::new();
    context.connect_and_login("S1");

    let observer = context.platform().network_observer().expect(error_line!());
    observer.network_unavailable();
    context.synchronize();

    observer.network_available();
    context.synchronize();
    context.synchronize();

    assert_eq!(context.platform().transport_count(), 2);
    assert!(context.platform().nth_transport(0).is_destroyed());

    let new_transport = context.platform().nth_transport(1);
    let logins = new_transport.sent_with_method(method::LOGIN);
    assert_eq!(logins.len(), 1, "login was not replayed");
    assert!(logins[0]["params"]["passwd"].is_string());

    // Registration completes on the new link.
    new_transport.receive_frame(&client_ready_frame());
    new_transport.receive_frame(&gateway_state_frame("REGED", Some("S2")));
    context.synchronize();
    assert!(context.session().is_logged_in());
    assert_eq!(context.session().session_id().as_deref(), Some("S2"));
}

// Network recovery with nothing to replay does not reconnect.
#[test]
fn recovery_without_login_is_a_no_op() {
    let context = TestContext::new();
    context.connect();

    let observer = context.platform().network_observer().expect(error_line!());
    observer.network_unavailable();
    observer.network_available();
    context.synchronize();
    context.synchronize();

    assert_eq!(context.platform().transport_count(), 1);
}
