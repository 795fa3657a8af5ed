//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! The signaling session: one authenticated link to the gateway.
//!
//! All state mutation happens on the session's executor.  Public API
//! calls post jobs onto it; the transport's event sink re-posts inbound
//! frames onto it; timers are scheduled jobs on it.  Handlers therefore
//! never race each other and inbound frames for a call are applied in
//! arrival order.

use std::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use uuid::Uuid;

use crate::common::executor::{Executor, ScheduledTask};
use crate::common::state::StateLock;
use crate::common::{
    CallDirection, CallId, ClientEvent, CredentialConfig, GatewayState, LoginConfig, Result,
    ServerConfig, SessionTiming, TokenConfig,
};
use crate::core::call::Call;
use crate::core::platform::Platform;
use crate::core::registry::CallRegistry;
use crate::core::supervisor::ConnectionSupervisor;
use crate::core::util::redact_frame;
use crate::error::VertoError;
use crate::protocol::{
    self, InboundMessage, LoginParams, OutboundMessage, StateParams, UserVariables,
};
use crate::transport::{TransportEvent, TransportEventSink, TransportHandle};
use crate::webrtc::peer_connection::IceServers;

/// Posts an API request onto the session executor with error logging.
macro_rules! handle_api {
    (
        $s:ident,
        $f:expr
            $( , $a:expr)*
    ) => {{
        info!("API:{}():", stringify!($f));
        let session = $s.clone();
        $s.handle.executor.post(move || {
            if let Err(err) = $f(&session $( , $a)*) {
                error!("API {} failed: {}", stringify!($f), err);
            }
        });
    }};
}

/// The narrow, non-owning interface a [`Call`] keeps back to its session:
/// send a frame, reach platform media controls, leave the registry.
/// Cloning shares the same underlying session.
pub struct SessionHandle<T>
where
    T: Platform,
{
    pub(crate) platform: Arc<StateLock<T>>,
    pub(crate) executor: Executor,
    /// The swap point for the current socket; reconnect replaces the
    /// transport behind it and live calls keep sending.
    pub(crate) transport: TransportHandle,
    pub(crate) calls: CallRegistry<T>,
    pub(crate) session_id: Arc<StateLock<Option<String>>>,
    pub(crate) saved_login: Arc<StateLock<Option<LoginConfig>>>,
    pub(crate) server_config: Arc<StateLock<ServerConfig>>,
    timing: SessionTiming,
}

impl<T> Clone for SessionHandle<T>
where
    T: Platform,
{
    fn clone(&self) -> Self {
        Self {
            platform: Arc::clone(&self.platform),
            executor: self.executor.clone(),
            transport: self.transport.clone(),
            calls: self.calls.clone(),
            session_id: Arc::clone(&self.session_id),
            saved_login: Arc::clone(&self.saved_login),
            server_config: Arc::clone(&self.server_config),
            timing: self.timing,
        }
    }
}

impl<T> SessionHandle<T>
where
    T: Platform,
{
    pub fn timing(&self) -> SessionTiming {
        self.timing
    }

    /// The remote-assigned session id, required on every call-scoped
    /// request.
    pub fn session_id(&self) -> Result<String> {
        self.session_id
            .lock()
            .clone()
            .ok_or_else(|| VertoError::SessionNotReady.into())
    }

    /// Encodes a request with a fresh id and puts it on the wire.
    /// Returns the request id for response correlation.
    pub fn send_request(&self, message: OutboundMessage) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let frame = protocol::encode_request(&id, &message)?;
        info!("session: sending {}", message);
        debug!("session: frame: {}", redact_frame(&frame));
        self.transport.send(frame);
        Ok(id)
    }

    /// Notify the client application about an event.
    pub fn notify(&self, event: ClientEvent) {
        info!("session: event: {}", event);
        if let Err(e) = self.platform.lock().on_event(event) {
            error!("session: platform event sink failed: {}", e);
        }
    }

    pub fn create_peer_connection(&self) -> Result<T::AppPeerConnection> {
        let ice_servers = {
            let config = self.server_config.lock();
            IceServers {
                turn_url: config.turn.clone(),
                stun_url: config.stun.clone(),
            }
        };
        self.platform.lock().create_peer_connection(ice_servers)
    }

    pub fn remove_call(&self, call_id: CallId) {
        self.calls.remove(call_id);
    }

    /// Runs `task` on the session executor after `delay`.  The returned
    /// handle cancels the task.
    pub fn schedule(&self, delay: Duration, task: impl FnOnce() + Send + 'static) -> ScheduledTask {
        self.executor.schedule(delay, task)
    }

    pub fn play_ringtone(&self) {
        let media = self.login_media(|c| c.ringtone().map(str::to_string));
        if let Err(e) = self.platform.lock().play_ringtone(media.as_deref()) {
            warn!("session: ringtone failed: {}", e);
        }
    }

    pub fn play_ringback(&self) {
        let media = self.login_media(|c| c.ringback_tone().map(str::to_string));
        if let Err(e) = self.platform.lock().play_ringback(media.as_deref()) {
            warn!("session: ringback failed: {}", e);
        }
    }

    pub fn stop_media(&self) {
        if let Err(e) = self.platform.lock().stop_media() {
            warn!("session: stop media failed: {}", e);
        }
    }

    pub fn set_microphone_mute(&self, mute: bool) {
        if let Err(e) = self.platform.lock().set_microphone_mute(mute) {
            warn!("session: microphone mute failed: {}", e);
        }
    }

    pub fn set_loudspeaker(&self, enabled: bool) {
        if let Err(e) = self.platform.lock().set_loudspeaker(enabled) {
            warn!("session: loudspeaker failed: {}", e);
        }
    }

    fn login_media(&self, select: impl Fn(&LoginConfig) -> Option<String>) -> Option<String> {
        self.saved_login.lock().as_ref().and_then(select)
    }
}

/// One signaling session with the gateway.  Cheap to clone; clones share
/// state.
pub struct Session<T>
where
    T: Platform,
{
    pub(crate) handle: SessionHandle<T>,
    pub(crate) gateway_state: Arc<StateLock<GatewayState>>,
    pub(crate) logged_in: Arc<AtomicBool>,
    /// True from connect until the first terminal gateway state.
    pub(crate) waiting_for_reg: Arc<AtomicBool>,
    reg_retry_counter: Arc<StateLock<u32>>,
    /// The in-flight gateway poll timer.  Replaced on re-poll and
    /// cancelled on `Reged`/`Noreg`, so at most one is ever live.
    reg_timer: Arc<StateLock<Option<ScheduledTask>>>,
    pending_login_id: Arc<StateLock<Option<String>>>,
    /// Events from older transports are discarded by generation.
    transport_generation: Arc<StateLock<u64>>,
    pub(crate) supervisor: ConnectionSupervisor,
}

impl<T> Clone for Session<T>
where
    T: Platform,
{
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            gateway_state: Arc::clone(&self.gateway_state),
            logged_in: Arc::clone(&self.logged_in),
            waiting_for_reg: Arc::clone(&self.waiting_for_reg),
            reg_retry_counter: Arc::clone(&self.reg_retry_counter),
            reg_timer: Arc::clone(&self.reg_timer),
            pending_login_id: Arc::clone(&self.pending_login_id),
            transport_generation: Arc::clone(&self.transport_generation),
            supervisor: self.supervisor.clone(),
        }
    }
}

impl<T> fmt::Display for Session<T>
where
    T: Platform,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "session_id: {:?}, logged_in: {}, ongoing_call: {}",
            self.session_id(),
            self.is_logged_in(),
            self.ongoing_call()
        )
    }
}

impl<T> fmt::Debug for Session<T>
where
    T: Platform,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl<T> Session<T>
where
    T: Platform,
{
    pub fn new(platform: T) -> Self {
        Self::with_timing(platform, SessionTiming::default())
    }

    pub fn with_timing(platform: T, timing: SessionTiming) -> Self {
        Self {
            handle: SessionHandle {
                platform: Arc::new(StateLock::new(platform, "platform")),
                executor: Executor::new("signaling"),
                transport: TransportHandle::new(),
                calls: CallRegistry::new(),
                session_id: Arc::new(StateLock::new(None, "session_id")),
                saved_login: Arc::new(StateLock::new(None, "saved_login")),
                server_config: Arc::new(StateLock::new(ServerConfig::default(), "server_config")),
                timing,
            },
            gateway_state: Arc::new(StateLock::new(GatewayState::Idle, "gateway_state")),
            logged_in: Arc::new(AtomicBool::new(false)),
            waiting_for_reg: Arc::new(AtomicBool::new(false)),
            reg_retry_counter: Arc::new(StateLock::new(0, "reg_retry_counter")),
            reg_timer: Arc::new(StateLock::new(None, "reg_timer")),
            pending_login_id: Arc::new(StateLock::new(None, "pending_login_id")),
            transport_generation: Arc::new(StateLock::new(0, "transport_generation")),
            supervisor: ConnectionSupervisor::new(),
        }
    }

    // --- accessors ---

    pub fn session_id(&self) -> Option<String> {
        self.handle.session_id.lock().clone()
    }

    pub fn gateway_state(&self) -> GatewayState {
        *self.gateway_state.lock()
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.handle.transport.is_connected()
    }

    pub fn ongoing_call(&self) -> bool {
        self.handle.calls.ongoing_call()
    }

    pub fn call(&self, call_id: CallId) -> Option<Call<T>> {
        self.handle.calls.get(call_id)
    }

    pub fn call_count(&self) -> usize {
        self.handle.calls.len()
    }

    /// Blocks until every job posted before this call has run.
    pub fn synchronize(&self) {
        self.handle.executor.synchronize();
    }

    /// Stops the session executor.  The session is unusable afterwards.
    pub fn close(&self) {
        info!("session: close()");
        if let Some(transport) = self.handle.transport.take() {
            transport.destroy();
        }
        self.handle.executor.shutdown();
    }

    // --- connecting and logging in ---

    pub fn connect(&self, config: ServerConfig) {
        handle_api!(self, Self::connect_internal, config);
    }

    pub fn credential_login(&self, config: CredentialConfig) {
        log::set_max_level(config.log_level.to_level_filter());
        handle_api!(self, Self::login_internal, LoginConfig::Credential(config));
    }

    pub fn token_login(&self, config: TokenConfig) {
        log::set_max_level(config.log_level.to_level_filter());
        handle_api!(self, Self::login_internal, LoginConfig::Token(config));
    }

    pub fn disconnect(&self) {
        handle_api!(self, Self::disconnect_internal);
        // Make teardown observable once we return.
        self.handle.executor.synchronize();
    }

    fn connect_internal(&self, config: ServerConfig) -> Result<()> {
        *self.handle.server_config.lock() = config;
        self.register_network_observer()?;

        if !self.handle.platform.lock().network_is_reachable() {
            info!("session: network unreachable, not opening a socket");
            self.handle
                .notify(ClientEvent::Error(VertoError::NetworkUnavailable.to_string()));
            return Ok(());
        }

        self.reset_registration_cycle();

        self.open_transport()
    }

    fn login_internal(&self, config: LoginConfig) -> Result<()> {
        *self.handle.saved_login.lock() = Some(config);
        // If the socket is not open yet the frame is dropped and the
        // supervisor replays the login after reconnect.
        self.send_login()
    }

    /// Allocates a fresh transport under a new generation and installs it
    /// behind the handle.  Used by connect and by the reconnect path.
    pub(crate) fn open_transport(&self) -> Result<()> {
        let generation = {
            let mut current = self.transport_generation.lock();
            *current += 1;
            *current
        };

        let session = self.clone();
        let sink: TransportEventSink = Arc::new(move |event| {
            let session = session.clone();
            let executor = session.handle.executor.clone();
            executor.post(move || {
                if let Err(e) = session.handle_transport_event(generation, event) {
                    error!("session: transport event failed: {}", e);
                }
            });
        });

        let config = self.handle.server_config.lock().clone();
        let transport = self.handle.platform.lock().create_transport(&config, sink)?;
        if let Some(old) = self.handle.transport.install(transport) {
            old.destroy();
        }
        Ok(())
    }

    pub(crate) fn send_login(&self) -> Result<()> {
        let config = self
            .handle
            .saved_login
            .lock()
            .clone()
            .ok_or(VertoError::SessionNotReady)?;

        let user_variables = UserVariables {
            push_device_token: config.fcm_token().map(str::to_string),
            push_notification_provider: self
                .handle
                .platform
                .lock()
                .push_notification_provider()
                .to_string(),
        };
        let params = match &config {
            LoginConfig::Credential(c) => LoginParams {
                login: Some(c.sip_user.clone()),
                passwd: Some(c.sip_password.clone()),
                login_token: None,
                user_variables,
            },
            LoginConfig::Token(c) => LoginParams {
                login: None,
                passwd: None,
                login_token: Some(c.sip_token.clone()),
                user_variables,
            },
        };

        let id = self.handle.send_request(OutboundMessage::Login(params))?;
        *self.pending_login_id.lock() = Some(id);
        Ok(())
    }

    fn disconnect_internal(&self) -> Result<()> {
        info!("session: disconnecting");

        // Every live call gets an implicit hangup, off a snapshot since
        // teardown mutates the registry.
        for call in self.handle.calls.snapshot() {
            if let Err(e) = call.hangup() {
                warn!("session: hangup of {} failed: {}", call.call_id(), e);
            }
        }

        self.unregister_network_observer();
        self.cancel_gateway_timer();
        {
            let mut generation = self.transport_generation.lock();
            *generation += 1;
        }
        if let Some(transport) = self.handle.transport.take() {
            transport.destroy();
        }

        *self.handle.session_id.lock() = None;
        *self.handle.saved_login.lock() = None;
        *self.pending_login_id.lock() = None;
        *self.gateway_state.lock() = GatewayState::Idle;
        self.logged_in.store(false, Ordering::Release);
        self.waiting_for_reg.store(false, Ordering::Release);
        *self.reg_retry_counter.lock() = 0;
        self.supervisor.reset();
        Ok(())
    }

    // --- transport events and frame dispatch ---

    fn handle_transport_event(&self, generation: u64, event: TransportEvent) -> Result<()> {
        if generation != *self.transport_generation.lock() {
            debug!("session: ignoring event from stale transport: {}", event);
            return Ok(());
        }
        match event {
            TransportEvent::Connected => {
                self.handle.notify(ClientEvent::ConnectionEstablished);
                if self.supervisor.take_login_replay() {
                    info!("session: replaying login after reconnect");
                    self.send_login()?;
                }
                Ok(())
            }
            TransportEvent::Frame(frame) => self.handle_frame(&frame),
            TransportEvent::Closed { error } => {
                self.logged_in.store(false, Ordering::Release);
                if let Some(error) = error {
                    warn!("session: socket closed with error: {}", error);
                    self.handle.notify(ClientEvent::Error(error));
                }
                Ok(())
            }
        }
    }

    fn handle_frame(&self, frame: &str) -> Result<()> {
        match protocol::decode(frame) {
            Ok(message) => self.dispatch(message),
            Err(e) => {
                // Parse failures never disconnect; log and drop.
                warn!("session: dropping frame: {}", e);
                Ok(())
            }
        }
    }

    fn dispatch(&self, message: InboundMessage) -> Result<()> {
        match message {
            InboundMessage::LoginResult { id, sessid } => self.on_session_id_received(id, sessid),
            InboundMessage::GatewayState { sessid, state } => {
                self.on_gateway_state_received(sessid, &state)
            }
            InboundMessage::ClientReady => self.on_client_ready(),
            InboundMessage::Invite(params) => self.on_offer_received(params),
            InboundMessage::Answer(params) => {
                self.with_call(params.call_id, |call| call.handle_answer(params.clone()))
            }
            InboundMessage::Media(params) => {
                self.with_call(params.call_id, |call| call.handle_media(params.clone()))
            }
            InboundMessage::Ringing(params) => {
                self.with_call(params.call_id, |call| call.handle_ringing(params.clone()))
            }
            InboundMessage::Bye(params) => {
                self.with_call(params.call_id, |call| call.handle_remote_bye())
            }
            InboundMessage::RemoteError { code, message } => {
                warn!("session: remote error (code {:?}): {}", code, message);
                self.handle.notify(ClientEvent::Error(message));
                Ok(())
            }
            InboundMessage::Unhandled { method } => {
                debug!("session: ignoring frame with method: {}", method);
                Ok(())
            }
        }
    }

    /// Routes a call-scoped frame; a frame for an unknown call is dropped
    /// with a log.
    fn with_call(
        &self,
        call_id: CallId,
        f: impl FnOnce(&Call<T>) -> Result<()>,
    ) -> Result<()> {
        match self.handle.calls.get(call_id) {
            Some(call) => f(&call),
            None => {
                warn!("session: {}", VertoError::UnknownCall(call_id));
                Ok(())
            }
        }
    }

    // --- login and gateway registration ---

    fn on_session_id_received(&self, id: Option<String>, sessid: String) -> Result<()> {
        let pending = self.pending_login_id.lock().take();
        if let (Some(pending), Some(id)) = (&pending, &id) {
            if pending != id {
                warn!("session: login result for unexpected request id, ignoring");
                return Ok(());
            }
        }
        info!("session: received session id");
        *self.handle.session_id.lock() = Some(sessid);
        Ok(())
    }

    fn on_gateway_state_received(&self, sessid: Option<String>, state: &str) -> Result<()> {
        let Some(state) = GatewayState::from_remote(state) else {
            warn!("session: unknown gateway state: {}", state);
            return Ok(());
        };
        info!("session: gateway state: {}", state);
        *self.gateway_state.lock() = state;

        match state {
            GatewayState::Reged => {
                self.cancel_gateway_timer();
                self.waiting_for_reg.store(false, Ordering::Release);
                let sessid = match sessid {
                    Some(sessid) => Some(sessid),
                    None => self.handle.session_id.lock().clone(),
                };
                match sessid {
                    Some(sessid) => self.on_login_successful(sessid),
                    None => {
                        warn!("session: registered but no session id is known");
                        Ok(())
                    }
                }
            }
            GatewayState::Noreg => {
                self.cancel_gateway_timer();
                self.waiting_for_reg.store(false, Ordering::Release);
                self.handle.notify(ClientEvent::Error(
                    VertoError::GatewayRegistrationTimeout.to_string(),
                ));
                Ok(())
            }
            // Intermediate state; the polling loop keeps running.
            _ => Ok(()),
        }
    }

    /// The remote may not have registered the SIP peer yet when the
    /// socket login succeeds; poll its state until `REGED` or the retry
    /// budget runs out.
    fn on_client_ready(&self) -> Result<()> {
        if *self.gateway_state.lock() != GatewayState::Reged
            && self.waiting_for_reg.load(Ordering::Acquire)
        {
            self.poll_gateway_state()?;
        }
        Ok(())
    }

    fn poll_gateway_state(&self) -> Result<()> {
        self.handle
            .send_request(OutboundMessage::GatewayState(StateParams::default()))?;
        self.start_gateway_timer();
        Ok(())
    }

    fn start_gateway_timer(&self) {
        let session = self.clone();
        let task = self
            .handle
            .schedule(self.handle.timing().gateway_poll_period, move || {
                if let Err(e) = session.gateway_timer_fired() {
                    error!("session: gateway timer failed: {}", e);
                }
            });
        // Exactly one poll timer may be in flight.
        if let Some(previous) = self.reg_timer.lock().replace(task) {
            previous.cancel();
        }
    }

    pub(crate) fn cancel_gateway_timer(&self) {
        if let Some(task) = self.reg_timer.lock().take() {
            task.cancel();
        }
    }

    /// Arms a fresh registration cycle: polling starts over with a zeroed
    /// retry budget and no timer in flight.
    pub(crate) fn reset_registration_cycle(&self) {
        self.waiting_for_reg.store(true, Ordering::Release);
        *self.reg_retry_counter.lock() = 0;
        self.cancel_gateway_timer();
    }

    fn gateway_timer_fired(&self) -> Result<()> {
        if !self.waiting_for_reg.load(Ordering::Acquire) {
            // Registration concluded while this expiry was in flight.
            return Ok(());
        }

        let retries = {
            let mut counter = self.reg_retry_counter.lock();
            if *counter < self.handle.timing().max_reg_retries {
                *counter += 1;
                Some(*counter)
            } else {
                None
            }
        };
        match retries {
            Some(attempt) => {
                info!("session: gateway registration retry {}", attempt);
                self.poll_gateway_state()
            }
            None => {
                self.waiting_for_reg.store(false, Ordering::Release);
                self.handle.notify(ClientEvent::Error(
                    VertoError::GatewayRegistrationTimeout.to_string(),
                ));
                Ok(())
            }
        }
    }

    fn on_login_successful(&self, sessid: String) -> Result<()> {
        info!("session: login successful");
        *self.handle.session_id.lock() = Some(sessid.clone());
        self.logged_in.store(true, Ordering::Release);
        // `Login` first, then `ClientReady`: subscribers key readiness
        // off the second event.
        self.handle.notify(ClientEvent::Login(sessid));
        self.handle.notify(ClientEvent::ClientReady);
        Ok(())
    }

    // --- calls ---

    /// Starts an outbound call.  Fails fast when no login has succeeded;
    /// a call may only exist once the session id is known.
    pub fn new_invite(
        &self,
        caller_id_name: &str,
        caller_id_number: &str,
        destination_number: &str,
        client_state: Option<&str>,
    ) -> Result<CallId> {
        if !self.is_logged_in() {
            self.handle
                .notify(ClientEvent::Error(VertoError::SessionNotReady.to_string()));
            return Err(VertoError::SessionNotReady.into());
        }
        let call_id = CallId::random();
        let caller_id_name = caller_id_name.to_string();
        let caller_id_number = caller_id_number.to_string();
        let destination_number = destination_number.to_string();
        let client_state = client_state.map(str::to_string);
        handle_api!(
            self,
            Self::start_outgoing_call,
            call_id,
            caller_id_name,
            caller_id_number,
            destination_number,
            client_state
        );
        Ok(call_id)
    }

    fn start_outgoing_call(
        &self,
        call_id: CallId,
        caller_id_name: String,
        caller_id_number: String,
        destination_number: String,
        client_state: Option<String>,
    ) -> Result<()> {
        let call = Call::new(self.handle.clone(), call_id, CallDirection::Outgoing);
        self.handle.calls.add(call.clone());
        if let Err(e) = call.start_outgoing(
            caller_id_name,
            caller_id_number,
            destination_number,
            client_state,
        ) {
            call.fail(format!("Call failed: {}", e));
            return Err(e);
        }
        Ok(())
    }

    fn on_offer_received(&self, params: protocol::InviteParams) -> Result<()> {
        if self.handle.session_id.lock().is_none() {
            warn!("session: offer before login, dropping");
            return Ok(());
        }
        if self.handle.calls.contains(params.call_id) {
            warn!("session: duplicate offer for {}, dropping", params.call_id);
            return Ok(());
        }
        let call = Call::new(self.handle.clone(), params.call_id, CallDirection::Incoming);
        self.handle.calls.add(call.clone());
        if let Err(e) = call.handle_offer(params) {
            call.fail(format!("Call failed: {}", e));
            return Err(e);
        }
        Ok(())
    }

    pub fn accept_call(&self, call_id: CallId) {
        handle_api!(self, Self::accept_call_internal, call_id);
    }

    fn accept_call_internal(&self, call_id: CallId) -> Result<()> {
        self.with_call(call_id, |call| call.accept())
    }

    pub fn end_call(&self, call_id: CallId) {
        handle_api!(self, Self::end_call_internal, call_id);
    }

    fn end_call_internal(&self, call_id: CallId) -> Result<()> {
        self.with_call(call_id, |call| call.hangup())
    }

    pub fn toggle_mute(&self, call_id: CallId) {
        handle_api!(self, Self::toggle_mute_internal, call_id);
    }

    fn toggle_mute_internal(&self, call_id: CallId) -> Result<()> {
        self.with_call(call_id, |call| call.toggle_mute())
    }

    pub fn toggle_hold(&self, call_id: CallId) {
        handle_api!(self, Self::toggle_hold_internal, call_id);
    }

    fn toggle_hold_internal(&self, call_id: CallId) -> Result<()> {
        self.with_call(call_id, |call| call.toggle_hold())
    }

    pub fn toggle_loudspeaker(&self, call_id: CallId) {
        handle_api!(self, Self::toggle_loudspeaker_internal, call_id);
    }

    fn toggle_loudspeaker_internal(&self, call_id: CallId) -> Result<()> {
        self.with_call(call_id, |call| call.toggle_loudspeaker())
    }

    pub fn send_dtmf(&self, call_id: CallId, tone: &str) {
        let tone = tone.to_string();
        handle_api!(self, Self::send_dtmf_internal, call_id, tone);
    }

    fn send_dtmf_internal(&self, call_id: CallId, tone: String) -> Result<()> {
        self.with_call(call_id, |call| call.send_dtmf(&tone))
    }
}
