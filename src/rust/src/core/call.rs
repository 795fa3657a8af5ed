//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! A single voice call and its lifecycle state machine.
//!
//! ```text
//! NEW ──(new_invite / offer received)──► RINGING
//! RINGING ──(accept / answer w/ sdp)──► ACTIVE
//! RINGING ──(media w/ sdp)──► CONNECTING (early_sdp = true)
//! CONNECTING ──(answer)──► ACTIVE | CONNECTING
//! ACTIVE ◄──(hold / unhold)──► HELD
//! any ──(bye / hangup / fatal SDP)──► DONE
//! ```
//!
//! A call never owns the session; it reaches the socket, the registry,
//! and platform media controls through a narrow [`SessionHandle`], so a
//! reconnect can swap the socket without touching live calls.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::common::executor::ScheduledTask;
use crate::common::state::StateLock;
use crate::common::{CallDirection, CallId, CallState, ClientEvent, Result};
use crate::core::platform::Platform;
use crate::core::session::SessionHandle;
use crate::error::VertoError;
use crate::protocol::{
    AnswerParams, ByeParams, CallParams, DialogParams, InfoParams, InviteParams, MediaParams,
    ModifyParams, OutboundMessage, RingingParams,
};
use crate::webrtc::peer_connection::{PeerConnection, SessionDescription};

/// Togglable per-call options, reset on teardown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub muted: bool,
    pub on_hold: bool,
    pub loudspeaker: bool,
    pub early_sdp: bool,
}

pub struct Call<T>
where
    T: Platform,
{
    /// Unique id of the dialog; the routing key for inbound frames.
    call_id: CallId,
    direction: CallDirection,
    /// Narrow, non-owning interface back to the session.
    session: SessionHandle<T>,
    state: Arc<StateLock<CallState>>,
    peer_connection: Arc<StateLock<Option<T::AppPeerConnection>>>,
    /// The delayed invite send, retired on teardown so a hangup during
    /// ICE gathering never puts an invite on the wire.
    invite_timer: Arc<StateLock<Option<ScheduledTask>>>,
    /// Correlation ids assigned by the remote, for its logs.
    telnyx_session_id: Arc<StateLock<Option<String>>>,
    telnyx_leg_id: Arc<StateLock<Option<String>>>,
    options: Arc<StateLock<CallOptions>>,
}

impl<T> Clone for Call<T>
where
    T: Platform,
{
    fn clone(&self) -> Self {
        Self {
            call_id: self.call_id,
            direction: self.direction,
            session: self.session.clone(),
            state: Arc::clone(&self.state),
            peer_connection: Arc::clone(&self.peer_connection),
            invite_timer: Arc::clone(&self.invite_timer),
            telnyx_session_id: Arc::clone(&self.telnyx_session_id),
            telnyx_leg_id: Arc::clone(&self.telnyx_leg_id),
            options: Arc::clone(&self.options),
        }
    }
}

impl<T> fmt::Display for Call<T>
where
    T: Platform,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "direction: {}, call_id: {}, state: {}",
            self.direction,
            self.call_id,
            self.state()
        )
    }
}

impl<T> fmt::Debug for Call<T>
where
    T: Platform,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl<T> Call<T>
where
    T: Platform,
{
    /// Creates a call in the `Ringing` state (posted for both directions;
    /// observers treat it as "call object exists and is being set up").
    pub fn new(session: SessionHandle<T>, call_id: CallId, direction: CallDirection) -> Self {
        info!("call {}: new {}", call_id, direction);
        Self {
            call_id,
            direction,
            session,
            state: Arc::new(StateLock::new(CallState::Ringing, "call_state")),
            peer_connection: Arc::new(StateLock::new(None, "peer_connection")),
            invite_timer: Arc::new(StateLock::new(None, "invite_timer")),
            telnyx_session_id: Arc::new(StateLock::new(None, "telnyx_session_id")),
            telnyx_leg_id: Arc::new(StateLock::new(None, "telnyx_leg_id")),
            options: Arc::new(StateLock::new(CallOptions::default(), "call_options")),
        }
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    pub fn state(&self) -> CallState {
        *self.state.lock()
    }

    pub fn options(&self) -> CallOptions {
        *self.options.lock()
    }

    pub fn telnyx_session_id(&self) -> Option<String> {
        self.telnyx_session_id.lock().clone()
    }

    pub fn telnyx_leg_id(&self) -> Option<String> {
        self.telnyx_leg_id.lock().clone()
    }

    fn set_state(&self, new_state: CallState) {
        let mut state = self.state.lock();
        if *state != new_state {
            info!("call {}: state {} -> {}", self.call_id, *state, new_state);
            *state = new_state;
        }
    }

    // --- outbound ---

    /// Builds the peer connection, starts capture and offer generation,
    /// and schedules the invite send once ICE gathering has had its
    /// configured head start.
    pub fn start_outgoing(
        &self,
        caller_id_name: String,
        caller_id_number: String,
        destination_number: String,
        client_state: Option<String>,
    ) -> Result<()> {
        let pc = self.session.create_peer_connection()?;
        pc.start_audio_capture()?;
        pc.create_offer()?;
        *self.peer_connection.lock() = Some(pc);

        self.session.play_ringback();

        let call = self.clone();
        let task = self
            .session
            .schedule(self.session.timing().ice_gather_delay, move || {
                if let Err(e) = call.send_invite(
                    &caller_id_name,
                    &caller_id_number,
                    &destination_number,
                    client_state.as_deref(),
                ) {
                    error!("call {}: sending invite failed: {}", call.call_id, e);
                    call.fail(format!("Call failed: {}", e));
                }
            });
        *self.invite_timer.lock() = Some(task);
        Ok(())
    }

    fn send_invite(
        &self,
        caller_id_name: &str,
        caller_id_number: &str,
        destination_number: &str,
        client_state: Option<&str>,
    ) -> Result<()> {
        let description = self.local_description()?;
        let params = CallParams {
            sessid: self.session.session_id()?,
            sdp: description.sdp,
            dialog_params: DialogParams {
                call_id: self.call_id,
                caller_id_name: Some(caller_id_name.to_string()),
                caller_id_number: Some(caller_id_number.to_string()),
                client_state: client_state.map(|s| BASE64.encode(s)),
                destination_number: Some(destination_number.to_string()),
            },
        };
        self.session.send_request(OutboundMessage::Invite(params))?;
        Ok(())
    }

    // --- inbound ---

    /// Applies a remote offer: builds the peer connection, prepares the
    /// local answer, and rings the host.
    pub fn handle_offer(&self, offer: InviteParams) -> Result<()> {
        *self.telnyx_session_id.lock() = offer.telnyx_session_id.clone();
        *self.telnyx_leg_id.lock() = offer.telnyx_leg_id.clone();

        let pc = self.session.create_peer_connection()?;
        pc.start_audio_capture()?;
        pc.set_remote_description(SessionDescription::offer(offer.sdp.clone()))?;
        pc.create_answer()?;
        *self.peer_connection.lock() = Some(pc);

        self.session.notify(ClientEvent::Invite {
            call_id: self.call_id,
            caller_id_name: offer.caller_id_name.unwrap_or_default(),
            caller_id_number: offer.caller_id_number.unwrap_or_default(),
            sdp: offer.sdp,
            telnyx_session_id: offer.telnyx_session_id,
        });
        self.session.play_ringtone();
        Ok(())
    }

    /// Answers an inbound call: puts the local SDP on the wire and goes
    /// active.
    pub fn accept(&self) -> Result<()> {
        let description = self.local_description()?;
        let params = CallParams {
            sessid: self.session.session_id()?,
            sdp: description.sdp,
            dialog_params: DialogParams::for_call(self.call_id),
        };
        self.session.send_request(OutboundMessage::Answer(params))?;
        self.session.stop_media();
        self.set_state(CallState::Active);
        Ok(())
    }

    /// Three-way branch on the remote answer: a fresh SDP goes active;
    /// no SDP rides on earlier early-media; neither ends the call.
    pub fn handle_answer(&self, answer: AnswerParams) -> Result<()> {
        let early_sdp = self.options().early_sdp;
        match answer.sdp {
            Some(sdp) => {
                self.set_remote_description(SessionDescription::answer(sdp.clone()))?;
                self.set_state(CallState::Active);
                self.session.stop_media();
                self.session.notify(ClientEvent::Answer {
                    call_id: self.call_id,
                    sdp,
                });
            }
            None if early_sdp => {
                self.set_state(CallState::Connecting);
                let description = self.local_description()?;
                self.session.notify(ClientEvent::Answer {
                    call_id: self.call_id,
                    sdp: description.sdp,
                });
            }
            None => {
                info!(
                    "call {}: answer carried no SDP and no early media arrived",
                    self.call_id
                );
                self.terminate();
            }
        }
        Ok(())
    }

    /// Early media: an SDP delivered before the answer.
    pub fn handle_media(&self, media: MediaParams) -> Result<()> {
        match media.sdp {
            Some(sdp) => {
                self.set_remote_description(SessionDescription::answer(sdp))?;
                self.options.lock().early_sdp = true;
                self.set_state(CallState::Connecting);
                self.session.notify(ClientEvent::Media {
                    call_id: self.call_id,
                });
            }
            None => {
                self.fail("Media received without SDP".to_string());
            }
        }
        Ok(())
    }

    pub fn handle_ringing(&self, ringing: RingingParams) -> Result<()> {
        *self.telnyx_session_id.lock() = ringing.telnyx_session_id;
        *self.telnyx_leg_id.lock() = ringing.telnyx_leg_id;
        self.session.notify(ClientEvent::Ringing {
            call_id: self.call_id,
        });
        Ok(())
    }

    /// The remote hung up.
    pub fn handle_remote_bye(&self) -> Result<()> {
        self.session.notify(ClientEvent::Bye {
            call_id: self.call_id,
        });
        self.terminate();
        Ok(())
    }

    /// Locally initiated hangup: a `bye` frame (USER_BUSY) plus the same
    /// teardown the remote path runs.
    pub fn hangup(&self) -> Result<()> {
        if self.state() == CallState::Done {
            return Ok(());
        }
        match self.session.session_id() {
            Ok(sessid) => {
                let params = ByeParams::user_busy(sessid, self.call_id);
                if let Err(e) = self.session.send_request(OutboundMessage::Bye(params)) {
                    warn!("call {}: bye not sent: {}", self.call_id, e);
                }
            }
            Err(_) => warn!("call {}: no session id, skipping bye frame", self.call_id),
        }
        self.terminate();
        Ok(())
    }

    // --- mid-call controls ---

    pub fn toggle_mute(&self) -> Result<()> {
        let muted = {
            let mut options = self.options.lock();
            options.muted = !options.muted;
            options.muted
        };
        info!("call {}: muted: {}", self.call_id, muted);
        self.session.set_microphone_mute(muted);
        let pc = self.peer_connection.lock();
        if let Some(pc) = pc.as_ref() {
            pc.set_outgoing_audio_enabled(!muted)?;
        }
        Ok(())
    }

    pub fn toggle_loudspeaker(&self) -> Result<()> {
        let enabled = {
            let mut options = self.options.lock();
            options.loudspeaker = !options.loudspeaker;
            options.loudspeaker
        };
        info!("call {}: loudspeaker: {}", self.call_id, enabled);
        self.session.set_loudspeaker(enabled);
        Ok(())
    }

    pub fn toggle_hold(&self) -> Result<()> {
        let on_hold = {
            let mut options = self.options.lock();
            options.on_hold = !options.on_hold;
            options.on_hold
        };
        let (new_state, action) = if on_hold {
            (CallState::Held, "hold")
        } else {
            (CallState::Active, "unhold")
        };
        self.set_state(new_state);
        let params = ModifyParams {
            sessid: self.session.session_id()?,
            action: action.to_string(),
            dialog_params: DialogParams::for_call(self.call_id),
        };
        self.session.send_request(OutboundMessage::Modify(params))?;
        Ok(())
    }

    /// Sends one DTMF tone.  Tones outside 0-9, A-D, `*`, `#` never
    /// reach the wire.
    pub fn send_dtmf(&self, tone: &str) -> Result<()> {
        if !is_valid_dtmf(tone) {
            debug!("call {}: ignoring invalid DTMF tone", self.call_id);
            return Ok(());
        }
        let params = InfoParams {
            sessid: self.session.session_id()?,
            dtmf: tone.to_string(),
            dialog_params: DialogParams::for_call(self.call_id),
        };
        self.session.send_request(OutboundMessage::Info(params))?;
        Ok(())
    }

    // --- teardown ---

    /// Terminal transition.  Safe to call more than once; everything
    /// after the first call is a no-op.
    fn terminate(&self) {
        {
            let mut state = self.state.lock();
            if *state == CallState::Done {
                return;
            }
            info!("call {}: state {} -> {}", self.call_id, *state, CallState::Done);
            *state = CallState::Done;
        }

        if let Some(task) = self.invite_timer.lock().take() {
            task.cancel();
        }

        self.session.stop_media();

        let options = std::mem::take(&mut *self.options.lock());
        // Undo any platform audio routing this call changed.
        if options.muted {
            self.session.set_microphone_mute(false);
        }
        if options.loudspeaker {
            self.session.set_loudspeaker(false);
        }

        if let Some(pc) = self.peer_connection.lock().take() {
            pc.close();
        }
        self.session.remove_call(self.call_id);
    }

    /// Fatal failure: surface the error, then tear down.
    pub(crate) fn fail(&self, message: String) {
        self.session.notify(ClientEvent::Error(message));
        self.terminate();
    }

    fn local_description(&self) -> Result<SessionDescription> {
        self.peer_connection
            .lock()
            .as_ref()
            .and_then(|pc| pc.local_description())
            .ok_or_else(|| VertoError::LocalDescriptionUnavailable.into())
    }

    fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        let pc = self.peer_connection.lock();
        match pc.as_ref() {
            Some(pc) => pc.set_remote_description(description),
            None => Err(VertoError::OptionValueNotSet(
                "set_remote_description".to_string(),
                "peer_connection".to_string(),
            )
            .into()),
        }
    }
}

fn is_valid_dtmf(tone: &str) -> bool {
    !tone.is_empty()
        && tone
            .chars()
            .all(|c| matches!(c, '0'..='9' | 'A'..='D' | 'a'..='d' | '*' | '#'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtmf_tone_validation() {
        for tone in ["0", "9", "A", "d", "*", "#", "123#"] {
            assert!(is_valid_dtmf(tone), "{} should be valid", tone);
        }
        for tone in ["", "E", "x", "1 2", "+"] {
            assert!(!is_valid_dtmf(tone), "{} should be invalid", tone);
        }
    }
}
