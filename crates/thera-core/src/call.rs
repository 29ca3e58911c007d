use std::sync::Arc;

use tokio::sync::Mutex;

use crate::appointments::{Consultation, ConsultationStatus};
use crate::auth::{Identity, Role};
use crate::errors::TheraError;
use crate::events::{EventEmitter, TheraEvent};
use crate::subsystems::{VideoCall, VideoClient};

/// Phase of one video session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingState {
    Idle,
    Joining,
    Active,
    Left,
}

/// Side effect applied once on entering [`CallingState::Active`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallAction {
    StartRecording,
    StartTranscription,
}

/// Role policy for automatic side effects on call entry.
///
/// Therapists record and transcribe every session; clients trigger
/// nothing. Not user-controlled.
pub fn side_effects_for(role: Role) -> &'static [CallAction] {
    match role {
        Role::Therapist => &[CallAction::StartRecording, CallAction::StartTranscription],
        Role::Client => &[],
    }
}

/// Point-in-time view of the call session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSnapshot {
    pub consultation_id: String,
    pub calling_state: CallingState,
    pub is_recording: bool,
    pub is_transcribing: bool,
}

struct CallSession {
    calling_state: CallingState,
    call: Option<Arc<dyn VideoCall>>,
    is_recording: bool,
    is_transcribing: bool,
}

/// State machine of one active video call, scoped to a single
/// consultation and viewer.
///
/// The session lock is held across `join`, so a teardown issued while a
/// join is still in flight waits for it to resolve and then leaves the
/// call exactly once. There is no automatic rejoin after a drop; the
/// owner observes the state and decides whether to call `join` again.
pub struct CallLifecycleController {
    consultation_id: String,
    role: Role,
    video: Arc<dyn VideoClient>,
    session: Mutex<CallSession>,
    emitter: EventEmitter,
}

impl CallLifecycleController {
    /// Build a controller for a consultation the viewer is about to enter.
    ///
    /// Only a `Confirmed` consultation may start a session; every other
    /// status is rejected before the video subsystem is ever involved.
    pub fn for_consultation(
        consultation: &Consultation,
        viewer: &Identity,
        video: Arc<dyn VideoClient>,
        emitter: EventEmitter,
    ) -> Result<Self, TheraError> {
        if consultation.status != ConsultationStatus::Confirmed {
            return Err(TheraError::Validation(format!(
                "consultation {} is {:?}, only confirmed consultations can start a session",
                consultation.id, consultation.status
            )));
        }
        Ok(Self {
            consultation_id: consultation.id.clone(),
            role: viewer.role,
            video,
            session: Mutex::new(CallSession {
                calling_state: CallingState::Idle,
                call: None,
                is_recording: false,
                is_transcribing: false,
            }),
            emitter,
        })
    }

    pub async fn snapshot(&self) -> CallSnapshot {
        let session = self.session.lock().await;
        CallSnapshot {
            consultation_id: self.consultation_id.clone(),
            calling_state: session.calling_state,
            is_recording: session.is_recording,
            is_transcribing: session.is_transcribing,
        }
    }

    /// Create-or-join the call named by the consultation id.
    ///
    /// On success the session is `Active` and the viewer's role policy has
    /// been applied. On failure the session returns to `Idle` and the
    /// connection error is surfaced to the caller.
    pub async fn join(&self) -> Result<(), TheraError> {
        let mut session = self.session.lock().await;
        match session.calling_state {
            CallingState::Idle | CallingState::Left => {}
            state => {
                return Err(TheraError::Validation(format!(
                    "cannot join while call is {state:?}"
                )));
            }
        }

        self.set_state(&mut session, CallingState::Joining);
        tracing::info!("joining call for consultation {}", self.consultation_id);

        let call = match self.video.join_call(&self.consultation_id, true).await {
            Ok(call) => call,
            Err(e) => {
                self.set_state(&mut session, CallingState::Idle);
                return Err(e);
            }
        };

        session.call = Some(call.clone());
        self.set_state(&mut session, CallingState::Active);

        for action in side_effects_for(self.role) {
            match action {
                CallAction::StartRecording => match call.start_recording().await {
                    Ok(()) => session.is_recording = true,
                    Err(e) => tracing::warn!("start recording failed: {e}"),
                },
                CallAction::StartTranscription => match call.start_transcription().await {
                    Ok(()) => session.is_transcribing = true,
                    Err(e) => tracing::warn!("start transcription failed: {e}"),
                },
            }
        }

        Ok(())
    }

    /// Leave the call. Idempotent: once `Left`, later calls do nothing.
    ///
    /// Recording and transcription are stopped first, then the subsystem
    /// is asked to leave. The session is ending regardless, so every
    /// failure along the way is logged and swallowed.
    pub async fn leave(&self) {
        let mut session = self.session.lock().await;
        if session.calling_state == CallingState::Left {
            tracing::debug!("leave ignored: call already left");
            return;
        }
        let Some(call) = session.call.take() else {
            // Never joined; nothing to tear down.
            return;
        };

        if session.is_recording {
            if let Err(e) = call.stop_recording().await {
                tracing::warn!("stop recording failed: {e}");
            }
            session.is_recording = false;
        }
        if session.is_transcribing {
            if let Err(e) = call.stop_transcription().await {
                tracing::warn!("stop transcription failed: {e}");
            }
            session.is_transcribing = false;
        }

        if let Err(e) = call.leave().await {
            tracing::warn!("leave failed: {e}");
        }
        self.set_state(&mut session, CallingState::Left);
        tracing::info!("left call for consultation {}", self.consultation_id);
    }

    /// Unmount hook: the owning view is gone, so the call must not stay
    /// dangling. Waits for any in-flight join before tearing down.
    pub async fn teardown(&self) {
        self.leave().await;
    }

    fn set_state(&self, session: &mut CallSession, state: CallingState) {
        session.calling_state = state;
        self.emitter.emit(TheraEvent::CallStateChanged {
            consultation_id: self.consultation_id.clone(),
            state,
        });
    }
}
