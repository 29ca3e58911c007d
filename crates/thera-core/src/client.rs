use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::appointments::{AppointmentStatusWorkflow, Consultation};
use crate::auth::AuthSessionManager;
use crate::call::CallLifecycleController;
use crate::coordinator::RemoteSessionCoordinator;
use crate::errors::TheraError;
use crate::events::{EventEmitter, TheraEventListener};
use crate::store::CredentialStore;
use crate::subsystems::{MessagingClient, VideoClient};

/// Top-level wiring of the session lifecycle.
///
/// Owns the auth manager, keeps the remote-session coordinator subscribed
/// to it, and hands out the per-session workflow and per-consultation call
/// controller. UI shells construct one of these at process start with
/// their platform credential store and SDK adapters.
pub struct TherapyClient {
    api_url: String,
    auth: Arc<AuthSessionManager>,
    coordinator: Arc<RemoteSessionCoordinator>,
    video: Arc<dyn VideoClient>,
    emitter: EventEmitter,
    // Detached on drop; the loop tears the connections down by itself
    // once the auth manager (and its watch sender) goes away.
    _coordinator_task: JoinHandle<()>,
}

impl TherapyClient {
    pub fn new(
        api_url: &str,
        store: Arc<dyn CredentialStore>,
        messaging: Arc<dyn MessagingClient>,
        video: Arc<dyn VideoClient>,
    ) -> Self {
        let emitter = EventEmitter::new();
        let auth = Arc::new(AuthSessionManager::new(api_url, store, emitter.clone()));
        let coordinator = Arc::new(RemoteSessionCoordinator::new(
            messaging,
            video.clone(),
            emitter.clone(),
        ));
        let coordinator_task = coordinator.clone().spawn(auth.subscribe());

        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            auth,
            coordinator,
            video,
            emitter,
            _coordinator_task: coordinator_task,
        }
    }

    /// Restore any persisted session. Call once at process start, before
    /// rendering anything gated on authentication.
    pub async fn start(&self) {
        self.auth.restore().await;
    }

    pub fn auth(&self) -> &AuthSessionManager {
        &self.auth
    }

    pub fn coordinator(&self) -> &RemoteSessionCoordinator {
        &self.coordinator
    }

    pub fn add_listener(&self, listener: Arc<dyn TheraEventListener>) {
        self.emitter.add_listener(listener);
    }

    /// Appointment workflow bound to the current session token.
    pub fn appointments(&self) -> Result<AppointmentStatusWorkflow, TheraError> {
        let phase = self.auth.phase();
        let token = phase
            .access_token()
            .ok_or_else(|| TheraError::Auth("not signed in".into()))?;
        Ok(AppointmentStatusWorkflow::new(&self.api_url, token))
    }

    /// Call controller for one confirmed consultation.
    pub fn call(&self, consultation: &Consultation) -> Result<CallLifecycleController, TheraError> {
        let phase = self.auth.phase();
        let viewer = phase
            .identity()
            .ok_or_else(|| TheraError::Auth("not signed in".into()))?;
        CallLifecycleController::for_consultation(
            consultation,
            viewer,
            self.video.clone(),
            self.emitter.clone(),
        )
    }
}
