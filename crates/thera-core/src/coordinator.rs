use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::auth::{AuthPhase, Identity};
use crate::events::{EventEmitter, TheraEvent};
use crate::subsystems::{MessagingClient, VideoClient};

#[derive(Default)]
struct Connections {
    messaging: bool,
    video: bool,
}

/// Keeps the messaging and video subsystem connections in lockstep with
/// authentication state.
///
/// Transitions are serialized behind one lock, so a sign-out arriving while
/// a connect is still pending waits for it and then tears down whatever
/// actually connected. A subsystem that never connected is never asked to
/// disconnect.
pub struct RemoteSessionCoordinator {
    messaging: Arc<dyn MessagingClient>,
    video: Arc<dyn VideoClient>,
    connections: Mutex<Connections>,
    ready_tx: watch::Sender<bool>,
    emitter: EventEmitter,
}

impl RemoteSessionCoordinator {
    pub fn new(
        messaging: Arc<dyn MessagingClient>,
        video: Arc<dyn VideoClient>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            messaging,
            video,
            connections: Mutex::new(Connections::default()),
            ready_tx: watch::Sender::new(false),
            emitter,
        }
    }

    /// True only when both subsystems are connected. There is no
    /// partial-connect visibility: readiness flips after the whole
    /// connect sequence has resolved.
    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Subscribe to readiness changes. Dependents defer any surface that
    /// requires subsystem access while this reads false.
    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    /// React to one authentication transition.
    pub async fn apply(&self, phase: &AuthPhase) {
        match phase {
            AuthPhase::Authenticated {
                access_token,
                identity,
                ..
            } => self.connect_all(identity, access_token).await,
            AuthPhase::Anonymous => self.disconnect_all().await,
            AuthPhase::Unknown => {}
        }
    }

    /// Drive [`apply`](Self::apply) off the auth manager's watch channel.
    ///
    /// When the sender side goes away the session is over: whatever is
    /// still connected gets torn down before the loop exits.
    pub fn spawn(self: Arc<Self>, mut phase_rx: watch::Receiver<AuthPhase>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let phase = phase_rx.borrow_and_update().clone();
                self.apply(&phase).await;
                if phase_rx.changed().await.is_err() {
                    self.disconnect_all().await;
                    break;
                }
            }
            tracing::info!("remote session coordinator loop ended");
        })
    }

    async fn connect_all(&self, identity: &Identity, access_token: &str) {
        let mut conns = self.connections.lock().await;
        self.ready_tx.send_replace(false);

        // Re-authentication with live connections: drop the stale ones
        // before connecting with the new identity.
        self.drop_connections(&mut conns).await;

        match self.messaging.connect(identity, access_token).await {
            Ok(()) => {
                conns.messaging = true;
                tracing::info!("messaging connected for {}", identity.user_id);
                self.emitter.emit(TheraEvent::MessagingReady(true));
            }
            Err(e) => {
                // Not retried here; the next auth transition will try again.
                tracing::warn!("messaging connect failed: {e}");
            }
        }

        match self.video.connect(identity, access_token).await {
            Ok(()) => {
                conns.video = true;
                tracing::info!("video connected for {}", identity.user_id);
                self.emitter.emit(TheraEvent::VideoReady(true));
            }
            Err(e) => {
                tracing::warn!("video connect failed: {e}");
            }
        }

        self.ready_tx.send_replace(conns.messaging && conns.video);
    }

    async fn disconnect_all(&self) {
        let mut conns = self.connections.lock().await;
        self.ready_tx.send_replace(false);
        self.drop_connections(&mut conns).await;
    }

    /// Best-effort disconnect of whatever is currently connected.
    /// The session is ending regardless, so failures are only logged.
    async fn drop_connections(&self, conns: &mut Connections) {
        if conns.messaging {
            if let Err(e) = self.messaging.disconnect().await {
                tracing::warn!("messaging disconnect failed: {e}");
            }
            conns.messaging = false;
            self.emitter.emit(TheraEvent::MessagingReady(false));
        }
        if conns.video {
            if let Err(e) = self.video.disconnect().await {
                tracing::warn!("video disconnect failed: {e}");
            }
            conns.video = false;
            self.emitter.emit(TheraEvent::VideoReady(false));
        }
    }
}
