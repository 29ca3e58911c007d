use std::sync::Arc;

use crate::auth::AuthPhase;
use crate::call::CallingState;

/// Events emitted by the core to native UI listeners.
#[derive(Debug, Clone)]
pub enum TheraEvent {
    AuthChanged(AuthPhase),
    MessagingReady(bool),
    VideoReady(bool),
    CallStateChanged {
        consultation_id: String,
        state: CallingState,
    },
}

/// Trait for receiving events from the core.
/// Implementations must be Send + Sync (called from tokio tasks).
pub trait TheraEventListener: Send + Sync {
    fn on_event(&self, event: TheraEvent);
}

/// Internal event emitter that dispatches to registered listeners.
#[derive(Clone)]
pub struct EventEmitter {
    listeners: Arc<std::sync::RwLock<Vec<Arc<dyn TheraEventListener>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(std::sync::RwLock::new(Vec::new())),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn TheraEventListener>) {
        self.listeners.write().unwrap().push(listener);
    }

    pub fn emit(&self, event: TheraEvent) {
        let listeners = self.listeners.read().unwrap();
        for listener in listeners.iter() {
            listener.on_event(event.clone());
        }
    }
}
