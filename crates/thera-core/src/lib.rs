//! Teletherapy client core.
//!
//! Portable session-lifecycle logic for a teletherapy mobile app:
//! authentication and credential persistence, the appointment status
//! workflow, and the lockstep lifecycle of the messaging and video
//! subsystems. Pure Rust with the platform pieces (secure storage,
//! real-time SDKs) behind traits, consumed by native UI shells.

pub mod appointments;
pub mod auth;
pub mod call;
pub mod client;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod store;
pub mod subsystems;

pub use appointments::{
    AppointmentStatusWorkflow, Consultation, ConsultationStatus, ListScope, StatusDecision,
};
pub use auth::{AuthPhase, AuthSessionManager, Identity, Role};
pub use call::{CallLifecycleController, CallSnapshot, CallingState, side_effects_for};
pub use client::TherapyClient;
pub use coordinator::RemoteSessionCoordinator;
pub use errors::TheraError;
pub use events::{EventEmitter, TheraEvent, TheraEventListener};
pub use store::{CREDENTIAL_KEY, CredentialStore, FileCredentialStore};
pub use subsystems::{MessagingClient, VideoCall, VideoClient};
