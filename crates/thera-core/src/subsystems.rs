use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::Identity;
use crate::errors::TheraError;

/// Contract over the real-time messaging SDK.
///
/// The SDK's internals are out of scope; the coordinator only drives its
/// session lifecycle. Implementations hold whatever API key or transport
/// configuration the concrete SDK needs.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn connect(&self, identity: &Identity, access_token: &str) -> Result<(), TheraError>;
    async fn disconnect(&self) -> Result<(), TheraError>;
}

/// Contract over the video-calling SDK.
#[async_trait]
pub trait VideoClient: Send + Sync {
    async fn connect(&self, identity: &Identity, access_token: &str) -> Result<(), TheraError>;
    async fn disconnect(&self) -> Result<(), TheraError>;

    /// Create-or-join the call named by `call_id`.
    async fn join_call(
        &self,
        call_id: &str,
        create_if_missing: bool,
    ) -> Result<Arc<dyn VideoCall>, TheraError>;
}

/// One live call obtained from [`VideoClient::join_call`].
#[async_trait]
pub trait VideoCall: Send + Sync {
    async fn leave(&self) -> Result<(), TheraError>;
    async fn start_recording(&self) -> Result<(), TheraError>;
    async fn stop_recording(&self) -> Result<(), TheraError>;
    async fn start_transcription(&self) -> Result<(), TheraError>;
    async fn stop_transcription(&self) -> Result<(), TheraError>;
}
