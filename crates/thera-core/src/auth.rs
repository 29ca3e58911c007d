use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::errors::TheraError;
use crate::events::{EventEmitter, TheraEvent};
use crate::store::{CREDENTIAL_KEY, CredentialStore};

/// Account role assigned by the backend at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Therapist,
}

impl Role {
    pub fn is_therapist(self) -> bool {
        matches!(self, Role::Therapist)
    }
}

/// Who the signed-in user is, as derived from the login response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    pub email: String,
}

/// Authentication state visible to the rest of the client.
///
/// `Unknown` covers startup before restoration has finished; consumers
/// must not render authenticated-only surfaces until the manager reports
/// `initialized`. A partially populated state is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPhase {
    Unknown,
    Anonymous,
    Authenticated {
        access_token: String,
        session_token: String,
        identity: Identity,
    },
}

impl AuthPhase {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthPhase::Authenticated { .. })
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthPhase::Authenticated { identity, .. } => Some(identity),
            _ => None,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        match self {
            AuthPhase::Authenticated { access_token, .. } => Some(access_token),
            _ => None,
        }
    }
}

/// Credential blob persisted under [`CREDENTIAL_KEY`].
///
/// Every field is mandatory; a blob that fails to deserialize is treated
/// as absent and removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credential {
    access_token: String,
    session_token: String,
    user_id: String,
    role: Role,
    email: String,
}

/// Successful response from the login and registration endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub access_token: String,
    pub session_token: String,
    pub user: UserRecord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub role: Role,
    pub email: String,
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    msg: String,
}

/// Owns authentication state: restores it at startup, performs
/// login/register/logout against the backend, and persists the credential
/// blob. The single persisted credential record is exclusively owned here.
pub struct AuthSessionManager {
    http: reqwest::Client,
    api_url: String,
    store: Arc<dyn CredentialStore>,
    phase_tx: watch::Sender<AuthPhase>,
    initialized: AtomicBool,
    emitter: EventEmitter,
}

impl AuthSessionManager {
    pub fn new(api_url: &str, store: Arc<dyn CredentialStore>, emitter: EventEmitter) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            store,
            phase_tx: watch::Sender::new(AuthPhase::Unknown),
            initialized: AtomicBool::new(false),
            emitter,
        }
    }

    /// Current authentication phase.
    pub fn phase(&self) -> AuthPhase {
        self.phase_tx.borrow().clone()
    }

    /// Subscribe to authentication transitions.
    ///
    /// The coordinator drives subsystem connections off this channel.
    pub fn subscribe(&self) -> watch::Receiver<AuthPhase> {
        self.phase_tx.subscribe()
    }

    /// True once startup restoration has run, whatever its outcome.
    pub fn initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_therapist(&self) -> bool {
        self.phase()
            .identity()
            .map(|i| i.role.is_therapist())
            .unwrap_or(false)
    }

    /// Restore the session from the credential store at process start.
    ///
    /// Never touches the network. Flips `initialized` exactly once,
    /// whether or not a usable credential was found.
    pub async fn restore(&self) {
        let phase = match self.store.get(CREDENTIAL_KEY).await {
            Ok(Some(blob)) => match serde_json::from_str::<Credential>(&blob) {
                Ok(cred) => {
                    tracing::info!("restored persisted session for {}", cred.email);
                    AuthPhase::Authenticated {
                        access_token: cred.access_token,
                        session_token: cred.session_token,
                        identity: Identity {
                            user_id: cred.user_id,
                            role: cred.role,
                            email: cred.email,
                        },
                    }
                }
                Err(e) => {
                    tracing::warn!("discarding unreadable credential blob: {e}");
                    if let Err(e) = self.store.remove(CREDENTIAL_KEY).await {
                        tracing::warn!("failed to remove stale credential: {e}");
                    }
                    AuthPhase::Anonymous
                }
            },
            Ok(None) => AuthPhase::Anonymous,
            Err(e) => {
                tracing::warn!("credential store unavailable at startup: {e}");
                AuthPhase::Anonymous
            }
        };

        self.set_phase(phase);
        self.initialized.store(true, Ordering::SeqCst);
    }

    /// Authenticate against the backend and establish the session.
    ///
    /// On a non-success response the backend message is surfaced verbatim
    /// and the current phase is left untouched.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionResponse, TheraError> {
        let resp = self.submit("/auth/login", email, password).await?;
        self.establish(&resp).await?;
        Ok(resp)
    }

    /// Register a new account. Registration never returns without signing
    /// the user in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionResponse, TheraError> {
        let resp = self.submit("/auth/register", email, password).await?;
        self.establish(&resp).await?;
        Ok(resp)
    }

    /// Remove the persisted credential and reset to anonymous.
    /// Safe to call when already signed out.
    pub async fn sign_out(&self) -> Result<(), TheraError> {
        self.store.remove(CREDENTIAL_KEY).await?;
        self.set_phase(AuthPhase::Anonymous);
        tracing::info!("signed out");
        Ok(())
    }

    async fn submit(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> Result<SessionResponse, TheraError> {
        let url = format!("{}{}", self.api_url, path);
        let resp = self
            .http
            .post(&url)
            .json(&AuthRequest { email, password })
            .send()
            .await
            .map_err(|e| TheraError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let msg = resp
                .json::<ErrorBody>()
                .await
                .map(|body| body.msg)
                .unwrap_or_else(|_| "request rejected".to_string());
            return Err(TheraError::Auth(msg));
        }

        resp.json::<SessionResponse>()
            .await
            .map_err(|e| TheraError::Http(format!("invalid auth response: {e}")))
    }

    /// Persist the credential blob, then publish the new phase. The phase
    /// is only replaced once the blob is safely stored, so persisted state
    /// and in-memory state never diverge.
    async fn establish(&self, resp: &SessionResponse) -> Result<(), TheraError> {
        let cred = Credential {
            access_token: resp.access_token.clone(),
            session_token: resp.session_token.clone(),
            user_id: resp.user.id.clone(),
            role: resp.user.role,
            email: resp.user.email.clone(),
        };
        let blob =
            serde_json::to_string(&cred).map_err(|e| TheraError::Storage(e.to_string()))?;
        self.store.set(CREDENTIAL_KEY, &blob).await?;

        self.set_phase(AuthPhase::Authenticated {
            access_token: cred.access_token,
            session_token: cred.session_token,
            identity: Identity {
                user_id: cred.user_id,
                role: cred.role,
                email: cred.email,
            },
        });
        tracing::info!("session established for {}", resp.user.email);
        Ok(())
    }

    fn set_phase(&self, phase: AuthPhase) {
        self.phase_tx.send_replace(phase.clone());
        self.emitter.emit(TheraEvent::AuthChanged(phase));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileCredentialStore;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_in(dir: &tempfile::TempDir) -> Arc<dyn CredentialStore> {
        Arc::new(FileCredentialStore::new(dir.path().to_str().unwrap()))
    }

    fn manager(api_url: &str, store: Arc<dyn CredentialStore>) -> AuthSessionManager {
        AuthSessionManager::new(api_url, store, EventEmitter::new())
    }

    fn session_body(role: &str) -> serde_json::Value {
        json!({
            "accessToken": "at-123",
            "sessionToken": "st-456",
            "user": { "id": "u1", "role": role, "email": "a@b.com" }
        })
    }

    #[tokio::test]
    async fn restore_with_no_credential_is_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let auth = manager("http://127.0.0.1:9", store_in(&dir));

        assert!(!auth.initialized());
        assert_eq!(auth.phase(), AuthPhase::Unknown);

        auth.restore().await;

        assert!(auth.initialized());
        assert_eq!(auth.phase(), AuthPhase::Anonymous);
    }

    #[tokio::test]
    async fn restore_from_persisted_credential_needs_no_network() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let blob = json!({
            "accessToken": "at-123",
            "sessionToken": "st-456",
            "userId": "u1",
            "role": "therapist",
            "email": "a@b.com"
        });
        store
            .set(CREDENTIAL_KEY, &blob.to_string())
            .await
            .unwrap();

        // Unroutable base URL: restoration must not reach the backend.
        let auth = manager("http://127.0.0.1:9", store);
        auth.restore().await;

        match auth.phase() {
            AuthPhase::Authenticated {
                access_token,
                session_token,
                identity,
            } => {
                assert_eq!(access_token, "at-123");
                assert_eq!(session_token, "st-456");
                assert_eq!(identity.user_id, "u1");
                assert_eq!(identity.role, Role::Therapist);
                assert_eq!(identity.email, "a@b.com");
            }
            other => panic!("expected Authenticated, got {other:?}"),
        }
        assert!(auth.is_therapist());
    }

    #[tokio::test]
    async fn restore_discards_corrupt_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.set(CREDENTIAL_KEY, "not json!!!").await.unwrap();

        let auth = manager("http://127.0.0.1:9", store.clone());
        auth.restore().await;

        assert_eq!(auth.phase(), AuthPhase::Anonymous);
        assert_eq!(store.get(CREDENTIAL_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn sign_in_establishes_and_persists_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({ "email": "a@b.com", "password": "pw" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body("client")))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let auth = manager(&server.uri(), store.clone());
        auth.restore().await;

        let resp = auth.sign_in("a@b.com", "pw").await.unwrap();
        assert_eq!(resp.access_token, "at-123");
        assert_eq!(resp.user.id, "u1");

        assert!(auth.phase().is_authenticated());
        assert!(!auth.is_therapist());

        let blob = store.get(CREDENTIAL_KEY).await.unwrap().unwrap();
        let persisted: serde_json::Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(persisted["accessToken"], "at-123");
        assert_eq!(persisted["sessionToken"], "st-456");
        assert_eq!(persisted["userId"], "u1");
        assert_eq!(persisted["role"], "client");
    }

    #[tokio::test]
    async fn sign_in_failure_surfaces_backend_message_and_keeps_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "msg": "invalid credentials" })),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let auth = manager(&server.uri(), store.clone());
        auth.restore().await;

        let err = auth.sign_in("a@b.com", "wrong").await.unwrap_err();
        match err {
            TheraError::Auth(msg) => assert_eq!(msg, "invalid credentials"),
            other => panic!("expected Auth error, got {other:?}"),
        }

        assert_eq!(auth.phase(), AuthPhase::Anonymous);
        assert_eq!(store.get(CREDENTIAL_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn register_signs_the_user_in() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/register"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body("therapist")))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let auth = manager(&server.uri(), store.clone());
        auth.restore().await;

        auth.register("a@b.com", "pw").await.unwrap();

        assert!(auth.phase().is_authenticated());
        assert!(auth.is_therapist());
        assert!(store.get(CREDENTIAL_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sign_in_then_sign_out_leaves_nothing_behind() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body("client")))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let auth = manager(&server.uri(), store.clone());
        auth.restore().await;

        auth.sign_in("a@b.com", "pw").await.unwrap();
        auth.sign_out().await.unwrap();

        assert_eq!(auth.phase(), AuthPhase::Anonymous);
        assert_eq!(store.get(CREDENTIAL_KEY).await.unwrap(), None);

        // Idempotent when already signed out.
        auth.sign_out().await.unwrap();
        assert_eq!(auth.phase(), AuthPhase::Anonymous);
    }
}
