use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::errors::TheraError;

/// Lifecycle status of a consultation. The backend owns the record;
/// `Completed` is reached by time or backend process, never requested
/// from this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsultationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

/// The only status changes a client may request: a therapist resolving a
/// pending consultation one way or the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDecision {
    Confirmed,
    Cancelled,
}

impl StatusDecision {
    pub fn as_status(self) -> ConsultationStatus {
        match self {
            StatusDecision::Confirmed => ConsultationStatus::Confirmed,
            StatusDecision::Cancelled => ConsultationStatus::Cancelled,
        }
    }
}

/// A scheduled session between a client and a therapist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    pub id: String,
    pub client_id: String,
    pub therapist_id: String,
    pub date_time: DateTime<Utc>,
    pub status: ConsultationStatus,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_email: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateConsultation<'a> {
    client_id: &'a str,
    therapist_id: &'a str,
    date_time: DateTime<Utc>,
    status: ConsultationStatus,
    notes: &'a str,
}

#[derive(Serialize)]
struct StatusUpdate {
    status: ConsultationStatus,
}

#[derive(Deserialize)]
struct ErrorBody {
    msg: String,
}

/// Which consultations to fetch. The backend filter is a parameter, not
/// an assumption baked into the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    Client(String),
    Therapist(String),
    All,
}

/// Client-side view of the consultation records plus the mutations the
/// backend accepts from this client.
///
/// Role and state preconditions are the backend's to enforce; this side
/// only validates what can be checked before a request goes out, and
/// reconciles the local copy after each successful mutation.
pub struct AppointmentStatusWorkflow {
    http: reqwest::Client,
    api_url: String,
    access_token: String,
    consultations: Mutex<Vec<Consultation>>,
}

impl AppointmentStatusWorkflow {
    pub fn new(api_url: &str, access_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            consultations: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the locally held records, in backend order.
    pub async fn consultations(&self) -> Vec<Consultation> {
        self.consultations.lock().await.clone()
    }

    /// Schedule a new consultation. The status is always submitted as
    /// `Pending`; the backend would force it anyway, and this client does
    /// not try to bypass that.
    pub async fn create(
        &self,
        client_id: &str,
        therapist_id: &str,
        date_time: DateTime<Utc>,
        notes: &str,
    ) -> Result<Consultation, TheraError> {
        if therapist_id.trim().is_empty() {
            return Err(TheraError::Validation("therapist id is required".into()));
        }

        let url = format!("{}/consultations", self.api_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&CreateConsultation {
                client_id,
                therapist_id,
                date_time,
                status: ConsultationStatus::Pending,
                notes,
            })
            .send()
            .await
            .map_err(|e| TheraError::Http(e.to_string()))?;

        let created: Consultation = Self::decode(resp).await?;
        tracing::info!("consultation {} scheduled", created.id);
        self.consultations.lock().await.push(created.clone());
        Ok(created)
    }

    /// Fetch consultations for the given scope.
    ///
    /// Ordering is backend-determined and preserved as received; the
    /// local copy is replaced wholesale.
    pub async fn list(&self, scope: ListScope) -> Result<Vec<Consultation>, TheraError> {
        let url = format!("{}/consultations", self.api_url);
        let mut req = self.http.get(&url).bearer_auth(&self.access_token);
        req = match &scope {
            ListScope::Client(id) => req.query(&[("clientId", id.as_str())]),
            ListScope::Therapist(id) => req.query(&[("therapistId", id.as_str())]),
            ListScope::All => req,
        };

        let resp = req
            .send()
            .await
            .map_err(|e| TheraError::Http(e.to_string()))?;
        let records: Vec<Consultation> = Self::decode(resp).await?;

        *self.consultations.lock().await = records.clone();
        Ok(records)
    }

    /// Request a status change for one consultation.
    ///
    /// On success only the `status` field of the matching local record is
    /// overwritten; everything else keeps its pre-update value so
    /// concurrent local edits are not clobbered.
    pub async fn update_status(
        &self,
        id: &str,
        decision: StatusDecision,
    ) -> Result<Consultation, TheraError> {
        let url = format!("{}/consultations/{}", self.api_url, id);
        let resp = self
            .http
            .patch(&url)
            .bearer_auth(&self.access_token)
            .json(&StatusUpdate {
                status: decision.as_status(),
            })
            .send()
            .await
            .map_err(|e| TheraError::Http(e.to_string()))?;

        let updated: Consultation = Self::decode(resp).await?;
        tracing::info!("consultation {} is now {:?}", updated.id, updated.status);

        let mut records = self.consultations.lock().await;
        if let Some(local) = records.iter_mut().find(|r| r.id == id) {
            local.status = updated.status;
        }
        Ok(updated)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, TheraError> {
        let status = resp.status();
        if !status.is_success() {
            let msg = resp
                .json::<ErrorBody>()
                .await
                .map(|body| body.msg)
                .unwrap_or_else(|_| format!("backend returned status {status}"));
            return Err(TheraError::Http(msg));
        }
        resp.json::<T>()
            .await
            .map_err(|e| TheraError::Http(format!("invalid consultation response: {e}")))
    }
}
