use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use http::Method;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{AppError, Result};
use crate::models::user::User;
use crate::services::session::{FetchOptions, SessionController};

const PENDING_APPROVALS_PATH: &str = "/tasks/waiting-for-approvals";
const APPROVE_PATH: &str = "/task/approve";
const DECLINE_PATH: &str = "/task/decline";
const DATA_STREAMS_PATH: &str = "/elk/data-streams";
const DATA_VIEW_PATH: &str = "/task/elk-data-view";

/// An automation run waiting for an admin decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTask {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub requested_by: String,
}

/// Backend acknowledgement of an approval decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAck {
    pub task_id: i64,
}

/// Backend answer to a submitted run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize)]
struct Decision<'a> {
    task_id: i64,
    author: &'a str,
}

#[derive(Serialize)]
struct DataViewRequest<'a> {
    scheduled_at: String,
    requested_by: &'a str,
    parameters: DataViewParameters<'a>,
}

#[derive(Serialize)]
struct DataViewParameters<'a> {
    #[serde(rename = "index-pattern")]
    index_pattern: &'a str,
}

#[derive(Deserialize)]
struct BackendMessage {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone, Copy, Debug)]
enum Verdict {
    Approve,
    Decline,
}

/// Approval workflow and automation runs, sent through the session's
/// authenticated fetch.
pub struct TaskClient {
    session: Arc<SessionController>,
}

impl TaskClient {
    pub fn new(session: Arc<SessionController>) -> Self {
        Self { session }
    }

    pub async fn pending_approvals(&self) -> Result<Vec<PendingTask>> {
        self.get_json(PENDING_APPROVALS_PATH, "Failed to fetch pending automations")
            .await
    }

    pub async fn approve(&self, task_id: i64) -> Result<TaskAck> {
        self.decide(task_id, Verdict::Approve).await
    }

    pub async fn decline(&self, task_id: i64) -> Result<TaskAck> {
        self.decide(task_id, Verdict::Decline).await
    }

    /// Data streams matching `pattern`. An empty pattern matches nothing and
    /// does not reach the backend.
    pub async fn data_stream_suggestions(&self, pattern: &str, exact: bool) -> Result<Vec<String>> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Ok(Vec::new());
        }

        let mut url = reqwest::Url::parse(&self.session.backend_url(DATA_STREAMS_PATH))
            .map_err(|e| AppError::Internal(format!("Invalid backend URL: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            if exact {
                query.append_pair("exact", "true");
            }
            query.append_pair("index-pattern", pattern);
        }

        self.get_json(url.as_str(), "Failed to fetch suggestions").await
    }

    /// Submits an ELK data view run for `pattern`, scheduled now unless a
    /// time is given.
    pub async fn submit_data_view(
        &self,
        pattern: &str,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<SubmittedTask> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(AppError::Validation("Index pattern cannot be empty".to_string()));
        }
        let user = self.session.user().ok_or(AppError::Unauthorized)?;

        let request = DataViewRequest {
            scheduled_at: scheduled_at
                .unwrap_or_else(Utc::now)
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            requested_by: &user.name,
            parameters: DataViewParameters { index_pattern: pattern },
        };

        let options = FetchOptions::new(Method::POST).json(&request)?;
        let task: SubmittedTask = self
            .send_json(DATA_VIEW_PATH, &options, "Failed to submit automation")
            .await?;

        tracing::info!("🚀 {} submitted data view run for {}", user.id, pattern);
        Ok(task)
    }

    async fn decide(&self, task_id: i64, verdict: Verdict) -> Result<TaskAck> {
        let user = self.require_admin()?;
        let (path, fallback) = match verdict {
            Verdict::Approve => (APPROVE_PATH, "Failed to approve automation"),
            Verdict::Decline => (DECLINE_PATH, "Failed to decline automation"),
        };

        let options = FetchOptions::new(Method::PATCH).json(&Decision {
            task_id,
            author: &user.name,
        })?;
        let ack: TaskAck = self.send_json(path, &options, fallback).await?;

        tracing::info!("✅ Task {} {:?} by {}", ack.task_id, verdict, user.id);
        Ok(ack)
    }

    /// Approval decisions go by the true role; the assumed role only
    /// changes what the views show.
    fn require_admin(&self) -> Result<User> {
        match self.session.user() {
            Some(user) if user.is_admin() => Ok(user),
            Some(user) => {
                tracing::warn!("❌ {} is not an admin", user.id);
                Err(AppError::Unauthorized)
            }
            None => Err(AppError::Unauthorized),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, fallback: &str) -> Result<T> {
        self.send_json(endpoint, &FetchOptions::default(), fallback)
            .await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &FetchOptions,
        fallback: &str,
    ) -> Result<T> {
        let response = self.session.auth_fetch(endpoint, options).await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = sonic_rs::from_slice::<BackendMessage>(&body)
                .ok()
                .and_then(|m| m.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| fallback.to_string());
            return Err(AppError::Backend(message));
        }

        sonic_rs::from_slice(&body)
            .map_err(|e| AppError::Backend(format!("{}: invalid response: {}", fallback, e)))
    }
}
