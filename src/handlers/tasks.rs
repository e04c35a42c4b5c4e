use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    error::Result,
    services::session::SessionController,
    services::tasks::{PendingTask, SubmittedTask, TaskAck, TaskClient},
};

/// Query string for data stream suggestions.
#[derive(Deserialize, Debug)]
pub struct DataStreamQuery {
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub exact: bool,
}

/// The request payload for submitting a data view run.
#[derive(Deserialize, Debug)]
pub struct DataViewRequest {
    pub pattern: String,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Lists automation runs waiting for an admin decision.
pub async fn pending_approvals(
    Extension(controller): Extension<Arc<SessionController>>,
) -> Result<Json<Vec<PendingTask>>> {
    Ok(Json(TaskClient::new(controller).pending_approvals().await?))
}

/// Approves a pending run. Requires a true admin role.
pub async fn approve(
    Extension(controller): Extension<Arc<SessionController>>,
    Path(task_id): Path<i64>,
) -> Result<Json<TaskAck>> {
    Ok(Json(TaskClient::new(controller).approve(task_id).await?))
}

/// Declines a pending run. Requires a true admin role.
pub async fn decline(
    Extension(controller): Extension<Arc<SessionController>>,
    Path(task_id): Path<i64>,
) -> Result<Json<TaskAck>> {
    Ok(Json(TaskClient::new(controller).decline(task_id).await?))
}

/// Suggests data streams matching `pattern`. An empty pattern yields no suggestions.
pub async fn data_streams(
    Extension(controller): Extension<Arc<SessionController>>,
    Query(query): Query<DataStreamQuery>,
) -> Result<Json<Vec<String>>> {
    let suggestions = TaskClient::new(controller)
        .data_stream_suggestions(&query.pattern, query.exact)
        .await?;
    Ok(Json(suggestions))
}

/// Schedules a data view run for the signed-in user.
pub async fn submit_data_view(
    Extension(controller): Extension<Arc<SessionController>>,
    Json(payload): Json<DataViewRequest>,
) -> Result<(StatusCode, Json<SubmittedTask>)> {
    let task = TaskClient::new(controller)
        .submit_data_view(&payload.pattern, payload.scheduled_at)
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}
