use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::{AdminAccess, AppState};
use crate::error::ApiResult;
use crate::feedback::FeedbackSubmission;

pub(crate) async fn submit(
    State(state): State<AppState>,
    Json(submission): Json<FeedbackSubmission>,
) -> ApiResult<Response> {
    let entry = state.feedback.submit(submission, state.clock.now()).await?;
    Ok(Json(json!({
        "success": true,
        "message": "フィードバックを受け付けました",
        "id": entry.id,
    }))
    .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    action: Option<String>,
}

/// `?action=summary` for the counts, otherwise every entry newest first.
pub(crate) async fn list(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Response> {
    if params.action.as_deref() == Some("summary") {
        let summary = state.feedback.summary().await?;
        return Ok(Json(summary).into_response());
    }
    Ok(Json(state.feedback.list().await).into_response())
}
