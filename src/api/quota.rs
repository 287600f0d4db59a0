//! Pre-upload checks. A refusal is a normal answer here, not an error.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::users::{credits_for_minutes, Admission};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DurationCheck {
    user_id: Option<String>,
    duration_minutes: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileSizeCheck {
    #[serde(rename = "userId")]
    user_id: Option<String>,
    #[serde(rename = "fileSizeMB")]
    file_size_mb: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckReply {
    success: bool,
    can_upload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_credits: Option<u32>,
}

impl CheckReply {
    fn from_admission(admission: Admission, required_credits: Option<u32>) -> Self {
        Self {
            success: true,
            can_upload: admission.is_allowed(),
            reason: admission.reason(),
            required_credits,
        }
    }
}

/// Duration cap, then the credits the clip will cost.
pub(crate) async fn check_duration(
    State(state): State<AppState>,
    Json(req): Json<DurationCheck>,
) -> ApiResult<Json<CheckReply>> {
    let (Some(user_id), Some(minutes)) = (req.user_id.filter(|u| !u.is_empty()), req.duration_minutes)
    else {
        return Err(ApiError::bad_request("User ID and duration are required"));
    };

    let required = credits_for_minutes(minutes);
    let mut admission = state.users.check_duration(&user_id, minutes).await?;
    if admission.is_allowed() {
        admission = state.users.check_credit_availability(&user_id, required).await?;
    }

    tracing::info!(
        user_id = %user_id,
        minutes,
        required,
        allowed = admission.is_allowed(),
        "duration check"
    );
    Ok(Json(CheckReply::from_admission(admission, Some(required))))
}

pub(crate) async fn check_file_size(
    State(state): State<AppState>,
    Json(req): Json<FileSizeCheck>,
) -> ApiResult<Json<CheckReply>> {
    let (Some(user_id), Some(size_mb)) = (req.user_id.filter(|u| !u.is_empty()), req.file_size_mb)
    else {
        return Err(ApiError::bad_request("User ID and file size are required"));
    };

    let admission = state.users.check_file_size(&user_id, size_mb).await?;
    tracing::info!(user_id = %user_id, size_mb, allowed = admission.is_allowed(), "file size check");
    Ok(Json(CheckReply::from_admission(admission, None)))
}
