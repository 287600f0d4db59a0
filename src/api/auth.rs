use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::users::UserView;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthRequest {
    action: String,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    password: String,
}

/// `authenticate`, `getUser` and `isAdmin`. Replies never carry the password.
pub(crate) async fn auth(
    State(state): State<AppState>,
    Json(req): Json<AuthRequest>,
) -> ApiResult<Json<Value>> {
    match req.action.as_str() {
        "authenticate" => {
            let user = state.users.authenticate(&req.user_id, &req.password).await?;
            tracing::info!(user_id = %req.user_id, success = user.is_some(), "authentication attempt");
            Ok(Json(json!({
                "success": user.is_some(),
                "user": user.as_ref().map(UserView::from),
            })))
        }
        "getUser" => {
            let user = state.users.get_user(&req.user_id).await?;
            Ok(Json(json!({
                "success": user.is_some(),
                "user": user.as_ref().map(UserView::from),
            })))
        }
        "isAdmin" => {
            let is_admin = state.users.is_admin(&req.user_id).await?;
            Ok(Json(json!({ "success": true, "isAdmin": is_admin })))
        }
        _ => Err(ApiError::bad_request("Invalid action")),
    }
}
