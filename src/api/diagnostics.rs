use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;
use crate::error::ApiResult;
use crate::users::seed::ADMIN_ID;

/// Store round trip: the admin account should always be readable.
pub(crate) async fn test_connection(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let admin = state.users.get_user(ADMIN_ID).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Connection test successful",
        "backend": state.store.backend_name(),
        "storeConnected": admin.is_some(),
        "userFound": admin.map(|u| json!({ "id": u.id, "name": u.name, "active": u.active })),
        "timestamp": state.clock.now(),
    })))
}

/// Which variables are configured. Values are never echoed.
pub(crate) async fn check_env(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "environment": state.config.presence(),
        "demoMode": state.config.demo_mode(),
        "storeBackend": state.store.backend_name(),
    }))
}
