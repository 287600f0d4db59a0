//! HTTP surface.
//!
//! Every route lives under `/api`. Handlers are thin: they parse the request,
//! call into the domain modules and shape the JSON reply.

mod admin;
mod auth;
mod diagnostics;
mod dictionaries;
mod export;
mod feedback;
mod quota;
mod rewrite;
mod state;
mod transcribe;

use axum::extract::{DefaultBodyLimit, FromRequestParts, Query};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::routing::{get, patch, post, put};
use axum::Router;

use crate::config::AppConfig;
use crate::error::ApiError;
use serde::Deserialize;

pub use state::AppState;

/// Build the full router with `state` attached.
pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_mb * 1024 * 1024;

    Router::new()
        .route("/api/auth", post(auth::auth))
        .route(
            "/api/admin/users",
            get(admin::list_users)
                .post(admin::create_user)
                .patch(admin::update_user)
                .delete(admin::delete_user),
        )
        .route(
            "/api/admin/email-settings",
            get(admin::get_email_settings).post(admin::save_email_settings),
        )
        .route("/api/admin/send-test-email", post(admin::send_test_email))
        .route("/api/admin/send-daily-report", post(admin::send_daily_report))
        .route(
            "/api/cron/daily-email",
            get(admin::cron_daily_email).post(admin::cron_daily_email),
        )
        .route("/api/check-duration", post(quota::check_duration))
        .route("/api/check-file-size", post(quota::check_file_size))
        .route("/api/transcribe", post(transcribe::transcribe))
        .route("/api/transcribe-stream", post(transcribe::transcribe_stream))
        .route("/api/transcribe-chunks", post(transcribe::transcribe_chunks))
        .route("/api/rewrite", post(rewrite::rewrite))
        .route(
            "/api/dictionaries/{user}",
            get(dictionaries::list).post(dictionaries::create),
        )
        .route("/api/dictionaries/{user}/active", put(dictionaries::set_active))
        .route("/api/dictionaries/{user}/apply", post(dictionaries::apply))
        .route(
            "/api/dictionaries/{user}/quick-replace",
            post(dictionaries::quick_replace),
        )
        .route("/api/dictionaries/{user}/import", post(dictionaries::import))
        .route(
            "/api/dictionaries/{user}/{dict}",
            patch(dictionaries::update).delete(dictionaries::delete),
        )
        .route(
            "/api/dictionaries/{user}/{dict}/export",
            get(dictionaries::export),
        )
        .route(
            "/api/dictionaries/{user}/{dict}/terms",
            post(dictionaries::add_term),
        )
        .route(
            "/api/dictionaries/{user}/{dict}/terms/{term}",
            patch(dictionaries::update_term).delete(dictionaries::delete_term),
        )
        .route(
            "/api/feedback",
            post(feedback::submit).get(feedback::list),
        )
        .route("/api/export/srt", post(export::srt))
        .route("/api/test-connection", get(diagnostics::test_connection))
        .route("/api/check-env", get(diagnostics::check_env))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

/// Admin routes are open unless `ADMIN_KEY` is set. The key may arrive as
/// `?key=`, an `x-admin-key` header or a bearer token.
pub(crate) fn require_admin_key(
    config: &AppConfig,
    headers: &HeaderMap,
    query_key: Option<&str>,
) -> Result<(), ApiError> {
    let Some(expected) = config.admin_key.as_deref() else {
        return Ok(());
    };

    let header_key = headers
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok());
    let bearer = bearer_token(headers);

    if [query_key, header_key, bearer]
        .into_iter()
        .flatten()
        .any(|key| key == expected)
    {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("管理者キーが無効です".to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct AdminKeyQuery {
    key: Option<String>,
}

/// Extractor that rejects the request unless [`require_admin_key`] passes.
pub(crate) struct AdminAccess;

impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let query = Query::<AdminKeyQuery>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();
        require_admin_key(&state.config, &parts.headers, query.key.as_deref())?;
        Ok(AdminAccess)
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config_with_key(key: Option<&str>) -> AppConfig {
        AppConfig {
            admin_key: key.map(str::to_string),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_admin_key_open_when_unset() {
        assert!(require_admin_key(&config_with_key(None), &HeaderMap::new(), None).is_ok());
    }

    #[test]
    fn test_admin_key_sources() {
        let config = config_with_key(Some("s3cret"));
        assert!(require_admin_key(&config, &HeaderMap::new(), None).is_err());
        assert!(require_admin_key(&config, &HeaderMap::new(), Some("wrong")).is_err());
        assert!(require_admin_key(&config, &HeaderMap::new(), Some("s3cret")).is_ok());

        let mut headers = HeaderMap::new();
        headers.insert("x-admin-key", HeaderValue::from_static("s3cret"));
        assert!(require_admin_key(&config, &headers, None).is_ok());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));
        assert!(require_admin_key(&config, &headers, None).is_ok());
    }
}
