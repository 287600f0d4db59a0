//! Per-user glossaries under `/api/dictionaries/{user}`.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::rewrite::persist_usage;
use super::AppState;
use crate::dictionary::{DictionaryUpdate, TermInput, TermUpdate};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub(crate) struct CreateDictionary {
    #[serde(default)]
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ActiveIds {
    active_dictionary_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApplyBody {
    text: String,
    /// Overrides the stored active list when present
    active_dictionary_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuickReplaceBody {
    rules: Vec<TermInput>,
}

/// All dictionaries plus the active id list.
pub(crate) async fn list(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> ApiResult<Json<Value>> {
    let dictionaries = state.dictionaries.list(&user).await?;
    let active = state.dictionaries.active_ids(&user).await?;
    Ok(Json(json!({
        "success": true,
        "dictionaries": dictionaries,
        "activeDictionaryIds": active,
    })))
}

pub(crate) async fn create(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(body): Json<CreateDictionary>,
) -> ApiResult<Json<Value>> {
    let dictionary = state
        .dictionaries
        .create(&user, &body.name, body.description.filter(|d| !d.is_empty()))
        .await?;
    Ok(Json(json!({ "success": true, "dictionary": dictionary })))
}

pub(crate) async fn set_active(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(body): Json<ActiveIds>,
) -> ApiResult<Json<Value>> {
    state
        .dictionaries
        .set_active(&user, &body.active_dictionary_ids)
        .await?;
    Ok(Json(json!({
        "success": true,
        "activeDictionaryIds": body.active_dictionary_ids,
    })))
}

pub(crate) async fn apply(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(body): Json<ApplyBody>,
) -> ApiResult<Json<Value>> {
    let substitution = state
        .dictionaries
        .apply(&user, &body.text, body.active_dictionary_ids)
        .await?;
    persist_usage(&state, user, &substitution.applied_terms);
    Ok(Json(json!({
        "success": true,
        "text": substitution.text,
        "appliedTerms": substitution.applied_terms,
    })))
}

pub(crate) async fn quick_replace(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(body): Json<QuickReplaceBody>,
) -> ApiResult<Json<Value>> {
    if body.rules.is_empty() {
        return Err(ApiError::bad_request("No rules to save"));
    }
    let (dictionary, added) = state.dictionaries.save_quick_replace(&user, body.rules).await?;
    Ok(Json(json!({
        "success": true,
        "dictionary": dictionary,
        "added": added,
    })))
}

/// Body is an exported dictionary as JSON.
pub(crate) async fn import(
    State(state): State<AppState>,
    Path(user): Path<String>,
    body: String,
) -> ApiResult<Json<Value>> {
    let dictionary = state.dictionaries.import(&user, &body).await?;
    Ok(Json(json!({ "success": true, "dictionary": dictionary })))
}

pub(crate) async fn update(
    State(state): State<AppState>,
    Path((user, dict)): Path<(String, String)>,
    Json(update): Json<DictionaryUpdate>,
) -> ApiResult<Json<Value>> {
    let dictionary = state.dictionaries.update(&user, &dict, update).await?;
    Ok(Json(json!({ "success": true, "dictionary": dictionary })))
}

pub(crate) async fn delete(
    State(state): State<AppState>,
    Path((user, dict)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    state.dictionaries.delete(&user, &dict).await?;
    Ok(Json(json!({ "success": true })))
}

/// Pretty JSON served as a download.
pub(crate) async fn export(
    State(state): State<AppState>,
    Path((user, dict)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let json = state.dictionaries.export(&user, &dict).await?;
    let filename = format!("{}.json", dict);
    Ok((
        [
            (header::CONTENT_TYPE, "application/json; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        json,
    ))
}

pub(crate) async fn add_term(
    State(state): State<AppState>,
    Path((user, dict)): Path<(String, String)>,
    Json(input): Json<TermInput>,
) -> ApiResult<Json<Value>> {
    let term = state.dictionaries.add_term(&user, &dict, input).await?;
    Ok(Json(json!({ "success": true, "term": term })))
}

pub(crate) async fn update_term(
    State(state): State<AppState>,
    Path((user, dict, term)): Path<(String, String, String)>,
    Json(update): Json<TermUpdate>,
) -> ApiResult<Json<Value>> {
    let term = state
        .dictionaries
        .update_term(&user, &dict, &term, update)
        .await?;
    Ok(Json(json!({ "success": true, "term": term })))
}

pub(crate) async fn delete_term(
    State(state): State<AppState>,
    Path((user, dict, term)): Path<(String, String, String)>,
) -> ApiResult<Json<Value>> {
    state.dictionaries.delete_term(&user, &dict, &term).await?;
    Ok(Json(json!({ "success": true })))
}
