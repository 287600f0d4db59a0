use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::dictionary::{Substitution, Term};
use crate::error::{ApiError, ApiResult};
use crate::rewrite::{pipeline, RewriteRequest, SummaryLevel};
use crate::transcription::Segment;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RewriteBody {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<Segment>,
    #[serde(default)]
    summary_level: SummaryLevel,
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RewriteReply {
    success: bool,
    rewritten_text: String,
    summary_level: SummaryLevel,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    demo: bool,
    applied_terms: Vec<Term>,
    duration_ms: u64,
}

/// Rewrite into telop lines, then run the user's active dictionaries over
/// the result when `userId` is given.
pub(crate) async fn rewrite(
    State(state): State<AppState>,
    Json(body): Json<RewriteBody>,
) -> ApiResult<Json<RewriteReply>> {
    if body.text.trim().is_empty() {
        return Err(ApiError::bad_request("Text is required"));
    }

    let request = RewriteRequest {
        text: body.text,
        segments: body.segments,
        level: body.summary_level,
    };
    let outcome = pipeline::rewrite(state.rewriter.as_ref(), &request).await?;

    let user_id = body.user_id.filter(|u| !u.is_empty());
    let Substitution {
        text,
        applied_terms,
    } = match user_id {
        Some(user_id) => {
            let substitution = state.dictionaries.apply(&user_id, &outcome.text, None).await?;
            persist_usage(&state, user_id, &substitution.applied_terms);
            substitution
        }
        None => Substitution {
            text: outcome.text,
            applied_terms: Vec::new(),
        },
    };

    Ok(Json(RewriteReply {
        success: true,
        rewritten_text: text,
        summary_level: request.level,
        demo: outcome.demo,
        applied_terms,
        duration_ms: outcome.duration_ms,
    }))
}

/// Bump term counters without holding up the reply.
pub(crate) fn persist_usage(state: &AppState, user_id: String, applied: &[Term]) {
    if applied.is_empty() {
        return;
    }
    let term_ids: Vec<String> = applied.iter().map(|t| t.id.clone()).collect();
    let dictionaries = state.dictionaries.clone();
    tokio::spawn(async move {
        if let Err(e) = dictionaries.increment_usage(&user_id, &term_ids).await {
            tracing::warn!(user_id = %user_id, error = %e, "failed to record term usage");
        }
    });
}
