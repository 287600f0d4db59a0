//! Audio intake: direct multipart upload, raw stream and chunked fragments.
//!
//! All three end in [`run_transcription`], which gates on the user's credits,
//! calls the transcriber and bills the result.

use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::transcription::{AudioInput, Segment};
use crate::upload::{Chunk, ChunkProgress, DEFAULT_FILENAME};
use crate::users::Admission;

/// Raw-body uploads above this are refused.
pub const STREAM_LIMIT_MB: f64 = 25.0;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TranscribeReply {
    success: bool,
    transcription: String,
    segments: Vec<Segment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    demo: bool,
    credits_used: u32,
    method: &'static str,
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge {
            message: e.body_text(),
            size_mb: 0.0,
            max_mb: 0.0,
        }
    } else {
        ApiError::bad_request(e.body_text())
    }
}

async fn field_text(field: Field<'_>) -> ApiResult<String> {
    field.text().await.map_err(multipart_error)
}

async fn field_bytes(field: Field<'_>) -> ApiResult<Vec<u8>> {
    Ok(field.bytes().await.map_err(multipart_error)?.to_vec())
}

/// Gate on credits, transcribe, then bill.
///
/// Billing happens after the call, so a user with credits left may run past
/// the cap by one clip. Demo results count as a request but cost no credits.
async fn run_transcription(
    state: &AppState,
    user_id: Option<&str>,
    audio: AudioInput,
    method: &'static str,
) -> ApiResult<TranscribeReply> {
    if let Some(user_id) = user_id {
        if let Admission::Denied(reason) = state.users.check_usage_limit(user_id).await? {
            tracing::warn!(user_id, %reason, "transcription refused");
            return Err(ApiError::denied(reason));
        }
        if let Admission::Denied(reason) = state.users.check_file_size(user_id, audio.size_mb()).await? {
            return Err(ApiError::denied(reason));
        }
    }

    let start = Instant::now();
    let filename = audio.filename.clone();
    let size_bytes = audio.data.len();
    let transcript = state.transcriber.transcribe(audio).await?;

    let credits_used = match user_id {
        Some(user_id) if transcript.demo => {
            state.users.record_usage(user_id).await?;
            0
        }
        Some(user_id) => {
            state
                .users
                .record_transcription(user_id, transcript.duration.unwrap_or(0.0))
                .await?
        }
        None => 0,
    };

    tracing::info!(
        method,
        filename = %filename,
        size_bytes,
        segments = transcript.segments.len(),
        duration_secs = transcript.duration.unwrap_or(0.0),
        credits_used,
        demo = transcript.demo,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "transcription completed"
    );

    Ok(TranscribeReply {
        success: true,
        transcription: transcript.text,
        segments: transcript.segments,
        language: transcript.language,
        duration: transcript.duration,
        demo: transcript.demo,
        credits_used,
        method,
    })
}

/// Multipart form with an `audio` file and optional `userId`.
pub(crate) async fn transcribe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<TranscribeReply>> {
    let mut audio: Option<(Vec<u8>, String)> = None;
    let mut user_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
                audio = Some((field_bytes(field).await?, filename));
            }
            "userId" => user_id = Some(field_text(field).await?).filter(|u| !u.is_empty()),
            _ => {}
        }
    }

    let Some((data, filename)) = audio else {
        return Err(ApiError::bad_request("Audio file is required"));
    };
    let reply = run_transcription(
        &state,
        user_id.as_deref(),
        AudioInput::new(data, filename),
        "direct",
    )
    .await?;
    Ok(Json(reply))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StreamParams {
    user_id: Option<String>,
    filename: Option<String>,
}

/// Raw request body as the audio file. Capped at [`STREAM_LIMIT_MB`].
pub(crate) async fn transcribe_stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
    body: Bytes,
) -> ApiResult<Json<TranscribeReply>> {
    let size_mb = body.len() as f64 / (1024.0 * 1024.0);
    if size_mb > STREAM_LIMIT_MB {
        return Err(ApiError::PayloadTooLarge {
            message: format!(
                "ファイルサイズが大きすぎます ({:.1}MB > {}MB)",
                size_mb, STREAM_LIMIT_MB
            ),
            size_mb,
            max_mb: STREAM_LIMIT_MB,
        });
    }

    let filename = params
        .filename
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
    let user_id = params.user_id.filter(|u| !u.is_empty());
    let reply = run_transcription(
        &state,
        user_id.as_deref(),
        AudioInput::new(body.to_vec(), filename),
        "stream",
    )
    .await?;
    Ok(Json(reply))
}

/// One fragment of a chunked upload. Replies with progress until the last
/// fragment arrives, then with the transcription.
pub(crate) async fn transcribe_chunks(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut action = None;
    let mut upload_id = None;
    let mut index = None;
    let mut total = None;
    let mut data = None;
    let mut filename = None;
    let mut user_id = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "action" => action = Some(field_text(field).await?),
            "uploadId" => upload_id = Some(field_text(field).await?),
            "chunkIndex" => index = field_text(field).await?.trim().parse::<usize>().ok(),
            "totalChunks" => total = field_text(field).await?.trim().parse::<usize>().ok(),
            "chunk" => data = Some(field_bytes(field).await?),
            "filename" => filename = Some(field_text(field).await?).filter(|f| !f.is_empty()),
            "userId" => user_id = Some(field_text(field).await?).filter(|u| !u.is_empty()),
            _ => {}
        }
    }

    if action.as_deref() != Some("upload-chunk") {
        return Err(ApiError::bad_request("Invalid action"));
    }
    let (Some(upload_id), Some(index), Some(total), Some(data)) =
        (upload_id.filter(|u| !u.is_empty()), index, total, data)
    else {
        return Err(ApiError::bad_request("Missing chunk parameters"));
    };

    let progress = state.chunks.add_chunk(Chunk {
        upload_id: upload_id.clone(),
        index,
        total,
        data,
        filename,
        user_id,
    })?;

    match progress {
        ChunkProgress::Pending { received, total } => {
            tracing::debug!(upload_id = %upload_id, received, total, "chunk stored");
            Ok(Json(json!({
                "success": true,
                "chunksReceived": received,
                "totalChunks": total,
                "uploadId": upload_id,
            })))
        }
        ChunkProgress::Complete(upload) => {
            tracing::info!(
                upload_id = %upload.upload_id,
                size_bytes = upload.data.len(),
                "all chunks received"
            );
            let reply = run_transcription(
                &state,
                upload.user_id.as_deref(),
                AudioInput::new(upload.data, upload.filename),
                "chunks",
            )
            .await?;
            Ok(Json(serde_json::to_value(reply).map_err(|e| {
                ApiError::internal("Transcription failed", e)
            })?))
        }
    }
}
