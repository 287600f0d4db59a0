use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::subtitles::{segments_to_srt, srt_filename, telop_to_srt};
use crate::transcription::Segment;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SrtRequest {
    /// Whisper segments; takes priority over `telop`
    #[serde(default)]
    segments: Vec<Segment>,
    /// Telop lines, optionally prefixed with `[m:ss.s]`
    telop: Option<String>,
    /// Name of the source media, used for the download name
    filename: Option<String>,
}

/// Render an SRT file from segments or telop lines.
pub(crate) async fn srt(Json(req): Json<SrtRequest>) -> ApiResult<impl IntoResponse> {
    let (body, suffix) = if !req.segments.is_empty() {
        (segments_to_srt(&req.segments), "transcript")
    } else {
        match req.telop.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(telop) => (telop_to_srt(telop), "telop"),
            None => return Err(ApiError::bad_request("segments or telop is required")),
        }
    };

    let filename = srt_filename(req.filename.as_deref(), "subtitles", suffix);
    Ok((
        [
            (header::CONTENT_TYPE, "application/x-subrip; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    ))
}
