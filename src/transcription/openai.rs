//! OpenAI Whisper API client for speech-to-text transcription
//!
//! Sends audio bytes to the transcription endpoint in Japanese with
//! `verbose_json` output so segment timings come back with the text.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

use super::{AudioInput, Segment, Transcriber, Transcript};

pub const TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Shared HTTP client (avoids a TLS handshake per request)
static HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

pub(crate) fn http_client() -> &'static Client {
    HTTP_CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Failed to build tuned HTTP client, using defaults: {}", e);
                Client::new()
            })
    })
}

/// Errors that can occur during transcription
#[derive(Debug)]
pub enum TranscriptionError {
    /// OpenAI API key not configured
    MissingApiKey,
    /// No audio bytes supplied
    EmptyAudio,
    /// Network/HTTP error
    NetworkError(String),
    /// OpenAI API returned an error
    ApiError { status: u16, message: String },
    /// Failed to parse API response
    ParseError(String),
}

impl std::fmt::Display for TranscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptionError::MissingApiKey => {
                write!(
                    f,
                    "OpenAI API key not configured. Set OPENAI_API_KEY environment variable."
                )
            }
            TranscriptionError::EmptyAudio => write!(f, "Audio file is empty"),
            TranscriptionError::NetworkError(e) => write!(f, "Network error: {}", e),
            TranscriptionError::ApiError { status, message } => {
                write!(f, "OpenAI API error ({}): {}", status, message)
            }
            TranscriptionError::ParseError(e) => write!(f, "Failed to parse API response: {}", e),
        }
    }
}

impl std::error::Error for TranscriptionError {}

#[derive(Debug, Deserialize)]
struct WhisperVerboseResponse {
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

/// OpenAI API error response
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Pull the message out of an OpenAI error body, or return the body as-is.
pub(crate) fn api_error_message(body: String) -> String {
    match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body,
    }
}

fn into_transcript(response: WhisperVerboseResponse) -> Transcript {
    Transcript {
        text: response.text,
        segments: response
            .segments
            .into_iter()
            .map(|s| Segment {
                start: s.start,
                end: s.end,
                text: s.text.trim().to_string(),
            })
            .collect(),
        language: response.language,
        duration: response.duration,
        demo: false,
    }
}

pub struct WhisperTranscriber {
    api_key: String,
    url: String,
}

impl WhisperTranscriber {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            url: TRANSCRIPTION_URL.to_string(),
        }
    }

    /// Point at a different endpoint (proxies, tests).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: AudioInput) -> Result<Transcript, TranscriptionError> {
        if self.api_key.is_empty() {
            return Err(TranscriptionError::MissingApiKey);
        }
        if audio.data.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }

        tracing::info!(
            filename = %audio.filename,
            bytes = audio.data.len(),
            "sending audio to whisper"
        );

        let file_part = Part::bytes(audio.data)
            .file_name(audio.filename)
            .mime_str(&audio.mime_type)
            .map_err(|e| TranscriptionError::ParseError(e.to_string()))?;

        let form = Form::new()
            .part("file", file_part)
            .text("model", "whisper-1")
            .text("language", "ja")
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        let response = http_client()
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            let whisper_response: WhisperVerboseResponse = response
                .json()
                .await
                .map_err(|e| TranscriptionError::ParseError(e.to_string()))?;

            let transcript = into_transcript(whisper_response);
            tracing::info!(
                chars = transcript.text.chars().count(),
                segments = transcript.segments.len(),
                duration = ?transcript.duration,
                "transcription successful"
            );
            Ok(transcript)
        } else {
            let message = api_error_message(response.text().await.unwrap_or_default());
            tracing::error!(status = status.as_u16(), %message, "whisper api error");

            Err(TranscriptionError::ApiError {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_error_display() {
        let err = TranscriptionError::MissingApiKey;
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_api_error_display() {
        let err = TranscriptionError::ApiError {
            status: 401,
            message: "Invalid API key".to_string(),
        };
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[test]
    fn test_verbose_response_segments_are_trimmed() {
        let body = r#"{
            "text": "こんにちは。今日は",
            "language": "japanese",
            "duration": 4.5,
            "segments": [
                {"id": 0, "start": 0.0, "end": 2.0, "text": " こんにちは。", "no_speech_prob": 0.01},
                {"id": 1, "start": 2.0, "end": 4.5, "text": "今日は "}
            ]
        }"#;
        let parsed: WhisperVerboseResponse = serde_json::from_str(body).unwrap();
        let transcript = into_transcript(parsed);
        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[0].text, "こんにちは。");
        assert_eq!(transcript.segments[1].text, "今日は");
        assert_eq!(transcript.duration, Some(4.5));
        assert!(!transcript.demo);
    }

    #[test]
    fn test_api_error_message_extraction() {
        let body = r#"{"error": {"message": "Invalid file format.", "type": "invalid_request_error"}}"#;
        assert_eq!(api_error_message(body.to_string()), "Invalid file format.");
        assert_eq!(api_error_message("Bad Gateway".to_string()), "Bad Gateway");
    }

    #[tokio::test]
    async fn test_rejects_without_key_or_audio() {
        let audio = AudioInput::new(vec![1, 2, 3], "a.mp3");
        let err = WhisperTranscriber::new("").transcribe(audio).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::MissingApiKey));

        let empty = AudioInput::new(Vec::new(), "a.mp3");
        let err = WhisperTranscriber::new("sk-test")
            .transcribe(empty)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::EmptyAudio));
    }
}
