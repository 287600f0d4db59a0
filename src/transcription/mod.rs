//! Speech-to-text.
//!
//! [`WhisperTranscriber`] calls the OpenAI transcription endpoint;
//! [`DemoTranscriber`] answers with canned text when no API key is configured.

mod demo;
mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use demo::DemoTranscriber;
pub(crate) use openai::{api_error_message, http_client};
pub use openai::{TranscriptionError, WhisperTranscriber, TRANSCRIPTION_URL};

/// A timed piece of the transcript, in seconds from the start of the audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Audio handed to a transcriber.
#[derive(Debug, Clone)]
pub struct AudioInput {
    pub data: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

impl AudioInput {
    pub fn new(data: Vec<u8>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let mime_type = mime_for(&filename).to_string();
        Self {
            data,
            filename,
            mime_type,
        }
    }

    pub fn size_mb(&self) -> f64 {
        self.data.len() as f64 / (1024.0 * 1024.0)
    }
}

fn mime_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        "webm" => "audio/webm",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "mpga" | "mpeg" => "audio/mpeg",
        _ => "audio/mpeg",
    }
}

/// Transcriber output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<Segment>,
    pub language: Option<String>,
    /// Audio length in seconds, when the service reports it
    pub duration: Option<f64>,
    /// True when produced without calling the external service
    #[serde(skip)]
    pub demo: bool,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: AudioInput) -> Result<Transcript, TranscriptionError>;

    /// Whether results come from the canned demo source.
    fn is_demo(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(AudioInput::new(vec![], "clip.WAV").mime_type, "audio/wav");
        assert_eq!(AudioInput::new(vec![], "clip.m4a").mime_type, "audio/mp4");
        assert_eq!(AudioInput::new(vec![], "noext").mime_type, "audio/mpeg");
    }

    #[test]
    fn test_size_mb() {
        let audio = AudioInput::new(vec![0; 2 * 1024 * 1024], "a.mp3");
        assert!((audio.size_mb() - 2.0).abs() < f64::EPSILON);
    }
}
