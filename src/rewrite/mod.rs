//! Telop rewriting.
//!
//! Turns a raw transcript into short caption lines. Two rewriters exist:
//! - [`OpenAiRewriter`]: chat-completions call with a telop prompt
//! - [`DemoRewriter`]: local filler removal and sentence trimming
//!
//! [`pipeline::rewrite`] runs either one and normalises the output.

mod demo;
pub mod pipeline;
mod prompt;
pub mod telop;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::transcription::Segment;

pub use demo::DemoRewriter;
pub use prompt::{OpenAiRewriter, RewriteError, CHAT_COMPLETIONS_URL};

/// How aggressively the transcript is condensed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryLevel {
    /// Keep most of the content (70-80%, 15-20 chars per line)
    Detailed,
    /// Moderate summary (40-60%, 12-16 chars per line)
    #[default]
    Standard,
    /// Core points only (20-40%, 8-12 chars per line)
    Concise,
}

impl SummaryLevel {
    /// Map the client's numeric level. Anything but 1, 2 or 3 means Standard.
    pub fn from_level(level: i64) -> Self {
        match level {
            1 => SummaryLevel::Detailed,
            3 => SummaryLevel::Concise,
            _ => SummaryLevel::Standard,
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            SummaryLevel::Detailed => 1,
            SummaryLevel::Standard => 2,
            SummaryLevel::Concise => 3,
        }
    }

    /// Target length relative to the source, as shown in the prompt.
    pub fn ratio_label(&self) -> &'static str {
        match self {
            SummaryLevel::Detailed => "70-80%",
            SummaryLevel::Standard => "40-60%",
            SummaryLevel::Concise => "20-40%",
        }
    }

    /// Target characters per line, as shown in the prompt.
    pub fn line_length_label(&self) -> &'static str {
        match self {
            SummaryLevel::Detailed => "15-20文字",
            SummaryLevel::Standard => "12-16文字",
            SummaryLevel::Concise => "8-12文字",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SummaryLevel::Detailed => "重要な内容を詳しく残す",
            SummaryLevel::Standard => "要点を適度に要約",
            SummaryLevel::Concise => "最重要な核心のみ抽出",
        }
    }

    /// Share of sentences kept by the demo rewriter.
    pub fn keep_ratio(&self) -> f64 {
        match self {
            SummaryLevel::Detailed => 0.8,
            SummaryLevel::Standard => 0.5,
            SummaryLevel::Concise => 0.3,
        }
    }

    /// Longest line the demo rewriter emits, in characters.
    pub fn max_line_chars(&self) -> usize {
        match self {
            SummaryLevel::Detailed => 20,
            SummaryLevel::Standard => 16,
            SummaryLevel::Concise => 12,
        }
    }
}

impl Serialize for SummaryLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.level())
    }
}

impl<'de> Deserialize<'de> for SummaryLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .map(SummaryLevel::from_level)
            .unwrap_or_default())
    }
}

impl std::fmt::Display for SummaryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// Input to a rewriter.
#[derive(Debug, Clone, Default)]
pub struct RewriteRequest {
    pub text: String,
    pub segments: Vec<Segment>,
    pub level: SummaryLevel,
}

#[async_trait]
pub trait Rewriter: Send + Sync {
    async fn rewrite(&self, request: &RewriteRequest) -> Result<String, RewriteError>;

    /// Whether output comes from the local heuristic.
    fn is_demo(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_level_is_standard() {
        assert_eq!(SummaryLevel::from_level(1), SummaryLevel::Detailed);
        assert_eq!(SummaryLevel::from_level(3), SummaryLevel::Concise);
        assert_eq!(SummaryLevel::from_level(0), SummaryLevel::Standard);
        assert_eq!(SummaryLevel::from_level(7), SummaryLevel::Standard);
    }

    #[test]
    fn test_level_deserialization_is_lenient() {
        let level: SummaryLevel = serde_json::from_str("3").unwrap();
        assert_eq!(level, SummaryLevel::Concise);
        let level: SummaryLevel = serde_json::from_str("\"1\"").unwrap();
        assert_eq!(level, SummaryLevel::Detailed);
        let level: SummaryLevel = serde_json::from_str("null").unwrap();
        assert_eq!(level, SummaryLevel::Standard);
        assert_eq!(serde_json::to_string(&SummaryLevel::Concise).unwrap(), "3");
    }
}
