//! OpenAI chat-completions rewriter.
//!
//! Builds a telop-writing prompt for the requested summary level, includes
//! segment timings when available, and retries with exponential backoff on
//! rate limits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use super::telop::format_timestamp;
use super::{RewriteRequest, Rewriter, SummaryLevel};
use crate::transcription::Segment;

pub const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Model to use for rewriting.
const MODEL: &str = "gpt-4";

/// Maximum retries on rate limit errors.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const BASE_DELAY_MS: u64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("OpenAI API key not configured")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Network(String),
    #[error("OpenAI API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl RewriteError {
    fn is_rate_limit(&self) -> bool {
        matches!(self, RewriteError::Api { status: 429, .. })
    }
}

/// Request body for Chat Completions API.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// System prompt for the given level. The timed variant asks for
/// `[m:ss.s]` prefixes and key points only.
pub(crate) fn system_prompt(level: SummaryLevel, timed: bool) -> String {
    let header = if timed {
        "あなたは動画のテロップ作成の専門家です。元の音声の要点を抽出し、テロップ用の短文に変換してください。"
    } else {
        "あなたは動画のテロップ作成の専門家です。話し言葉を読みやすいテロップ用の短文に変換してください。"
    };

    let rules = if timed {
        format!(
            "- 元の文章の{ratio}程度の長さに要約\n\
             - 重要な内容のみを抽出（全文ではなく要点のみ）\n\
             - 「えー」「あの」「まあ」「そのー」などの口癖・間投詞は完全削除\n\
             - 冗長な表現や繰り返しを削除し、核心のみ残す\n\
             - 1行{length}程度で簡潔に\n\
             - 意味のある重要な部分のみ選択\n\
             - 読みやすく印象的なキーワードを重視\n\
             - 各行の先頭にタイムスタンプを [MM:SS.S] 形式で付与\n\
             - テロップの末尾の「、」「。」は除去（テロップらしく簡潔に）\n\n\
             出力形式：\n\
             重要な部分のみを選択し、行頭にタイムスタンプを付けて出力してください。\n\
             例: [1:23.4] 動画編集は大変\n\
             例: [1:28.1] テロップ作成に時間がかかる",
            ratio = level.ratio_label(),
            length = level.line_length_label(),
        )
    } else {
        format!(
            "- 元の文章の{ratio}程度の長さに要約\n\
             - 「えー」「あの」「まあ」などの口癖・間投詞は削除\n\
             - 冗長な表現を簡潔に\n\
             - 1行{length}程度で自然な改行\n\
             - 意味のまとまりで区切る\n\
             - 読みやすいリズムを重視\n\
             - 話し言葉の自然さを保持\n\
             - テロップの末尾の「、」「。」は除去（テロップらしく簡潔に）\n\n\
             出力形式：\n\
             各行を改行で区切って出力してください。",
            ratio = level.ratio_label(),
            length = level.line_length_label(),
        )
    };

    format!(
        "{}\n\n要約レベル: {} ({})\n\n以下のルールに従ってください：\n{}",
        header,
        level.level(),
        level.description(),
        rules
    )
}

/// User message: the transcript, followed by numbered segment timings if any.
pub(crate) fn user_content(text: &str, segments: &[Segment]) -> String {
    if segments.is_empty() {
        return text.to_string();
    }
    let timings = segments
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. [{}] {}", i + 1, format_timestamp(s.start), s.text))
        .collect::<Vec<_>>()
        .join("\n");
    format!("元のテキスト: {}\n\nタイムスタンプ情報:\n{}", text, timings)
}

pub struct OpenAiRewriter {
    api_key: String,
    url: String,
}

impl OpenAiRewriter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            url: CHAT_COMPLETIONS_URL.to_string(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn make_request(&self, request: &ChatRequest) -> Result<Option<String>, RewriteError> {
        let response = crate::transcription::http_client()
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(request)
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .map_err(|e| RewriteError::Network(e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            let chat_response: ChatResponse = response
                .json()
                .await
                .map_err(|e| RewriteError::Parse(e.to_string()))?;

            Ok(chat_response
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RewriteError::Api {
                status: status.as_u16(),
                message: crate::transcription::api_error_message(body),
            })
        }
    }
}

#[async_trait]
impl Rewriter for OpenAiRewriter {
    async fn rewrite(&self, request: &RewriteRequest) -> Result<String, RewriteError> {
        if self.api_key.is_empty() {
            return Err(RewriteError::MissingApiKey);
        }

        let timed = !request.segments.is_empty();
        let chat = ChatRequest {
            model: MODEL.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt(request.level, timed),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_content(&request.text, &request.segments),
                },
            ],
            temperature: 0.7,
        };

        let mut attempt = 0;
        loop {
            match self.make_request(&chat).await {
                Ok(Some(text)) => {
                    debug!(
                        input_len = request.text.len(),
                        output_len = text.len(),
                        "Rewrite succeeded"
                    );
                    return Ok(text);
                }
                Ok(None) => {
                    warn!("Model returned no content, keeping original text");
                    return Ok(request.text.clone());
                }
                Err(err) if err.is_rate_limit() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    // Exponential backoff: 1s, 2s, 4s
                    let delay = BASE_DELAY_MS * 2u64.pow(attempt - 1);
                    warn!(attempt, delay_ms = delay, error = %err, "Rate limit hit, will retry");
                    sleep(Duration::from_millis(delay)).await;
                }
                Err(err) => {
                    error!(error = %err, "Rewrite failed");
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_reflects_level() {
        let prompt = system_prompt(SummaryLevel::Concise, false);
        assert!(prompt.contains("20-40%"));
        assert!(prompt.contains("8-12文字"));
        assert!(prompt.contains("要約レベル: 3"));
        assert!(!prompt.contains("タイムスタンプ"));
    }

    #[test]
    fn test_timed_prompt_requests_timestamps() {
        let prompt = system_prompt(SummaryLevel::Standard, true);
        assert!(prompt.contains("[MM:SS.S]"));
        assert!(prompt.contains("40-60%"));
    }

    #[test]
    fn test_user_content_lists_segments() {
        let segments = vec![
            Segment {
                start: 0.0,
                end: 2.0,
                text: "こんにちは".to_string(),
            },
            Segment {
                start: 65.5,
                end: 67.0,
                text: "次の話題".to_string(),
            },
        ];
        let content = user_content("こんにちは 次の話題", &segments);
        assert!(content.starts_with("元のテキスト: こんにちは 次の話題"));
        assert!(content.contains("1. [0:00.0] こんにちは"));
        assert!(content.contains("2. [1:05.5] 次の話題"));
        assert_eq!(user_content("plain", &[]), "plain");
    }

    #[test]
    fn test_rate_limit_detection() {
        let limited = RewriteError::Api {
            status: 429,
            message: "Rate limit reached".to_string(),
        };
        assert!(limited.is_rate_limit());
        let other = RewriteError::Api {
            status: 400,
            message: "bad".to_string(),
        };
        assert!(!other.is_rate_limit());
    }

    #[tokio::test]
    async fn test_no_api_key() {
        let request = RewriteRequest {
            text: "テスト".to_string(),
            ..RewriteRequest::default()
        };
        let err = OpenAiRewriter::new("").rewrite(&request).await.unwrap_err();
        assert!(matches!(err, RewriteError::MissingApiKey));
    }
}
