//! Local rewriter used when no OpenAI key is configured.
//!
//! Produces telop-like lines by:
//! - Removing verbal fillers (えー, あの, まあ, ...)
//! - Splitting into sentences and keeping a level-dependent share
//! - Truncating each line to the level's character budget
//! - Prefixing evenly spaced segment timestamps when segments are given

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use super::telop::{format_timestamp, strip_trailing_punctuation};
use super::{RewriteError, RewriteRequest, Rewriter, SummaryLevel};
use crate::transcription::Segment;

/// Fillers and padding phrases removed before summarising.
static FILLERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("えー|あの|まあ|そのー|うーん|ですね|んですけど|というのは|ですよね")
        .expect("static regex")
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Sentences shorter than this (in characters) are dropped.
const MIN_SENTENCE_CHARS: usize = 6;

/// Rewrite `text` locally.
pub fn process(text: &str, segments: &[Segment], level: SummaryLevel) -> String {
    let cleaned = FILLERS.replace_all(text, "");
    let cleaned = WHITESPACE.replace_all(&cleaned, " ");
    let cleaned = cleaned.trim();

    let sentences: Vec<&str> = cleaned
        .split(['。', '！', '？'])
        .filter(|s| !s.trim().is_empty())
        .collect();
    let keep = (sentences.len() as f64 * level.keep_ratio()).ceil() as usize;

    let points: Vec<String> = sentences
        .iter()
        .filter(|s| s.chars().count() >= MIN_SENTENCE_CHARS)
        .map(|s| s.trim())
        .take(keep)
        .map(|s| s.chars().take(level.max_line_chars()).collect::<String>())
        .map(|s| strip_trailing_punctuation(&s))
        .collect();

    if segments.is_empty() || points.is_empty() {
        return points.join("\n");
    }

    let per_point = segments.len().div_ceil(points.len());
    points
        .iter()
        .enumerate()
        .map(|(i, point)| match segments.get(i * per_point) {
            Some(segment) => format!("[{}] {}", format_timestamp(segment.start), point),
            None => point.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DemoRewriter;

#[async_trait]
impl Rewriter for DemoRewriter {
    async fn rewrite(&self, request: &RewriteRequest) -> Result<String, RewriteError> {
        Ok(process(&request.text, &request.segments, request.level))
    }

    fn is_demo(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONOLOGUE: &str = "えー、今日はですね、みなさんにお話ししたいことがあるんですけども。まあ、動画編集っていうのは、あの、とても大変な作業です。特にテロップの作成は、えー、すごく時間がかかります。";

    #[test]
    fn test_fillers_removed() {
        let out = process(MONOLOGUE, &[], SummaryLevel::Detailed);
        assert!(!out.contains("えー"));
        assert!(!out.contains("まあ"));
        assert!(!out.contains("あの"));
    }

    #[test]
    fn test_line_length_follows_level() {
        for level in [
            SummaryLevel::Detailed,
            SummaryLevel::Standard,
            SummaryLevel::Concise,
        ] {
            let out = process(MONOLOGUE, &[], level);
            assert!(!out.is_empty());
            for line in out.lines() {
                assert!(line.chars().count() <= level.max_line_chars(), "{line}");
                assert!(!line.ends_with('、') && !line.ends_with('。'));
            }
        }
    }

    #[test]
    fn test_concise_keeps_fewer_lines() {
        let detailed = process(MONOLOGUE, &[], SummaryLevel::Detailed).lines().count();
        let concise = process(MONOLOGUE, &[], SummaryLevel::Concise).lines().count();
        assert_eq!(detailed, 3);
        assert_eq!(concise, 1);
    }

    #[test]
    fn test_timestamps_from_segments() {
        let segments: Vec<Segment> = (0..6)
            .map(|i| Segment {
                start: i as f64 * 10.0,
                end: i as f64 * 10.0 + 10.0,
                text: String::new(),
            })
            .collect();
        let out = process(MONOLOGUE, &segments, SummaryLevel::Detailed);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("[0:00.0] "));
        assert!(lines[1].starts_with("[0:20.0] "));
        assert!(lines[2].starts_with("[0:40.0] "));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(process("", &[], SummaryLevel::Standard), "");
    }
}
