//! Caption line formatting: `[m:ss.s]` timestamps and trailing punctuation.

use regex::Regex;
use std::sync::LazyLock;

use crate::transcription::Segment;

static TRAILING_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[、。]+$").expect("static regex"));

static TIMESTAMPED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\[[\d:.]+\])\s*(.*)$").expect("static regex"));

/// `m:ss.s`, minutes unpadded. Rounded to tenths before carrying into minutes.
pub fn format_timestamp(seconds: f64) -> String {
    let tenths = (seconds.max(0.0) * 10.0).round() as u64;
    let minutes = tenths / 600;
    let rest = tenths % 600;
    format!("{}:{:02}.{}", minutes, rest / 10, rest % 10)
}

/// Drop trailing `、` and `。`.
pub fn strip_trailing_punctuation(line: &str) -> String {
    TRAILING_PUNCTUATION.replace(line, "").into_owned()
}

/// Stamp each non-blank line with the start of an evenly spaced segment.
///
/// Line `i` gets segment `min(i * step, len - 1)` where
/// `step = max(1, segments / lines)`.
pub fn stamp_lines(text: &str, segments: &[Segment]) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if segments.is_empty() || lines.is_empty() {
        return text.to_string();
    }

    let step = (segments.len() / lines.len()).max(1);
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let segment = &segments[(i * step).min(segments.len() - 1)];
            format!(
                "[{}] {}",
                format_timestamp(segment.start),
                strip_trailing_punctuation(line)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Final clean-up of rewriter output.
///
/// When `segments` is non-empty and the text carries no timestamps, lines
/// are stamped first. Every line then loses trailing punctuation and blank
/// lines are dropped.
pub fn finalize(text: &str, segments: &[Segment]) -> String {
    let stamped;
    let text = if !segments.is_empty() && !text.contains('[') {
        stamped = stamp_lines(text, segments);
        stamped.as_str()
    } else {
        text
    };

    text.lines()
        .map(|line| match TIMESTAMPED_LINE.captures(line.trim()) {
            Some(caps) => format!(
                "{} {}",
                &caps[1],
                strip_trailing_punctuation(caps[2].trim_end())
            ),
            None => strip_trailing_punctuation(line.trim()),
        })
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A caption line split into its optional start time (seconds) and text.
pub fn parse_line(line: &str) -> (Option<f64>, String) {
    let trimmed = line.trim();
    if let Some(caps) = TIMESTAMPED_LINE.captures(trimmed) {
        let stamp = caps[1].trim_start_matches('[').trim_end_matches(']');
        if let Some(seconds) = parse_timestamp(stamp) {
            return (Some(seconds), caps[2].trim().to_string());
        }
    }
    (None, trimmed.to_string())
}

/// Parse `m:ss.s` (or `h:mm:ss.s`) into seconds.
pub fn parse_timestamp(stamp: &str) -> Option<f64> {
    let mut total = 0.0;
    for part in stamp.split(':') {
        let value: f64 = part.parse().ok()?;
        total = total * 60.0 + value;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64) -> Segment {
        Segment {
            start,
            end: start + 2.0,
            text: String::new(),
        }
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "0:00.0");
        assert_eq!(format_timestamp(5.3), "0:05.3");
        assert_eq!(format_timestamp(83.4), "1:23.4");
        assert_eq!(format_timestamp(600.0), "10:00.0");
        assert_eq!(format_timestamp(59.96), "1:00.0");
        assert_eq!(format_timestamp(119.94), "1:59.9");
    }

    #[test]
    fn test_strip_trailing_punctuation() {
        assert_eq!(strip_trailing_punctuation("動画編集は大変。"), "動画編集は大変");
        assert_eq!(strip_trailing_punctuation("まず、"), "まず");
        assert_eq!(strip_trailing_punctuation("途中、です"), "途中、です");
    }

    #[test]
    fn test_finalize_stamps_untimed_output() {
        let segments = vec![seg(0.0), seg(2.5), seg(5.0), seg(7.5)];
        let out = finalize("動画編集は大変。\n\nテロップ作成に時間がかかる、", &segments);
        assert_eq!(out, "[0:00.0] 動画編集は大変\n[0:05.0] テロップ作成に時間がかかる");
    }

    #[test]
    fn test_finalize_more_lines_than_segments() {
        let segments = vec![seg(1.0)];
        let out = finalize("a\nb", &segments);
        assert_eq!(out, "[0:01.0] a\n[0:01.0] b");
    }

    #[test]
    fn test_finalize_keeps_existing_timestamps() {
        let out = finalize("[1:23.4]   動画編集は大変。\n補足。\n", &[seg(0.0)]);
        assert_eq!(out, "[1:23.4] 動画編集は大変\n補足");
    }

    #[test]
    fn test_finalize_without_segments() {
        let out = finalize("  一行目。 \n\n二行目、\n", &[]);
        assert_eq!(out, "一行目\n二行目");
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("[1:23.4] 字幕"), (Some(83.4), "字幕".to_string()));
        assert_eq!(parse_line("字幕"), (None, "字幕".to_string()));
        let (start, _) = parse_line("[0:05.0]");
        assert_eq!(start, Some(5.0));
    }
}
