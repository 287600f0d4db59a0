//! SRT rendering for raw segments and timestamped telop lines.

use crate::rewrite::telop::parse_line;
use crate::transcription::Segment;

/// How long a telop cue stays on screen.
pub const TELOP_CUE_SECONDS: f64 = 3.0;

/// `HH:MM:SS,mmm`
pub fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        ms
    )
}

fn push_cue(out: &mut String, index: usize, start: &str, end: &str, text: &str) {
    out.push_str(&format!("{}\n{} --> {}\n{}\n\n", index, start, end, text));
}

/// One cue per segment, numbered from 1.
pub fn segments_to_srt(segments: &[Segment]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        push_cue(
            &mut out,
            i + 1,
            &format_srt_time(segment.start),
            &format_srt_time(segment.end),
            segment.text.trim(),
        );
    }
    out
}

/// One cue per non-blank telop line.
///
/// `[m:ss.s] text` lines run for three seconds from their timestamp and are
/// skipped if the text is empty. Untimed lines get `00:00:00,000 --> 00:00:03,000`.
pub fn telop_to_srt(telop: &str) -> String {
    let mut out = String::new();
    let mut index = 1;
    for line in telop.lines().filter(|l| !l.trim().is_empty()) {
        let (start, text) = parse_line(line);
        let (start, end) = match start {
            Some(_) if text.is_empty() => continue,
            Some(start) => (
                format_srt_time(start),
                format_srt_time(start + TELOP_CUE_SECONDS),
            ),
            None => (format_srt_time(0.0), format_srt_time(TELOP_CUE_SECONDS)),
        };
        push_cue(&mut out, index, &start, &end, &text);
        index += 1;
    }
    out
}

/// Download name: the source file's stem (or `fallback`) plus `_{suffix}.srt`.
pub fn srt_filename(source: Option<&str>, fallback: &str, suffix: &str) -> String {
    let stem = source
        .map(|name| match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        })
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback);
    format!("{}_{}.srt", stem, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(83.4), "00:01:23,400");
        assert_eq!(format_srt_time(3723.25), "01:02:03,250");
    }

    #[test]
    fn test_segments_to_srt() {
        let segments = vec![
            Segment {
                start: 0.0,
                end: 2.5,
                text: "こんにちは".to_string(),
            },
            Segment {
                start: 2.5,
                end: 5.0,
                text: " 今日は ".to_string(),
            },
        ];
        assert_eq!(
            segments_to_srt(&segments),
            "1\n00:00:00,000 --> 00:00:02,500\nこんにちは\n\n\
             2\n00:00:02,500 --> 00:00:05,000\n今日は\n\n"
        );
    }

    #[test]
    fn test_telop_to_srt() {
        let telop = "[1:23.4] 動画編集は大変\n\n[1:30.0]\nタイムスタンプなし";
        assert_eq!(
            telop_to_srt(telop),
            "1\n00:01:23,400 --> 00:01:26,400\n動画編集は大変\n\n\
             2\n00:00:00,000 --> 00:00:03,000\nタイムスタンプなし\n\n"
        );
    }

    #[test]
    fn test_srt_filename() {
        assert_eq!(srt_filename(Some("interview.mp4"), "telop", "telop"), "interview_telop.srt");
        assert_eq!(srt_filename(None, "transcript", "original"), "transcript_original.srt");
        assert_eq!(srt_filename(Some(""), "telop", "telop"), "telop_telop.srt");
    }
}
