//! Canned transcripts for running without an OpenAI key.

use async_trait::async_trait;

use super::{AudioInput, Transcriber, Transcript, TranscriptionError};

const SAMPLE_TEXT: &str = "えー、今日はですね、みなさんにお話ししたいことがあるんですけども、まあ、動画編集っていうのは、あの、とても大変な作業でして、特にテロップの作成なんかは、えー、すごく時間がかかるんですよね。";

const DEFAULT_TEXT: &str = "こんにちは、今日は新しいツールについて説明します。このツールを使うことで、動画編集の作業が大幅に効率化されると思います。まあ、実際に使ってみていただければ分かると思うんですけども。";

/// Returns one of two fixed Japanese monologues, picked by file name.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoTranscriber;

impl DemoTranscriber {
    pub fn text_for(filename: &str) -> &'static str {
        let name = filename.to_lowercase();
        if name.contains("sample") || name.contains("test") {
            SAMPLE_TEXT
        } else {
            DEFAULT_TEXT
        }
    }
}

#[async_trait]
impl Transcriber for DemoTranscriber {
    async fn transcribe(&self, audio: AudioInput) -> Result<Transcript, TranscriptionError> {
        tracing::info!(filename = %audio.filename, "demo mode: returning canned transcript");
        Ok(Transcript {
            text: Self::text_for(&audio.filename).to_string(),
            demo: true,
            ..Transcript::default()
        })
    }

    fn is_demo(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_picks_text_by_filename() {
        let t = DemoTranscriber
            .transcribe(AudioInput::new(vec![1], "My_Sample.mp3"))
            .await
            .unwrap();
        assert!(t.text.starts_with("えー、今日は"));
        assert!(t.demo);
        assert!(t.segments.is_empty());

        let t = DemoTranscriber
            .transcribe(AudioInput::new(vec![1], "interview.m4a"))
            .await
            .unwrap();
        assert!(t.text.starts_with("こんにちは"));
    }
}
