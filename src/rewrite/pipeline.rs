//! Runs a rewriter and normalises its output into telop lines.

use std::time::Instant;
use tracing::info;

use super::{telop, RewriteError, RewriteRequest, Rewriter};

/// Result of a rewrite run.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteOutcome {
    /// Final caption lines, newline separated
    pub text: String,
    /// Produced by the local heuristic instead of the model
    pub demo: bool,
    /// Processing time in milliseconds
    pub duration_ms: u64,
}

/// Rewrite `request.text` with `rewriter`.
///
/// Model output is passed through [`telop::finalize`]; demo output is
/// already in final form.
pub async fn rewrite(
    rewriter: &dyn Rewriter,
    request: &RewriteRequest,
) -> Result<RewriteOutcome, RewriteError> {
    let start = Instant::now();
    let demo = rewriter.is_demo();

    let raw = rewriter.rewrite(request).await?;
    let text = if demo {
        raw
    } else {
        telop::finalize(&raw, &request.segments)
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        level = %request.level,
        segments = request.segments.len(),
        input_len = request.text.len(),
        output_len = text.len(),
        duration_ms,
        demo,
        "Rewrite pipeline completed"
    );

    Ok(RewriteOutcome {
        text,
        demo,
        duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::{DemoRewriter, SummaryLevel};
    use crate::transcription::Segment;
    use async_trait::async_trait;

    struct CannedRewriter(&'static str);

    #[async_trait]
    impl Rewriter for CannedRewriter {
        async fn rewrite(&self, _request: &RewriteRequest) -> Result<String, RewriteError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingRewriter;

    #[async_trait]
    impl Rewriter for FailingRewriter {
        async fn rewrite(&self, _request: &RewriteRequest) -> Result<String, RewriteError> {
            Err(RewriteError::Api {
                status: 500,
                message: "upstream down".to_string(),
            })
        }
    }

    fn request_with_segments() -> RewriteRequest {
        RewriteRequest {
            text: "動画編集は大変です。テロップ作成に時間がかかります。".to_string(),
            segments: vec![
                Segment {
                    start: 0.0,
                    end: 3.0,
                    text: "動画編集は大変です。".to_string(),
                },
                Segment {
                    start: 3.0,
                    end: 6.5,
                    text: "テロップ作成に時間がかかります。".to_string(),
                },
            ],
            level: SummaryLevel::Standard,
        }
    }

    #[tokio::test]
    async fn test_model_output_is_finalized() {
        let rewriter = CannedRewriter("動画編集は大変。\nテロップ作成に時間、");
        let outcome = rewrite(&rewriter, &request_with_segments()).await.unwrap();
        assert_eq!(
            outcome.text,
            "[0:00.0] 動画編集は大変\n[0:03.0] テロップ作成に時間"
        );
        assert!(!outcome.demo);
    }

    #[tokio::test]
    async fn test_demo_output_is_used_as_is() {
        let outcome = rewrite(&DemoRewriter, &request_with_segments()).await.unwrap();
        assert!(outcome.demo);
        assert!(outcome.text.starts_with("[0:00.0] "));
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let err = rewrite(&FailingRewriter, &request_with_segments())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("upstream down"));
    }
}
