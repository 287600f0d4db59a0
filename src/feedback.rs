//! User feedback log.
//!
//! Entries are appended to `{data_dir}/feedback/feedback.json` and a count
//! summary is rewritten to `summary.json` next to it on every submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::settings::{read_json, write_json_atomic, SettingsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Feedback,
    Bug,
    Feature,
}

impl FeedbackKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "feedback" => Some(FeedbackKind::Feedback),
            "bug" => Some(FeedbackKind::Bug),
            "feature" => Some(FeedbackKind::Feature),
            _ => None,
        }
    }
}

/// What a client submits.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSubmission {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub rating: Option<u8>,
    pub timestamp: Option<DateTime<Utc>>,
    pub user_agent: Option<String>,
    pub url: Option<String>,
}

/// A stored entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FeedbackKind,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub rating: Option<u8>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub processed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeCount {
    pub feedback: usize,
    pub bug: usize,
    pub feature: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSummary {
    pub total_count: usize,
    pub unprocessed_count: usize,
    pub type_count: TypeCount,
    pub last_updated: Option<DateTime<Utc>>,
}

impl FeedbackSummary {
    pub fn from_entries(entries: &[FeedbackEntry], now: DateTime<Utc>) -> Self {
        let count = |kind| entries.iter().filter(|e| e.kind == kind).count();
        Self {
            total_count: entries.len(),
            unprocessed_count: entries.iter().filter(|e| !e.processed).count(),
            type_count: TypeCount {
                feedback: count(FeedbackKind::Feedback),
                bug: count(FeedbackKind::Bug),
                feature: count(FeedbackKind::Feature),
            },
            last_updated: Some(now),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("メッセージは必須です")]
    MissingMessage,
    #[error("無効なフィードバックタイプです")]
    InvalidKind,
    #[error(transparent)]
    Storage(#[from] SettingsError),
}

pub struct FeedbackStore {
    entries_path: PathBuf,
    summary_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FeedbackStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref().join("feedback");
        Self {
            entries_path: dir.join("feedback.json"),
            summary_path: dir.join("summary.json"),
            write_lock: Mutex::new(()),
        }
    }

    async fn load_entries(&self) -> Vec<FeedbackEntry> {
        match read_json(&self.entries_path).await {
            Ok(Some(entries)) => entries,
            Ok(None) => Vec::new(),
            Err(e) => {
                log::error!("Feedback: failed to read {:?}: {}", self.entries_path, e);
                Vec::new()
            }
        }
    }

    /// Validate and append a submission. Returns the stored entry.
    pub async fn submit(
        &self,
        submission: FeedbackSubmission,
        now: DateTime<Utc>,
    ) -> Result<FeedbackEntry, FeedbackError> {
        let message = submission
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or(FeedbackError::MissingMessage)?
            .to_string();
        let kind = submission
            .kind
            .as_deref()
            .and_then(FeedbackKind::parse)
            .ok_or(FeedbackError::InvalidKind)?;

        let entry = FeedbackEntry {
            id: format!("feedback_{}", uuid::Uuid::new_v4().simple()),
            kind,
            email: submission.email.unwrap_or_default(),
            subject: submission.subject.unwrap_or_default(),
            message,
            rating: submission.rating.filter(|r| *r > 0),
            timestamp: submission.timestamp.unwrap_or(now),
            user_agent: submission.user_agent.unwrap_or_default(),
            url: submission.url.unwrap_or_default(),
            processed: false,
        };

        let _guard = self.write_lock.lock().await;
        let mut entries = self.load_entries().await;
        entries.push(entry.clone());
        write_json_atomic(&self.entries_path, &entries).await?;
        write_json_atomic(
            &self.summary_path,
            &FeedbackSummary::from_entries(&entries, now),
        )
        .await?;

        log::info!(
            "Feedback: received {:?} {} (rating={:?})",
            entry.kind,
            entry.id,
            entry.rating
        );
        Ok(entry)
    }

    /// All entries, newest first.
    pub async fn list(&self) -> Vec<FeedbackEntry> {
        let mut entries = self.load_entries().await;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    /// The stored summary, or an empty one if nothing was ever submitted.
    pub async fn summary(&self) -> Result<FeedbackSummary, SettingsError> {
        Ok(read_json(&self.summary_path).await?.unwrap_or_default())
    }
}
