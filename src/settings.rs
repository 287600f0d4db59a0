//! File-backed email report settings.
//!
//! One process-wide record lives at `{data_dir}/settings/email-settings.json`
//! and is read and written wholesale.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::sync::Mutex;

const SETTINGS_DIR: &str = "settings";
const SETTINGS_FILE_NAME: &str = "email-settings.json";

static EMAIL_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"));

static SEND_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-1]?[0-9]|2[0-3]):[0-5][0-9]$").expect("static regex"));

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{action} {path:?}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmailSettings {
    pub enabled: bool,
    pub email_addresses: Vec<String>,
    /// Local send time, `H:MM` or `HH:MM` (24h)
    pub send_time: String,
    pub include_stats: bool,
    pub include_user_activity: bool,
    pub include_cost_breakdown: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sent: Option<DateTime<Utc>>,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            email_addresses: Vec::new(),
            send_time: "09:00".to_string(),
            include_stats: true,
            include_user_activity: true,
            include_cost_breakdown: true,
            last_sent: None,
        }
    }
}

/// Simple `local@domain.tld` shape check.
pub fn is_valid_email(address: &str) -> bool {
    EMAIL_ADDRESS.is_match(address)
}

impl EmailSettings {
    /// Check the record before saving. Messages are shown to the administrator.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.enabled {
            if self.email_addresses.is_empty() {
                return Err(SettingsError::Invalid(
                    "メールアドレスを少なくとも1つ設定してください".to_string(),
                ));
            }
            for address in &self.email_addresses {
                if !is_valid_email(address) {
                    return Err(SettingsError::Invalid(format!(
                        "有効なメールアドレス形式で入力してください: {}",
                        address
                    )));
                }
            }
            let mut seen = std::collections::HashSet::new();
            if !self.email_addresses.iter().all(|a| seen.insert(a)) {
                return Err(SettingsError::Invalid(
                    "重複するメールアドレスが含まれています".to_string(),
                ));
            }
        }

        if !SEND_TIME.is_match(&self.send_time) {
            return Err(SettingsError::Invalid(
                "有効な時刻を入力してください（HH:MM形式）".to_string(),
            ));
        }
        Ok(())
    }

    /// Send time as minutes after local midnight.
    pub fn send_minutes(&self) -> Option<u32> {
        if !SEND_TIME.is_match(&self.send_time) {
            return None;
        }
        let (hour, minute) = self.send_time.split_once(':')?;
        Some(hour.parse::<u32>().ok()? * 60 + minute.parse::<u32>().ok()?)
    }
}

/// Write `value` as pretty JSON to `path` atomically.
///
/// Writes to a temp file in the same directory, then renames over `path`,
/// so a crash mid-write never leaves a truncated file.
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| SettingsError::Io {
                action: "create directory",
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let contents = serde_json::to_string_pretty(value)?;

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &contents)
        .await
        .map_err(|source| SettingsError::Io {
            action: "write temp file",
            path: tmp_path.clone(),
            source,
        })?;

    // Windows refuses to rename over an existing file.
    if cfg!(windows) {
        if let Err(source) = tokio::fs::remove_file(path).await {
            if source.kind() != std::io::ErrorKind::NotFound {
                return Err(SettingsError::Io {
                    action: "remove existing file",
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|source| SettingsError::Io {
            action: "rename temp file",
            path: path.to_path_buf(),
            source,
        })
}

/// Read JSON from `path`. Missing files give `Ok(None)`.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, SettingsError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SettingsError::Io {
            action: "read",
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub struct EmailSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl EmailSettingsStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(SETTINGS_DIR).join(SETTINGS_FILE_NAME),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored record, or None if nothing was ever saved.
    pub async fn load_existing(&self) -> Result<Option<EmailSettings>, SettingsError> {
        read_json(&self.path).await
    }

    /// The stored record, falling back to defaults when missing or unreadable.
    pub async fn load(&self) -> EmailSettings {
        match self.load_existing().await {
            Ok(Some(settings)) => settings,
            Ok(None) => EmailSettings::default(),
            Err(e) => {
                log::warn!("Settings: failed to load {:?}: {}", self.path, e);
                EmailSettings::default()
            }
        }
    }

    /// Validate and store `settings`, keeping the stored `lastSent`.
    pub async fn save(&self, mut settings: EmailSettings) -> Result<EmailSettings, SettingsError> {
        settings.validate()?;

        let _guard = self.write_lock.lock().await;
        settings.last_sent = self.load().await.last_sent;
        write_json_atomic(&self.path, &settings).await?;

        log::info!(
            "Settings: email reports enabled={} recipients={} time={} (stats={}, activity={}, cost={})",
            settings.enabled,
            settings.email_addresses.len(),
            settings.send_time,
            settings.include_stats,
            settings.include_user_activity,
            settings.include_cost_breakdown
        );
        Ok(settings)
    }

    /// Stamp `lastSent` on the stored record.
    pub async fn mark_sent(&self, at: DateTime<Utc>) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.load().await;
        settings.last_sent = Some(at);
        write_json_atomic(&self.path, &settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn enabled_with(addresses: &[&str]) -> EmailSettings {
        EmailSettings {
            enabled: true,
            email_addresses: addresses.iter().map(|s| s.to_string()).collect(),
            ..EmailSettings::default()
        }
    }

    #[test]
    fn test_defaults() {
        let settings = EmailSettings::default();
        assert!(!settings.enabled);
        assert_eq!(settings.send_time, "09:00");
        assert!(settings.include_stats && settings.include_user_activity);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_enabled_requires_addresses() {
        assert!(matches!(
            enabled_with(&[]).validate(),
            Err(SettingsError::Invalid(msg)) if msg.contains("少なくとも1つ")
        ));
    }

    #[test]
    fn test_rejects_malformed_and_duplicate_addresses() {
        assert!(enabled_with(&["admin@example.com"]).validate().is_ok());
        assert!(enabled_with(&["admin@example"]).validate().is_err());
        assert!(enabled_with(&["no at sign.com"]).validate().is_err());
        assert!(matches!(
            enabled_with(&["a@example.com", "a@example.com"]).validate(),
            Err(SettingsError::Invalid(msg)) if msg.contains("重複")
        ));
    }

    #[test]
    fn test_disabled_skips_address_checks() {
        let settings = EmailSettings {
            enabled: false,
            email_addresses: vec!["not-an-address".to_string()],
            ..EmailSettings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_send_time_format() {
        for ok in ["0:00", "9:05", "09:30", "23:59"] {
            let s = EmailSettings {
                send_time: ok.to_string(),
                ..EmailSettings::default()
            };
            assert!(s.validate().is_ok(), "{ok}");
        }
        for bad in ["24:00", "9:60", "0930", "noon"] {
            let s = EmailSettings {
                send_time: bad.to_string(),
                ..EmailSettings::default()
            };
            assert!(s.validate().is_err(), "{bad}");
        }
        let s = EmailSettings {
            send_time: "7:45".to_string(),
            ..EmailSettings::default()
        };
        assert_eq!(s.send_minutes(), Some(465));
    }

    #[tokio::test]
    async fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmailSettingsStore::new(dir.path());
        assert!(store.load_existing().await.unwrap().is_none());
        assert_eq!(store.load().await, EmailSettings::default());
    }

    #[tokio::test]
    async fn test_save_preserves_last_sent() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmailSettingsStore::new(dir.path());
        let sent_at = Utc.with_ymd_and_hms(2025, 5, 1, 0, 3, 0).unwrap();

        store
            .save(enabled_with(&["ops@example.com"]))
            .await
            .unwrap();
        store.mark_sent(sent_at).await.unwrap();

        let mut update = enabled_with(&["ops@example.com", "boss@example.com"]);
        update.last_sent = None;
        let saved = store.save(update).await.unwrap();
        assert_eq!(saved.last_sent, Some(sent_at));

        let loaded = store.load_existing().await.unwrap().unwrap();
        assert_eq!(loaded.email_addresses.len(), 2);
        assert_eq!(loaded.last_sent, Some(sent_at));
        assert!(store.path().exists());
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_invalid_settings_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmailSettingsStore::new(dir.path());
        assert!(store.save(enabled_with(&[])).await.is_err());
        assert!(store.load_existing().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmailSettingsStore::new(dir.path());
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load().await, EmailSettings::default());
        assert!(store.load_existing().await.is_err());
    }
}
