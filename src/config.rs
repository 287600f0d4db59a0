//! Process configuration read from the environment.
//!
//! Secrets are held here but never logged; [`AppConfig::presence`] reports
//! only whether each variable is set.

use chrono::{FixedOffset, Offset, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Value shipped in `.env.example`; treated the same as no key.
const PLACEHOLDER_API_KEY: &str = "your_openai_api_key_here";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_CRON_SECRET: &str = "default-secret";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_MAX_UPLOAD_MB: usize = 50;
/// JST
const DEFAULT_REPORT_OFFSET_MINUTES: i32 = 9 * 60;

/// Redis URL variables, most specific first.
const REDIS_URL_VARS: [&str; 3] = ["REDIS_URL", "UPSTASH_REDIS_URL", "KV_URL"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub openai_api_key: Option<String>,
    pub redis_url: Option<String>,
    pub cron_secret: String,
    pub admin_key: Option<String>,
    pub smtp_host: String,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub data_dir: PathBuf,
    pub max_upload_mb: usize,
    pub report_offset: FixedOffset,
}

/// Which variables are set, for the environment check endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvPresence {
    pub openai_api_key: bool,
    pub redis_url: bool,
    pub cron_secret: bool,
    pub admin_key: bool,
    pub smtp_user: bool,
    pub smtp_pass: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            openai_api_key: None,
            redis_url: None,
            cron_secret: DEFAULT_CRON_SECRET.to_string(),
            admin_key: None,
            smtp_host: DEFAULT_SMTP_HOST.to_string(),
            smtp_user: None,
            smtp_pass: None,
            data_dir: PathBuf::from("."),
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            report_offset: FixedOffset::east_opt(DEFAULT_REPORT_OFFSET_MINUTES * 60)
                .unwrap_or_else(|| Utc.fix()),
        }
    }
}

impl AppConfig {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read using `lookup` for each variable. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                var: "BIND_ADDR",
                value: bind_raw.clone(),
                reason: e.to_string(),
            }
        })?;

        let max_upload_mb = match get("MAX_UPLOAD_MB") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(mb) if mb > 0 => mb,
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        var: "MAX_UPLOAD_MB",
                        value: raw,
                        reason: "must be at least 1".to_string(),
                    })
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: "MAX_UPLOAD_MB",
                        value: raw,
                        reason: e.to_string(),
                    })
                }
            },
            None => DEFAULT_MAX_UPLOAD_MB,
        };

        let offset_minutes = match get("REPORT_UTC_OFFSET_MINUTES") {
            Some(raw) => raw.parse::<i32>().map_err(|e| ConfigError::Invalid {
                var: "REPORT_UTC_OFFSET_MINUTES",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_REPORT_OFFSET_MINUTES,
        };
        let report_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::Invalid {
                var: "REPORT_UTC_OFFSET_MINUTES",
                value: offset_minutes.to_string(),
                reason: "offset must be within ±24 hours".to_string(),
            })?;

        Ok(Self {
            bind_addr,
            openai_api_key: get("OPENAI_API_KEY").filter(|k| k != PLACEHOLDER_API_KEY),
            redis_url: REDIS_URL_VARS.iter().find_map(|var| get(*var)),
            cron_secret: get("CRON_SECRET").unwrap_or_else(|| DEFAULT_CRON_SECRET.to_string()),
            admin_key: get("ADMIN_KEY"),
            smtp_host: get("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            smtp_user: get("SMTP_USER"),
            smtp_pass: get("SMTP_PASS"),
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            max_upload_mb,
            report_offset,
        })
    }

    /// No usable OpenAI key: transcription and rewrite run in demo mode.
    pub fn demo_mode(&self) -> bool {
        self.openai_api_key.is_none()
    }

    pub fn smtp_configured(&self) -> bool {
        self.smtp_user.is_some() && self.smtp_pass.is_some()
    }

    pub fn presence(&self) -> EnvPresence {
        EnvPresence {
            openai_api_key: self.openai_api_key.is_some(),
            redis_url: self.redis_url.is_some(),
            cron_secret: self.cron_secret != DEFAULT_CRON_SECRET,
            admin_key: self.admin_key.is_some(),
            smtp_user: self.smtp_user.is_some(),
            smtp_pass: self.smtp_pass.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.port(), 3000);
        assert!(cfg.demo_mode());
        assert_eq!(cfg.cron_secret, "default-secret");
        assert_eq!(cfg.smtp_host, "smtp.gmail.com");
        assert_eq!(cfg.max_upload_mb, 50);
        assert_eq!(cfg.report_offset.local_minus_utc(), 9 * 3600);
        assert!(!cfg.smtp_configured());
        assert!(!cfg.presence().cron_secret);
    }

    #[test]
    fn test_placeholder_key_means_demo() {
        let cfg = config(&[("OPENAI_API_KEY", "your_openai_api_key_here")]).unwrap();
        assert!(cfg.demo_mode());
        let cfg = config(&[("OPENAI_API_KEY", "  ")]).unwrap();
        assert!(cfg.demo_mode());
        let cfg = config(&[("OPENAI_API_KEY", "sk-live")]).unwrap();
        assert!(!cfg.demo_mode());
    }

    #[test]
    fn test_redis_url_fallbacks() {
        let cfg = config(&[("KV_URL", "redis://kv"), ("UPSTASH_REDIS_URL", "redis://up")]).unwrap();
        assert_eq!(cfg.redis_url.as_deref(), Some("redis://up"));
        let cfg = config(&[("KV_URL", "redis://kv")]).unwrap();
        assert_eq!(cfg.redis_url.as_deref(), Some("redis://kv"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[("BIND_ADDR", "nowhere")]),
            Err(ConfigError::Invalid { var: "BIND_ADDR", .. })
        ));
        assert!(config(&[("MAX_UPLOAD_MB", "0")]).is_err());
        assert!(config(&[("MAX_UPLOAD_MB", "lots")]).is_err());
        assert!(config(&[("REPORT_UTC_OFFSET_MINUTES", "99999")]).is_err());
        let cfg = config(&[("REPORT_UTC_OFFSET_MINUTES", "-300")]).unwrap();
        assert_eq!(cfg.report_offset.local_minus_utc(), -300 * 60);
    }
}
