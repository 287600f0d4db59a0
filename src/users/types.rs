//! User records, limits and usage counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

/// Per-user caps configured by an administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLimits {
    /// Requests per day (informational; credits are the enforced cap)
    pub daily_requests: u32,
    /// Requests per month (informational; credits are the enforced cap)
    pub monthly_requests: u32,
    /// Credits per month, one credit per started minute of audio
    pub monthly_credits: u32,
    /// Largest accepted upload in megabytes
    pub max_file_size: u64,
    /// Longest accepted clip in minutes
    pub max_duration_minutes: u32,
}

impl Default for UserLimits {
    fn default() -> Self {
        Self {
            daily_requests: 10,
            monthly_requests: 100,
            monthly_credits: 300,
            max_file_size: 999_999,
            max_duration_minutes: 30,
        }
    }
}

/// Usage counters, reset lazily when the stored day or month goes stale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUsage {
    pub total_requests: u64,
    pub daily_requests: u32,
    pub monthly_requests: u32,
    pub monthly_credits_used: u32,
    /// `YYYY-MM-DD` of the day the daily counter belongs to
    pub last_request_date: Option<String>,
    /// `YYYY-MM` of the month the monthly counters belong to
    pub last_reset_date: Option<String>,
}

impl UserUsage {
    /// Zero the counters whose period has ended and stamp the current period.
    ///
    /// Returns true if anything changed.
    pub fn roll_over(&mut self, today: &str, month: &str) -> bool {
        let mut changed = false;

        if self.last_request_date.as_deref() != Some(today) {
            self.daily_requests = 0;
            self.last_request_date = Some(today.to_string());
            changed = true;
        }

        if self.last_reset_date.as_deref() != Some(month) {
            self.monthly_requests = 0;
            self.monthly_credits_used = 0;
            self.last_reset_date = Some(month.to_string());
            changed = true;
        }

        changed
    }

    /// Count one billable request.
    pub fn count_request(&mut self) {
        self.total_requests += 1;
        self.daily_requests += 1;
        self.monthly_requests += 1;
    }

    /// Credits left this month under `limits`, never negative.
    pub fn remaining_credits(&self, limits: &UserLimits) -> u32 {
        limits
            .monthly_credits
            .saturating_sub(self.monthly_credits_used)
    }
}

/// Stored user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    pub limits: UserLimits,
    pub usage: UserUsage,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A user as shown to clients: everything except the password.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub active: bool,
    pub limits: UserLimits,
    pub usage: UserUsage,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            role: user.role,
            active: user.active,
            limits: user.limits.clone(),
            usage: user.usage.clone(),
            created_at: user.created_at,
        }
    }
}

/// Fields an administrator supplies when creating a user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub id: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub limits: UserLimits,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial update applied by the admin "update" action.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdates {
    pub password: Option<String>,
    pub name: Option<String>,
    pub limits: Option<UserLimits>,
}

/// Outcome of a quota or upload pre-check.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Allowed,
    Denied(DenyReason),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }

    /// Human-readable reason, if denied.
    pub fn reason(&self) -> Option<String> {
        match self {
            Admission::Allowed => None,
            Admission::Denied(reason) => Some(reason.to_string()),
        }
    }
}

/// Why a request was refused. Messages are shown verbatim in the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum DenyReason {
    UserNotFound,
    CreditLimitReached { limit: u32 },
    InsufficientCredits { required: u32, remaining: u32 },
    DurationExceeded { max_minutes: u32 },
    FileTooLarge { max_mb: u64 },
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::UserNotFound => write!(f, "ユーザーが見つかりません"),
            DenyReason::CreditLimitReached { limit } => {
                write!(f, "月次クレジット制限に達しました（{}クレジット/月）", limit)
            }
            DenyReason::InsufficientCredits {
                required,
                remaining,
            } => write!(
                f,
                "クレジットが不足しています（必要: {}, 残り: {}）",
                required, remaining
            ),
            DenyReason::DurationExceeded { max_minutes } => {
                write!(f, "ファイルの時間が制限を超えています（最大{}分）", max_minutes)
            }
            DenyReason::FileTooLarge { max_mb } => {
                write!(f, "ファイルサイズが制限を超えています（最大{}MB）", max_mb)
            }
        }
    }
}
