//! Accounts created on first start.

use chrono::{DateTime, TimeZone, Utc};

use super::types::{Role, User, UserLimits, UserUsage};

/// Id of the built-in administrator. This account can never be deleted,
/// deactivated or renamed.
pub const ADMIN_ID: &str = "admin";

fn seeded_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn seed(id: &str, password: &str, name: &str, role: Role, limits: UserLimits) -> User {
    User {
        id: id.to_string(),
        password: password.to_string(),
        name: name.to_string(),
        role,
        limits,
        usage: UserUsage::default(),
        created_at: seeded_at(),
        active: true,
    }
}

/// The administrator plus three sample users.
pub fn default_users() -> Vec<User> {
    vec![
        seed(
            ADMIN_ID,
            "admin123",
            "管理者",
            Role::Admin,
            UserLimits {
                daily_requests: 999,
                monthly_requests: 999,
                monthly_credits: 9999,
                max_file_size: 999_999,
                max_duration_minutes: 30,
            },
        ),
        seed(
            "user001",
            "telop2024",
            "田中太郎",
            Role::User,
            UserLimits {
                daily_requests: 10,
                monthly_requests: 100,
                monthly_credits: 300,
                max_file_size: 999_999,
                max_duration_minutes: 30,
            },
        ),
        seed(
            "user002",
            "salon2024",
            "佐藤花子",
            Role::User,
            UserLimits {
                daily_requests: 5,
                monthly_requests: 50,
                monthly_credits: 150,
                max_file_size: 999_999,
                max_duration_minutes: 30,
            },
        ),
        seed(
            "user003",
            "video2024",
            "高橋一郎",
            Role::User,
            UserLimits {
                daily_requests: 15,
                monthly_requests: 150,
                monthly_credits: 600,
                max_file_size: 999_999,
                max_duration_minutes: 30,
            },
        ),
    ]
}
