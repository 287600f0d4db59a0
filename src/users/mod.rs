//! Accounts, limits and credit accounting.

mod manager;
pub mod seed;
pub mod stats;
mod types;

pub use manager::{credits_for_minutes, credits_for_seconds, UserError, UserManager, MIN_PASSWORD_LEN};
pub use stats::{CostBreakdown, OverallStats};
pub use types::{
    Admission, DenyReason, NewUser, Role, User, UserLimits, UserUpdates, UserUsage, UserView,
};
