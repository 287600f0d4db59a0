//! Quota and credit accounting over the user store.
//!
//! Every user handed out by [`UserManager::get_user`] or
//! [`UserManager::all_users`] has had the lazy day/month rollover applied
//! (and persisted when it changed), so reads and writes never see counters
//! from a previous period.
//! Checks and consumption are separate calls: a caller checks, performs the
//! billable work, then records. Two concurrent requests from the same user
//! can therefore both pass a check before either records.

use std::sync::Arc;

use crate::clock::Clock;
use crate::store::{get_json, set_json, KvStore, StoreError};

use super::seed::{default_users, ADMIN_ID};
use super::types::{Admission, DenyReason, NewUser, User, UserLimits, UserUpdates, UserUsage, UserView};

const USER_PREFIX: &str = "user:";
const INITIALIZED_KEY: &str = "users_initialized";

/// Shortest password an administrator may set.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Errors from user-management operations.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("user not found: {0}")]
    NotFound(String),
    #[error("user already exists: {0}")]
    AlreadyExists(String),
    #[error("the admin account cannot be modified this way")]
    Protected,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Credits charged for `minutes` of audio: every started minute costs one.
pub fn credits_for_minutes(minutes: f64) -> u32 {
    if !minutes.is_finite() || minutes <= 0.0 {
        return 0;
    }
    minutes.ceil() as u32
}

/// Credits charged for `seconds` of audio.
pub fn credits_for_seconds(seconds: f64) -> u32 {
    credits_for_minutes(seconds / 60.0)
}

fn user_key(id: &str) -> String {
    format!("{}{}", USER_PREFIX, id)
}

pub struct UserManager {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl UserManager {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Write the default accounts unless the store carries the seed marker.
    ///
    /// Checked on every access: a store that lost its contents (Redis
    /// outage served from the in-memory fallback) is seeded again.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        if self.store.get(INITIALIZED_KEY).await?.is_some() {
            return Ok(());
        }
        log::info!("Users: seeding default accounts");
        for user in default_users() {
            set_json(self.store.as_ref(), &user_key(&user.id), &user).await?;
        }
        self.store.set(INITIALIZED_KEY, "true".to_string()).await?;
        Ok(())
    }

    /// Roll stale counters forward and persist the change.
    async fn refresh(&self, mut user: User) -> Result<User, StoreError> {
        if self.roll_over(&mut user.usage) {
            self.save_user(&user).await?;
        }
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        self.initialize().await?;
        match get_json::<User>(self.store.as_ref(), &user_key(user_id)).await? {
            Some(user) => Ok(Some(self.refresh(user).await?)),
            None => Ok(None),
        }
    }

    async fn require_user(&self, user_id: &str) -> Result<User, UserError> {
        self.get_user(user_id)
            .await?
            .ok_or_else(|| UserError::NotFound(user_id.to_string()))
    }

    pub async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        set_json(self.store.as_ref(), &user_key(&user.id), user).await
    }

    /// Returns the user when the id exists, is active and the password matches.
    pub async fn authenticate(
        &self,
        user_id: &str,
        password: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = self.get_user(user_id).await?;
        Ok(user.filter(|u| u.active && u.password == password))
    }

    /// All users ordered by id.
    pub async fn all_users(&self) -> Result<Vec<User>, StoreError> {
        self.initialize().await?;
        let keys = self.store.keys(USER_PREFIX).await?;
        let mut users = Vec::with_capacity(keys.len());
        for key in keys {
            match get_json::<User>(self.store.as_ref(), &key).await {
                Ok(Some(user)) => users.push(self.refresh(user).await?),
                Ok(None) => {}
                Err(StoreError::Serialization(e)) => {
                    log::warn!("Users: skipping unreadable record {}: {}", key, e);
                }
                Err(e) => return Err(e),
            }
        }
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    fn roll_over(&self, usage: &mut UserUsage) -> bool {
        usage.roll_over(&self.clock.today(), &self.clock.current_month())
    }

    /// Gate for operations whose cost is only known afterwards.
    ///
    /// Denies once the monthly credits are used up. A user with one credit
    /// left is admitted even if the clip turns out longer than a minute.
    pub async fn check_usage_limit(&self, user_id: &str) -> Result<Admission, StoreError> {
        let Some(user) = self.get_user(user_id).await?.filter(|u| u.active) else {
            return Ok(Admission::Denied(DenyReason::UserNotFound));
        };

        if user.usage.monthly_credits_used >= user.limits.monthly_credits {
            return Ok(Admission::Denied(DenyReason::CreditLimitReached {
                limit: user.limits.monthly_credits,
            }));
        }

        Ok(Admission::Allowed)
    }

    /// Gate for operations whose credit cost is known up front.
    pub async fn check_credit_availability(
        &self,
        user_id: &str,
        required: u32,
    ) -> Result<Admission, StoreError> {
        let Some(user) = self.get_user(user_id).await?.filter(|u| u.active) else {
            return Ok(Admission::Denied(DenyReason::UserNotFound));
        };

        let remaining = user.usage.remaining_credits(&user.limits);
        if required > remaining {
            return Ok(Admission::Denied(DenyReason::InsufficientCredits {
                required,
                remaining,
            }));
        }

        Ok(Admission::Allowed)
    }

    /// Count one request against the daily, monthly and lifetime counters.
    pub async fn record_usage(&self, user_id: &str) -> Result<UserUsage, UserError> {
        let mut user = self.require_user(user_id).await?;
        user.usage.count_request();
        self.save_user(&user).await?;
        log::info!(
            "Users: request recorded for {} (daily={}, monthly={})",
            user_id,
            user.usage.daily_requests,
            user.usage.monthly_requests
        );
        Ok(user.usage)
    }

    /// Charge a finished transcription: credits for its duration plus one request.
    pub async fn record_transcription(
        &self,
        user_id: &str,
        duration_secs: f64,
    ) -> Result<u32, UserError> {
        let mut user = self.require_user(user_id).await?;
        let credits = credits_for_seconds(duration_secs);
        user.usage.monthly_credits_used = user.usage.monthly_credits_used.saturating_add(credits);
        user.usage.count_request();
        self.save_user(&user).await?;
        log::info!(
            "Users: transcription billed to {}: {} credits ({:.1}s), now {}/{}",
            user_id,
            credits,
            duration_secs,
            user.usage.monthly_credits_used,
            user.limits.monthly_credits
        );
        Ok(credits)
    }

    pub async fn check_duration(
        &self,
        user_id: &str,
        duration_minutes: f64,
    ) -> Result<Admission, StoreError> {
        let Some(user) = self.get_user(user_id).await?.filter(|u| u.active) else {
            return Ok(Admission::Denied(DenyReason::UserNotFound));
        };
        if duration_minutes > user.limits.max_duration_minutes as f64 {
            return Ok(Admission::Denied(DenyReason::DurationExceeded {
                max_minutes: user.limits.max_duration_minutes,
            }));
        }
        Ok(Admission::Allowed)
    }

    pub async fn check_file_size(
        &self,
        user_id: &str,
        file_size_mb: f64,
    ) -> Result<Admission, StoreError> {
        let Some(user) = self.get_user(user_id).await?.filter(|u| u.active) else {
            return Ok(Admission::Denied(DenyReason::UserNotFound));
        };
        if file_size_mb > user.limits.max_file_size as f64 {
            return Ok(Admission::Denied(DenyReason::FileTooLarge {
                max_mb: user.limits.max_file_size,
            }));
        }
        Ok(Admission::Allowed)
    }

    pub async fn is_admin(&self, user_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .get_user(user_id)
            .await?
            .is_some_and(|u| u.is_admin()))
    }

    pub async fn create_user(&self, new_user: NewUser) -> Result<UserView, UserError> {
        if new_user.id.trim().is_empty() {
            return Err(UserError::Empty("id"));
        }
        if new_user.name.trim().is_empty() {
            return Err(UserError::Empty("name"));
        }
        if new_user.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(UserError::PasswordTooShort);
        }
        if self.get_user(&new_user.id).await?.is_some() {
            return Err(UserError::AlreadyExists(new_user.id));
        }

        let user = User {
            id: new_user.id,
            password: new_user.password,
            name: new_user.name,
            role: new_user.role,
            limits: new_user.limits,
            usage: UserUsage::default(),
            created_at: self.clock.now(),
            active: new_user.active,
        };
        self.save_user(&user).await?;
        log::info!("Users: created {}", user.id);
        Ok(UserView::from(&user))
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<(), UserError> {
        if user_id == ADMIN_ID {
            return Err(UserError::Protected);
        }
        self.require_user(user_id).await?;
        self.store.delete(&user_key(user_id)).await?;
        log::info!("Users: deleted {}", user_id);
        Ok(())
    }

    pub async fn update_limits(&self, user_id: &str, limits: UserLimits) -> Result<(), UserError> {
        let mut user = self.require_user(user_id).await?;
        user.limits = limits;
        self.save_user(&user).await?;
        Ok(())
    }

    /// Flip the active flag. Returns the new state.
    pub async fn toggle_active(&self, user_id: &str) -> Result<bool, UserError> {
        if user_id == ADMIN_ID {
            return Err(UserError::Protected);
        }
        let mut user = self.require_user(user_id).await?;
        user.active = !user.active;
        self.save_user(&user).await?;
        Ok(user.active)
    }

    /// Move a user to a new id, keeping everything else.
    pub async fn change_user_id(&self, current_id: &str, new_id: &str) -> Result<(), UserError> {
        if current_id == ADMIN_ID {
            return Err(UserError::Protected);
        }
        if new_id.trim().is_empty() {
            return Err(UserError::Empty("id"));
        }
        let mut user = self.require_user(current_id).await?;
        if self.get_user(new_id).await?.is_some() {
            return Err(UserError::AlreadyExists(new_id.to_string()));
        }

        user.id = new_id.to_string();
        self.save_user(&user).await?;
        self.store.delete(&user_key(current_id)).await?;
        log::info!("Users: renamed {} -> {}", current_id, new_id);
        Ok(())
    }

    pub async fn change_password(&self, user_id: &str, password: &str) -> Result<(), UserError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(UserError::PasswordTooShort);
        }
        let mut user = self.require_user(user_id).await?;
        user.password = password.to_string();
        self.save_user(&user).await?;
        Ok(())
    }

    pub async fn change_name(&self, user_id: &str, name: &str) -> Result<(), UserError> {
        if name.trim().is_empty() {
            return Err(UserError::Empty("name"));
        }
        let mut user = self.require_user(user_id).await?;
        user.name = name.to_string();
        self.save_user(&user).await?;
        Ok(())
    }

    /// Apply each present field of `updates`; stops at the first failure.
    pub async fn apply_updates(&self, user_id: &str, updates: UserUpdates) -> Result<(), UserError> {
        if let Some(password) = updates.password.as_deref().filter(|p| !p.is_empty()) {
            self.change_password(user_id, password).await?;
        }
        if let Some(name) = updates.name.as_deref().filter(|n| !n.is_empty()) {
            self.change_name(user_id, name).await?;
        }
        if let Some(limits) = updates.limits {
            self.update_limits(user_id, limits).await?;
        }
        Ok(())
    }
}
