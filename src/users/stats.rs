//! Aggregate usage and estimated API spend across all users.

use serde::Serialize;

use super::types::User;

/// Estimated Whisper cost per request (about three minutes at $0.006/min).
pub const WHISPER_COST_PER_REQUEST: f64 = 0.018;
/// Estimated GPT cost per request (input $0.03 + output $0.03).
pub const GPT_COST_PER_REQUEST: f64 = 0.06;
/// Sum of the two.
pub const TOTAL_COST_PER_REQUEST: f64 = WHISPER_COST_PER_REQUEST + GPT_COST_PER_REQUEST;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub whisper_cost: f64,
    pub gpt_cost: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_users: usize,
    pub active_users: usize,
    pub total_requests: u64,
    pub total_daily_requests: u64,
    pub total_monthly_requests: u64,
    pub estimated_cost: f64,
    pub cost_breakdown: CostBreakdown,
}

impl OverallStats {
    pub fn from_users(users: &[User]) -> Self {
        let total_requests: u64 = users.iter().map(|u| u.usage.total_requests).sum();
        let total_daily_requests: u64 = users.iter().map(|u| u.usage.daily_requests as u64).sum();
        let total_monthly_requests: u64 =
            users.iter().map(|u| u.usage.monthly_requests as u64).sum();
        let requests = total_requests as f64;
        let estimated_cost = requests * TOTAL_COST_PER_REQUEST;

        Self {
            total_users: users.len(),
            active_users: users.iter().filter(|u| u.active).count(),
            total_requests,
            total_daily_requests,
            total_monthly_requests,
            estimated_cost,
            cost_breakdown: CostBreakdown {
                whisper_cost: requests * WHISPER_COST_PER_REQUEST,
                gpt_cost: requests * GPT_COST_PER_REQUEST,
                total_cost: estimated_cost,
            },
        }
    }

    /// Estimated spend for today's requests only.
    pub fn daily_cost(&self) -> f64 {
        self.total_daily_requests as f64 * TOTAL_COST_PER_REQUEST
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::seed::default_users;

    #[test]
    fn test_totals_and_cost() {
        let mut users = default_users();
        users[1].usage.total_requests = 10;
        users[1].usage.daily_requests = 2;
        users[2].usage.total_requests = 5;
        users[2].usage.monthly_requests = 5;
        users[3].active = false;

        let stats = OverallStats::from_users(&users);
        assert_eq!(stats.total_users, 4);
        assert_eq!(stats.active_users, 3);
        assert_eq!(stats.total_requests, 15);
        assert_eq!(stats.total_daily_requests, 2);
        assert_eq!(stats.total_monthly_requests, 5);
        assert!((stats.estimated_cost - 15.0 * 0.078).abs() < 1e-9);
        assert!((stats.cost_breakdown.whisper_cost - 0.27).abs() < 1e-9);
        assert!((stats.daily_cost() - 0.156).abs() < 1e-9);
    }

    #[test]
    fn test_empty_user_list() {
        let stats = OverallStats::from_users(&[]);
        assert_eq!(stats, OverallStats::default());
    }
}
