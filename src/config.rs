use crate::domain::pricing::{Amount, Currency, DEFAULT_VOTE_PRICE};
use std::time::Duration;

/// Largest vote quantity a single purchase may carry.
pub const DEFAULT_MAX_VOTES_PER_PURCHASE: u32 = 1000;
/// How long an entry may stay `pending` before it is reported.
pub const DEFAULT_PENDING_ALERT_MINUTES: i64 = 30;

/// Bounded exponential backoff for the credit step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Runtime settings for the purchase workflow.
#[derive(Debug, Clone)]
pub struct VoteConfig {
    pub price_per_vote: Amount,
    pub currency: Currency,
    pub max_votes_per_purchase: u32,
    pub credit_retry: RetryPolicy,
    pub pending_alert_after: chrono::Duration,
    /// Static allow-list of administrator emails, compared case-insensitively.
    pub admins: Vec<String>,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            price_per_vote: DEFAULT_VOTE_PRICE,
            currency: Currency::default(),
            max_votes_per_purchase: DEFAULT_MAX_VOTES_PER_PURCHASE,
            credit_retry: RetryPolicy::default(),
            pending_alert_after: chrono::Duration::minutes(DEFAULT_PENDING_ALERT_MINUTES),
            admins: Vec::new(),
        }
    }
}

impl VoteConfig {
    pub fn is_admin(&self, email: &str) -> bool {
        let email = email.trim();
        self.admins
            .iter()
            .any(|admin| admin.trim().eq_ignore_ascii_case(email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(4), Duration::from_millis(500));
        assert_eq!(policy.delay_after(40), Duration::from_millis(500));
    }

    #[test]
    fn test_admin_allow_list() {
        let config = VoteConfig {
            admins: vec!["Admin@Example.com".to_string()],
            ..Default::default()
        };
        assert!(config.is_admin("admin@example.com"));
        assert!(!config.is_admin("fan@example.com"));
    }

    #[test]
    fn test_defaults() {
        let config = VoteConfig::default();
        assert_eq!(config.price_per_vote.minor_units(), 10_000);
        assert_eq!(config.max_votes_per_purchase, 1000);
        assert_eq!(config.currency, Currency::Ngn);
    }
}
