//! Loan, reservation and ledger history types

use chrono::{DateTime, Duration, Utc};
use config::ConfigError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::LendingConfig;

/// Borrower identity as seen by the lending ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BorrowerRef {
    pub id: Uuid,
    pub username: String,
}

/// Active loan of one copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Loan {
    pub borrower: BorrowerRef,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    /// Overdue days already charged to `fine_details`
    #[serde(default)]
    pub fined_days: i64,
}

impl Loan {
    /// Whole days elapsed since the due date (0 when not overdue)
    pub fn overdue_days(&self, now: DateTime<Utc>) -> i64 {
        if now > self.due_date {
            (now - self.due_date).num_days()
        } else {
            0
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.overdue_days(now) > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAction {
    Borrowed,
    Reserved,
    Returned,
}

/// Append-only record of a past ledger transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    pub action: LedgerAction,
    pub borrower: BorrowerRef,
    pub at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Loan period and fine rate applied by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LendingPolicy {
    pub loan_period: Duration,
    pub fine_rate_per_day: i64,
}

impl LendingPolicy {
    pub fn due_date_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.loan_period
    }
}

/// Longest accepted loan period, in days
pub const MAX_LOAN_PERIOD_DAYS: i64 = 3650;

impl TryFrom<LendingConfig> for LendingPolicy {
    type Error = ConfigError;

    fn try_from(config: LendingConfig) -> Result<Self, Self::Error> {
        if !(1..=MAX_LOAN_PERIOD_DAYS).contains(&config.loan_period_days) {
            return Err(ConfigError::Message(format!(
                "lending.loan_period_days must be between 1 and {}, got {}",
                MAX_LOAN_PERIOD_DAYS, config.loan_period_days
            )));
        }
        if config.fine_rate_per_day < 0 {
            return Err(ConfigError::Message(format!(
                "lending.fine_rate_per_day must not be negative, got {}",
                config.fine_rate_per_day
            )));
        }

        Ok(Self {
            loan_period: Duration::days(config.loan_period_days),
            fine_rate_per_day: config.fine_rate_per_day,
        })
    }
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self {
            loan_period: Duration::days(14),
            fine_rate_per_day: 10,
        }
    }
}

/// Result of a borrow request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BorrowOutcome {
    Borrowed { due_date: DateTime<Utc> },
    /// No copy left; borrower waits at `position` (1-based)
    Queued { position: usize },
    /// No copy left and the borrower was already waiting at `position`
    AlreadyQueued { position: usize },
}

/// Result of a successful return
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnOutcome {
    pub fine_charged: i64,
    /// Queue head that received the returned copy
    pub promoted: Option<BorrowerRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan_due(due_date: DateTime<Utc>) -> Loan {
        Loan {
            borrower: BorrowerRef {
                id: Uuid::new_v4(),
                username: "ada".to_string(),
            },
            borrowed_at: due_date - Duration::days(14),
            due_date,
            fined_days: 0,
        }
    }

    #[test]
    fn test_overdue_days() {
        let now = Utc::now();
        assert_eq!(loan_due(now + Duration::days(3)).overdue_days(now), 0);
        assert_eq!(loan_due(now - Duration::hours(5)).overdue_days(now), 0);
        assert_eq!(loan_due(now - Duration::days(20)).overdue_days(now), 20);
        assert!(loan_due(now - Duration::days(1)).is_overdue(now));
    }

    #[test]
    fn test_default_policy() {
        let policy = LendingPolicy::default();
        let now = Utc::now();
        assert_eq!(policy.due_date_from(now), now + Duration::days(14));
        assert_eq!(policy.fine_rate_per_day, 10);
        assert_eq!(LendingPolicy::try_from(LendingConfig::default()).unwrap(), policy);
    }

    #[test]
    fn test_policy_rejects_out_of_range_config() {
        let config = |loan_period_days, fine_rate_per_day| LendingConfig {
            loan_period_days,
            fine_rate_per_day,
        };

        assert!(LendingPolicy::try_from(config(0, 10)).is_err());
        assert!(LendingPolicy::try_from(config(-3, 10)).is_err());
        assert!(LendingPolicy::try_from(config(MAX_LOAN_PERIOD_DAYS + 1, 10)).is_err());
        assert!(LendingPolicy::try_from(config(i64::MAX, 10)).is_err());
        assert!(LendingPolicy::try_from(config(14, -1)).is_err());

        let free = LendingPolicy::try_from(config(MAX_LOAN_PERIOD_DAYS, 0)).unwrap();
        assert_eq!(free.loan_period, Duration::days(MAX_LOAN_PERIOD_DAYS));
        assert_eq!(free.fine_rate_per_day, 0);
    }
}
