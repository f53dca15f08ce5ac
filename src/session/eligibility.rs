// src/session/eligibility.rs

use chrono::{DateTime, Utc};

use crate::{models::assignment::AssignmentConfig, session::error::IneligibleReason};

/// Decides whether a new or resumed attempt may proceed.
///
/// Checks run in order: deadline, quota, opening time. The gate has no side
/// effects; discarding a stale snapshot is left to the caller.
pub fn check_eligibility(
    config: &AssignmentConfig,
    prior_attempts: u32,
    now: DateTime<Utc>,
) -> Result<(), IneligibleReason> {
    if let Some(due_at) = config.due_at {
        if now > due_at {
            return Err(IneligibleReason::DeadlinePassed);
        }
    }

    if config.allowed_attempts != 0 && prior_attempts >= config.allowed_attempts {
        return Err(IneligibleReason::QuotaExceeded);
    }

    if let Some(open_at) = config.open_at {
        if now < open_at {
            return Err(IneligibleReason::NotYetOpen);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn config(allowed_attempts: u32) -> AssignmentConfig {
        AssignmentConfig {
            id: 1,
            class_id: 1,
            teacher_id: 100,
            test_id: 1,
            open_at: None,
            due_at: None,
            allowed_attempts,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_deadline_passed() {
        let mut cfg = config(0);
        cfg.due_at = Some(noon() - Duration::seconds(1));
        assert_eq!(
            check_eligibility(&cfg, 0, noon()),
            Err(IneligibleReason::DeadlinePassed)
        );

        // Exactly at the deadline is still allowed.
        cfg.due_at = Some(noon());
        assert_eq!(check_eligibility(&cfg, 0, noon()), Ok(()));
    }

    #[test]
    fn test_quota_exceeded_after_n_attempts() {
        let cfg = config(2);
        assert_eq!(check_eligibility(&cfg, 0, noon()), Ok(()));
        assert_eq!(check_eligibility(&cfg, 1, noon()), Ok(()));
        assert_eq!(
            check_eligibility(&cfg, 2, noon()),
            Err(IneligibleReason::QuotaExceeded)
        );
    }

    #[test]
    fn test_zero_quota_is_unlimited() {
        let cfg = config(0);
        for attempts in [0, 1, 10, 10_000] {
            assert_eq!(check_eligibility(&cfg, attempts, noon()), Ok(()));
        }
    }

    #[test]
    fn test_deadline_checked_before_quota() {
        let mut cfg = config(1);
        cfg.due_at = Some(noon() - Duration::hours(1));
        assert_eq!(
            check_eligibility(&cfg, 5, noon()),
            Err(IneligibleReason::DeadlinePassed)
        );
    }

    #[test]
    fn test_not_yet_open() {
        let mut cfg = config(0);
        cfg.open_at = Some(noon() + Duration::minutes(5));
        assert_eq!(
            check_eligibility(&cfg, 0, noon()),
            Err(IneligibleReason::NotYetOpen)
        );
        assert_eq!(
            check_eligibility(&cfg, 0, noon() + Duration::minutes(5)),
            Ok(())
        );
    }
}
