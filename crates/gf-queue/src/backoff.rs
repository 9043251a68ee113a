//! Retry delay policy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use gf_core::Error;
use gf_db::Job;

/// Exponential backoff: `base * 2^(attempt - 1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(300),
        }
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before redispatch after the `attempt`-th attempt failed.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base.saturating_mul(1u32 << exp).min(self.max)
    }

    /// When a failed job should run again, or `None` if it must fail for
    /// good.
    ///
    /// A job is retried only when the error is retryable and attempts remain.
    /// Jobs without backoff are due immediately.
    pub fn retry_at(&self, job: &Job, err: &Error, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !err.is_retryable() || job.attempts_made >= job.max_attempts {
            return None;
        }
        let delay = if job.backoff {
            self.delay(job.attempts_made)
        } else {
            Duration::ZERO
        };
        let delay = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        Some(now + delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gf_core::{JobData, JobId, JobState, Priority};

    fn job(attempts_made: u32, max_attempts: u32, backoff: bool) -> Job {
        Job {
            id: JobId::new(1),
            job_type: "t".into(),
            data: JobData::new(),
            priority: Priority::High,
            state: JobState::Active,
            attempts_made,
            max_attempts,
            backoff,
            remove_on_complete: false,
            error: None,
            run_at: None,
            created_at: String::new(),
            updated_at: String::new(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn delay_doubles_and_caps() {
        let b = Backoff::new(Duration::from_millis(500), Duration::from_secs(3));
        assert_eq!(b.delay(1), Duration::from_millis(500));
        assert_eq!(b.delay(2), Duration::from_secs(1));
        assert_eq!(b.delay(3), Duration::from_secs(2));
        assert_eq!(b.delay(4), Duration::from_secs(3));
        assert_eq!(b.delay(40), Duration::from_secs(3));
    }

    #[test]
    fn exhausted_attempts_fail() {
        let now = Utc::now();
        let err = Error::Internal("boom".into());
        assert!(Backoff::default().retry_at(&job(1, 1, true), &err, now).is_none());
        assert!(Backoff::default().retry_at(&job(1, 2, true), &err, now).is_some());
    }

    #[test]
    fn non_retryable_errors_fail_immediately() {
        let err = Error::MissingAsset {
            extension: "fbx".into(),
            directory: "/p".into(),
        };
        assert!(Backoff::default()
            .retry_at(&job(1, 5, true), &err, Utc::now())
            .is_none());
    }

    #[test]
    fn backoff_disabled_is_due_now() {
        let now = Utc::now();
        let at = Backoff::default()
            .retry_at(&job(1, 3, false), &Error::Stalled(60), now)
            .unwrap();
        assert_eq!(at, now);

        let at = Backoff::default()
            .retry_at(&job(2, 3, true), &Error::Stalled(60), now)
            .unwrap();
        assert_eq!(at - now, chrono::Duration::seconds(2));
    }
}
