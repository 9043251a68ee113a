//! Job domain types: lifecycle states, priority classes and submission
//! options.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Open key/value mapping carried by every job.
pub type JobData = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Lifecycle state of a job.
///
/// ```text
/// inactive --dispatch--> active --success--> complete
///    ^                     |
///    +---retry/stale-------+--exhausted/shutdown--> failed
/// ```
///
/// `complete` and `failed` are terminal. A retryable failure is modelled as
/// `inactive` with a future `run_at`, so no edge ever leaves `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Inactive,
    Active,
    Complete,
    Failed,
}

impl JobState {
    /// All states, in lifecycle order.
    pub const ALL: [JobState; 4] = [
        JobState::Inactive,
        JobState::Active,
        JobState::Complete,
        JobState::Failed,
    ];

    /// The storage/text form of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Inactive => "inactive",
            JobState::Active => "active",
            JobState::Complete => "complete",
            JobState::Failed => "failed",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }

    /// Whether the state machine has an edge `self -> to`.
    pub fn can_transition_to(&self, to: JobState) -> bool {
        matches!(
            (self, to),
            (JobState::Inactive, JobState::Active)
                | (JobState::Active, JobState::Complete)
                | (JobState::Active, JobState::Failed)
                | (JobState::Active, JobState::Inactive)
        )
    }

    /// Validate `self -> to`, returning [`Error::InvalidTransition`] when the
    /// edge does not exist.
    pub fn transition(&self, to: JobState) -> Result<JobState> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(Error::InvalidTransition { from: *self, to })
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "inactive" => Ok(JobState::Inactive),
            "active" => Ok(JobState::Active),
            "complete" => Ok(JobState::Complete),
            "failed" => Ok(JobState::Failed),
            other => Err(Error::Validation(format!("unknown job state '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Ordinal priority class. Higher classes are dispatched first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Numeric rank persisted by stores; dispatch orders by rank descending.
    pub fn rank(&self) -> i32 {
        match self {
            Priority::Low => -10,
            Priority::Normal => 0,
            Priority::Medium => 5,
            Priority::High => 10,
            Priority::Critical => 15,
        }
    }

    /// Inverse of [`Priority::rank`].
    pub fn from_rank(rank: i32) -> Option<Self> {
        match rank {
            -10 => Some(Priority::Low),
            0 => Some(Priority::Normal),
            5 => Some(Priority::Medium),
            10 => Some(Priority::High),
            15 => Some(Priority::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// JobOptions
// ---------------------------------------------------------------------------

/// Scheduling options fixed at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    pub priority: Priority,
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay re-dispatch of a retryable failure by an increasing interval.
    pub backoff: bool,
    /// Marks the job eligible for the administrative purge once complete.
    pub remove_on_complete: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            priority: Priority::Normal,
            max_attempts: 1,
            backoff: false,
            remove_on_complete: false,
        }
    }
}

impl JobOptions {
    /// Builder: set the priority class.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: set the maximum attempts (clamped to at least one).
    pub fn attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Builder: enable or disable backoff.
    pub fn backoff(mut self, enabled: bool) -> Self {
        self.backoff = enabled;
        self
    }

    /// Builder: set the remove-on-complete flag.
    pub fn remove_on_complete(mut self, remove: bool) -> Self {
        self.remove_on_complete = remove;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_edges() {
        assert!(JobState::Inactive.can_transition_to(JobState::Active));
        assert!(JobState::Active.can_transition_to(JobState::Complete));
        assert!(JobState::Active.can_transition_to(JobState::Failed));
        assert!(JobState::Active.can_transition_to(JobState::Inactive));
    }

    #[test]
    fn terminal_states_have_no_exit() {
        for from in [JobState::Complete, JobState::Failed] {
            assert!(from.is_terminal());
            for to in JobState::ALL {
                assert!(
                    from.transition(to).is_err(),
                    "{from} -> {to} should be rejected"
                );
            }
        }
    }

    #[test]
    fn skipping_active_is_rejected() {
        let err = JobState::Inactive.transition(JobState::Complete).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: JobState::Inactive,
                to: JobState::Complete
            }
        ));
        assert!(JobState::Inactive.transition(JobState::Failed).is_err());
        assert!(JobState::Active.transition(JobState::Active).is_err());
    }

    #[test]
    fn state_text_roundtrip() {
        for state in JobState::ALL {
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
        assert_eq!("ACTIVE".parse::<JobState>().unwrap(), JobState::Active);
        assert!("delayed".parse::<JobState>().is_err());
    }

    #[test]
    fn priority_rank_orders_classes() {
        let mut classes = vec![
            Priority::High,
            Priority::Low,
            Priority::Critical,
            Priority::Normal,
            Priority::Medium,
        ];
        classes.sort_by_key(|p| p.rank());
        assert_eq!(
            classes,
            vec![
                Priority::Low,
                Priority::Normal,
                Priority::Medium,
                Priority::High,
                Priority::Critical
            ]
        );
        for p in classes {
            assert_eq!(Priority::from_rank(p.rank()), Some(p));
        }
        assert_eq!(Priority::from_rank(3), None);
    }

    #[test]
    fn options_builder_clamps_attempts() {
        let opts = JobOptions::default()
            .priority(Priority::High)
            .attempts(0)
            .backoff(true);
        assert_eq!(opts.max_attempts, 1);
        assert_eq!(opts.priority, Priority::High);
        assert!(opts.backoff);
        assert!(!opts.remove_on_complete);
    }
}
