//! Bounded retry with a fixed delay

use super::task::SyncTask;
use crate::config::SchedulerConfig;
use crate::domain::{OperationRecord, OperationStatus, Result};
use chrono::{DateTime, Duration, Utc};

/// What to do with a task after one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The invocation ran to the end (`completed` or `partial`)
    Done(OperationStatus),
    /// Transient failure; eligible for another attempt
    Retry(String),
    /// Will fail the same way on every attempt
    Terminal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::seconds(300),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_seconds: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::seconds(i64::try_from(delay_seconds).unwrap_or(i64::MAX / 1000)),
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.max_attempts, config.retry_delay_seconds)
    }

    /// Classifies the outcome of one orchestrator invocation
    ///
    /// A record closed as `failed` means the batch-level fetch or select
    /// failed, which is retried. Errors raised before a record was opened are
    /// retried unless they are configuration or validation problems.
    pub fn classify(outcome: &Result<OperationRecord>) -> Verdict {
        match outcome {
            Ok(record) if record.status == OperationStatus::Failed => Verdict::Retry(
                record
                    .error_details
                    .clone()
                    .unwrap_or_else(|| "operation failed".to_string()),
            ),
            Ok(record) => Verdict::Done(record.status),
            Err(e) if e.is_retryable() => Verdict::Retry(e.to_string()),
            Err(e) => Verdict::Terminal(e.to_string()),
        }
    }

    /// When the next attempt may start, or `None` once attempts are exhausted
    pub fn next_attempt_at(&self, task: &SyncTask, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if task.attempts < task.max_attempts.min(self.max_attempts) {
            Some(now + self.delay)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OperationKind, OperationParams, SyncError, TransportError};

    fn task_after(attempts: u32) -> SyncTask {
        let mut task = SyncTask::new(OperationKind::ProductSync, OperationParams::new(), 3, Utc::now());
        task.attempts = attempts;
        task
    }

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay.num_seconds(), 300);
    }

    #[test]
    fn test_next_attempt_is_delayed() {
        let policy = RetryPolicy::default();
        let now = Utc::now();
        assert_eq!(policy.next_attempt_at(&task_after(1), now), Some(now + Duration::seconds(300)));
        assert_eq!(policy.next_attempt_at(&task_after(2), now), Some(now + Duration::seconds(300)));
        assert_eq!(policy.next_attempt_at(&task_after(3), now), None);
    }

    #[test]
    fn test_classify() {
        let mut record = OperationRecord::new(OperationKind::ProductSync, OperationParams::new());
        record.mark_running();
        record.finish(2, 1, 1, vec![]);
        assert_eq!(
            RetryPolicy::classify(&Ok(record.clone())),
            Verdict::Done(OperationStatus::Partial)
        );

        record.fail("Transport error: request timed out: 30s");
        assert!(matches!(RetryPolicy::classify(&Ok(record)), Verdict::Retry(e) if e.contains("timed out")));

        let transport: SyncError = TransportError::Network("reset".into()).into();
        assert!(matches!(RetryPolicy::classify(&Err(transport)), Verdict::Retry(_)));

        let config = SyncError::Configuration("no active endpoint named 'gestionale'".into());
        assert!(matches!(RetryPolicy::classify(&Err(config)), Verdict::Terminal(_)));
    }
}
