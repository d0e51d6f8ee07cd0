//! Durable task objects
//!
//! A [`SyncTask`] is one requested invocation of an operation kind. It carries
//! its own attempt count and next-eligible time, so retries are plain queue
//! entries rather than re-entrant calls.
//!
//! ```text
//! queued -> running -> { succeeded | failed }
//!   ^          |
//!   +----------+  (retry scheduled, lease deferral, crash recovery)
//! queued -> cancelled
//! ```

use crate::domain::{OperationId, OperationKind, OperationParams, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskStatus::Queued),
            "running" => Ok(TaskStatus::Running),
            "succeeded" => Ok(TaskStatus::Succeeded),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(format!("Unknown task status: {other}")),
        }
    }
}

/// One requested invocation, possibly spanning several attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTask {
    pub id: TaskId,
    pub kind: OperationKind,
    pub parameters: OperationParams,
    pub status: TaskStatus,
    /// Attempts that got past the lease and ran the orchestrator
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_eligible_at: DateTime<Utc>,
    pub last_error: Option<String>,
    /// Operation records opened by the attempts, oldest first
    pub operation_ids: Vec<OperationId>,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncTask {
    /// A task eligible immediately
    pub fn new(
        kind: OperationKind,
        parameters: OperationParams,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            kind,
            parameters,
            status: TaskStatus::Queued,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            next_eligible_at: now,
            last_error: None,
            operation_ids: Vec::new(),
            claimed_by: None,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Queued && self.next_eligible_at <= now
    }

    /// The record of the most recent attempt
    pub fn latest_operation(&self) -> Option<OperationId> {
        self.operation_ids.last().copied()
    }

    /// Whether another attempt is allowed after the current one
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    pub fn claim(&mut self, worker: &str, now: DateTime<Utc>) {
        self.status = TaskStatus::Running;
        self.claimed_by = Some(worker.to_string());
        self.claimed_at = Some(now);
        self.updated_at = now;
    }

    /// Counts an attempt once the lease is held
    pub fn begin_attempt(&mut self, now: DateTime<Utc>) {
        self.attempts += 1;
        self.updated_at = now;
    }

    pub fn record_operation(&mut self, id: OperationId) {
        if !self.operation_ids.contains(&id) {
            self.operation_ids.push(id);
        }
    }

    /// Back to the queue until `until`, without touching the attempt count
    pub fn defer(&mut self, until: DateTime<Utc>, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = TaskStatus::Queued;
        self.next_eligible_at = until;
        self.last_error = Some(reason.into());
        self.release_claim(now);
    }

    /// Back to the queue for another attempt at `at`
    pub fn schedule_retry(&mut self, at: DateTime<Utc>, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = TaskStatus::Queued;
        self.next_eligible_at = at;
        self.last_error = Some(error.into());
        self.release_claim(now);
    }

    pub fn succeed(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Succeeded;
        self.last_error = None;
        self.release_claim(now);
    }

    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = TaskStatus::Failed;
        self.last_error = Some(error.into());
        self.release_claim(now);
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Cancelled;
        self.release_claim(now);
    }

    /// Crash recovery: back to the queue
    ///
    /// An attempt that reached the runner stays spent, so an invocation that
    /// kills its worker every time still exhausts `max_attempts`.
    pub fn requeue_after_crash(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Queued;
        self.next_eligible_at = now;
        self.last_error = Some("worker interrupted; requeued".to_string());
        self.release_claim(now);
    }

    fn release_claim(&mut self, now: DateTime<Utc>) {
        self.claimed_by = None;
        self.claimed_at = None;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> SyncTask {
        SyncTask::new(OperationKind::ProductSync, OperationParams::new(), 3, Utc::now())
    }

    #[test]
    fn test_new_task_is_due() {
        let task = task();
        assert_eq!(task.status, TaskStatus::Queued);
        assert!(task.is_due(Utc::now()));
        assert!(task.has_attempts_left());
    }

    #[test]
    fn test_defer_keeps_attempts() {
        let now = Utc::now();
        let mut task = task();
        task.claim("w1", now);
        task.defer(now + chrono::Duration::seconds(30), "lease held", now);

        assert_eq!(task.attempts, 0);
        assert_eq!(task.status, TaskStatus::Queued);
        assert!(!task.is_due(now));
        assert!(task.claimed_by.is_none());
    }

    #[test]
    fn test_attempts_exhaust() {
        let now = Utc::now();
        let mut task = task();
        for _ in 0..3 {
            task.claim("w1", now);
            task.begin_attempt(now);
        }
        assert!(!task.has_attempts_left());
    }

    #[test]
    fn test_requeue_after_crash_keeps_spent_attempt() {
        let now = Utc::now();
        let mut task = task();
        task.claim("w1", now);
        task.begin_attempt(now);
        task.requeue_after_crash(now);

        assert_eq!(task.attempts, 1);
        assert!(task.is_due(now));
        assert!(task.has_attempts_left());

        // Claimed but never started: nothing was spent
        let mut idle = self::task();
        idle.claim("w1", now);
        idle.requeue_after_crash(now);
        assert_eq!(idle.attempts, 0);
    }

    #[test]
    fn test_record_operation_dedupes() {
        let mut task = task();
        let id = OperationId::new();
        task.record_operation(id);
        task.record_operation(id);
        assert_eq!(task.operation_ids.len(), 1);
        assert_eq!(task.latest_operation(), Some(id));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(TaskStatus::from_str("cancelled").unwrap(), TaskStatus::Cancelled);
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }
}
