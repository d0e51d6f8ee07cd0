//! Task scheduling, retries and leases
//!
//! # Modules
//!
//! - [`task`] - Durable task objects with attempt count and next-eligible time
//! - [`retry`] - Fixed-delay bounded retry policy
//! - [`lease`] - Per-(kind, parameters) mutual exclusion
//! - [`dispatcher`] - On-demand trigger path
//! - [`worker`] - Worker pool consuming the queue
//! - [`calendar`] / [`triggers`] - Routine daily, hourly and weekly triggers
//! - [`alert`] - Operator channel for exhausted retries

pub mod alert;
pub mod calendar;
pub mod dispatcher;
pub mod lease;
pub mod retry;
pub mod runner;
pub mod task;
pub mod triggers;
pub mod worker;

pub use alert::{alert_sink, Alert, AlertSink, TracingAlertSink, WebhookAlertSink};
pub use calendar::{Cadence, Trigger, TriggerCalendar};
pub use dispatcher::TaskDispatcher;
pub use lease::{lease_key, LeaseGuard};
pub use retry::{RetryPolicy, Verdict};
pub use runner::{ConfiguredRunner, OperationRunner};
pub use task::{SyncTask, TaskStatus};
pub use triggers::TriggerLoop;
pub use worker::{WorkerPool, WorkerSettings};
