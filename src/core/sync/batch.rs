//! Per-invocation counters and message log

use crate::log_record_failure;
use std::fmt::Display;

/// Running totals of one batch loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchTally {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub messages: Vec<String>,
}

impl BatchTally {
    /// A tally for a batch of `processed` records
    pub fn new(processed: usize) -> Self {
        Self {
            processed: processed as u64,
            ..Self::default()
        }
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.succeeded += 1;
        self.messages.push(message.into());
    }

    /// Records one failed record as `"<entity> <key>: <error>"`
    pub fn failure(&mut self, entity: &str, key: &str, error: &dyn Display) {
        log_record_failure!(entity, key, error);
        self.failed += 1;
        self.messages.push(format!("{entity} {key}: {error}"));
    }
}
