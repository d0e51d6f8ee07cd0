//! Drives the periodic calendar

use super::calendar::{Trigger, TriggerCalendar};
use super::dispatcher::TaskDispatcher;
use crate::core::oplog::OperationLog;
use crate::core::sync::params::window_params;
use crate::domain::{ExportWindow, OperationKind, OperationParams};
use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// Parameters of a routine invocation fired at `now`
///
/// The order export covers the previous UTC day.
pub fn scheduled_params(kind: OperationKind, now: DateTime<Utc>) -> OperationParams {
    match kind {
        OperationKind::OrderExport => {
            window_params(&ExportWindow::previous_day(now.date_naive()))
        }
        OperationKind::ProductSync | OperationKind::InventorySync => OperationParams::new(),
    }
}

pub struct TriggerLoop {
    calendar: TriggerCalendar,
    dispatcher: TaskDispatcher,
    oplog: OperationLog,
    retention_days: u32,
    poll_interval: std::time::Duration,
}

impl TriggerLoop {
    pub fn new(
        calendar: TriggerCalendar,
        dispatcher: TaskDispatcher,
        oplog: OperationLog,
        retention_days: u32,
        poll_interval: std::time::Duration,
    ) -> Self {
        Self {
            calendar,
            dispatcher,
            oplog,
            retention_days,
            poll_interval,
        }
    }

    /// Fires whatever is due at `now`; failures are logged, never propagated
    pub async fn tick(&mut self, now: DateTime<Utc>) -> usize {
        let due = self.calendar.due(now);
        for trigger in &due {
            match trigger {
                Trigger::Operation(kind) => {
                    if let Err(e) = self
                        .dispatcher
                        .trigger(*kind, scheduled_params(*kind, now))
                        .await
                    {
                        tracing::error!(trigger = %trigger, error = %e, "Scheduled trigger failed");
                    }
                }
                Trigger::PurgeOperationLog => {
                    if let Err(e) = self.oplog.purge_older_than(self.retention_days, now).await {
                        tracing::error!(error = %e, "Operation log purge failed");
                    }
                }
            }
        }
        due.len()
    }

    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        for entry in self.calendar.entries() {
            tracing::info!(
                trigger = %entry.trigger,
                cadence = %entry.cadence,
                next_due = %entry.next_due,
                "Scheduled trigger registered"
            );
        }

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            self.tick(Utc::now()).await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown_rx.changed() => {}
            }
        }
        tracing::info!("Trigger loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::SyncStorage;
    use crate::adapters::memory::MemoryStorage;
    use crate::config::SchedulerConfig;
    use chrono::TimeZone;
    use std::sync::Arc;

    #[test]
    fn test_order_export_covers_previous_day() {
        let now = Utc.with_ymd_and_hms(2025, 3, 2, 3, 0, 0).unwrap();
        let params = scheduled_params(OperationKind::OrderExport, now);
        assert_eq!(params["date_from"], "2025-03-01");
        assert_eq!(params["date_to"], "2025-03-02");
        assert!(scheduled_params(OperationKind::ProductSync, now).is_empty());
    }

    #[tokio::test]
    async fn test_tick_enqueues_due_operations() {
        let memory = Arc::new(MemoryStorage::new());
        let storage: Arc<dyn SyncStorage> = memory.clone();
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 1, 30, 0).unwrap();
        let calendar = TriggerCalendar::from_config(&SchedulerConfig::default(), start).unwrap();
        let mut triggers = TriggerLoop::new(
            calendar,
            TaskDispatcher::new(storage.clone(), 3),
            OperationLog::new(storage),
            90,
            std::time::Duration::from_secs(1),
        );

        assert_eq!(triggers.tick(start).await, 0);
        assert_eq!(
            triggers
                .tick(Utc.with_ymd_and_hms(2025, 3, 1, 2, 0, 0).unwrap())
                .await,
            2
        );
        assert_eq!(memory.list_tasks().await.len(), 2);
    }
}
