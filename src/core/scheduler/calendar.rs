//! Periodic trigger calendar
//!
//! All times are UTC.

use crate::config::schema::{parse_time_of_day, parse_weekday};
use crate::config::SchedulerConfig;
use crate::domain::{OperationKind, Result, SyncError};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc, Weekday};
use std::fmt;

/// How often a trigger fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Every hour at `minute`
    Hourly { minute: u32 },
    Daily { at: NaiveTime },
    Weekly { weekday: Weekday, at: NaiveTime },
}

impl Cadence {
    /// First firing strictly after `from`
    pub fn next_after(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Cadence::Hourly { minute } => {
                let hour_start = from
                    .date_naive()
                    .and_hms_opt(from.hour(), 0, 0)
                    .unwrap_or_else(|| from.naive_utc())
                    .and_utc();
                let candidate = hour_start + Duration::minutes(i64::from(minute.min(59)));
                if candidate > from {
                    candidate
                } else {
                    candidate + Duration::hours(1)
                }
            }
            Cadence::Daily { at } => {
                let candidate = from.date_naive().and_time(at).and_utc();
                if candidate > from {
                    candidate
                } else {
                    candidate + Duration::days(1)
                }
            }
            Cadence::Weekly { weekday, at } => {
                let days_ahead = (7 + weekday.num_days_from_monday()
                    - from.weekday().num_days_from_monday())
                    % 7;
                let candidate = (from.date_naive() + Duration::days(i64::from(days_ahead)))
                    .and_time(at)
                    .and_utc();
                if candidate > from {
                    candidate
                } else {
                    candidate + Duration::days(7)
                }
            }
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Hourly { minute } => write!(f, "hourly at :{minute:02}"),
            Cadence::Daily { at } => write!(f, "daily at {}", at.format("%H:%M")),
            Cadence::Weekly { weekday, at } => {
                write!(f, "weekly on {weekday} at {}", at.format("%H:%M"))
            }
        }
    }
}

/// What a calendar entry does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Operation(OperationKind),
    PurgeOperationLog,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Operation(kind) => write!(f, "{kind}"),
            Trigger::PurgeOperationLog => f.write_str("purge_operation_log"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTrigger {
    pub trigger: Trigger,
    pub cadence: Cadence,
    pub next_due: DateTime<Utc>,
}

/// Routine schedule: daily products, hourly inventory, daily order export
/// for the previous day, weekly log purge
#[derive(Debug, Clone)]
pub struct TriggerCalendar {
    entries: Vec<ScheduledTrigger>,
}

impl TriggerCalendar {
    pub fn new(schedule: Vec<(Trigger, Cadence)>, now: DateTime<Utc>) -> Self {
        let entries = schedule
            .into_iter()
            .map(|(trigger, cadence)| ScheduledTrigger {
                trigger,
                cadence,
                next_due: cadence.next_after(now),
            })
            .collect();
        Self { entries }
    }

    pub fn from_config(config: &SchedulerConfig, now: DateTime<Utc>) -> Result<Self> {
        let product_at = parse_time_of_day("scheduler.product_sync_at", &config.product_sync_at)
            .map_err(SyncError::Configuration)?;
        let export_at = parse_time_of_day("scheduler.order_export_at", &config.order_export_at)
            .map_err(SyncError::Configuration)?;
        let purge_at = parse_time_of_day("scheduler.purge_at", &config.purge_at)
            .map_err(SyncError::Configuration)?;
        let purge_weekday = parse_weekday("scheduler.purge_weekday", &config.purge_weekday)
            .map_err(SyncError::Configuration)?;

        Ok(Self::new(
            vec![
                (
                    Trigger::Operation(OperationKind::ProductSync),
                    Cadence::Daily { at: product_at },
                ),
                (
                    Trigger::Operation(OperationKind::InventorySync),
                    Cadence::Hourly {
                        minute: config.inventory_sync_minute,
                    },
                ),
                (
                    Trigger::Operation(OperationKind::OrderExport),
                    Cadence::Daily { at: export_at },
                ),
                (
                    Trigger::PurgeOperationLog,
                    Cadence::Weekly {
                        weekday: purge_weekday,
                        at: purge_at,
                    },
                ),
            ],
            now,
        ))
    }

    pub fn entries(&self) -> &[ScheduledTrigger] {
        &self.entries
    }

    /// Triggers due at `now`; each fires once and moves to its next slot
    ///
    /// Slots missed while the process was down are not replayed.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<Trigger> {
        let mut fired = Vec::new();
        for entry in &mut self.entries {
            if entry.next_due <= now {
                fired.push(entry.trigger);
                entry.next_due = entry.cadence.next_after(now);
            }
        }
        fired
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.entries.iter().map(|e| e.next_due).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_hourly() {
        let cadence = Cadence::Hourly { minute: 0 };
        assert_eq!(cadence.next_after(at(2025, 3, 1, 10, 15)), at(2025, 3, 1, 11, 0));
        assert_eq!(cadence.next_after(at(2025, 3, 1, 10, 0)), at(2025, 3, 1, 11, 0));
        assert_eq!(cadence.next_after(at(2025, 3, 1, 23, 30)), at(2025, 3, 2, 0, 0));

        let cadence = Cadence::Hourly { minute: 30 };
        assert_eq!(cadence.next_after(at(2025, 3, 1, 10, 15)), at(2025, 3, 1, 10, 30));
    }

    #[test]
    fn test_daily() {
        let cadence = Cadence::Daily { at: time(2, 0) };
        assert_eq!(cadence.next_after(at(2025, 3, 1, 1, 0)), at(2025, 3, 1, 2, 0));
        assert_eq!(cadence.next_after(at(2025, 3, 1, 2, 0)), at(2025, 3, 2, 2, 0));
        assert_eq!(cadence.next_after(at(2025, 12, 31, 9, 0)), at(2026, 1, 1, 2, 0));
    }

    #[test]
    fn test_weekly() {
        let cadence = Cadence::Weekly {
            weekday: Weekday::Sun,
            at: time(4, 0),
        };
        // 2025-03-01 is a Saturday.
        assert_eq!(cadence.next_after(at(2025, 3, 1, 12, 0)), at(2025, 3, 2, 4, 0));
        assert_eq!(cadence.next_after(at(2025, 3, 2, 4, 0)), at(2025, 3, 9, 4, 0));
        assert_eq!(cadence.next_after(at(2025, 3, 2, 3, 59)), at(2025, 3, 2, 4, 0));
    }

    #[test]
    fn test_calendar_fires_each_trigger_once() {
        let start = at(2025, 3, 1, 1, 30);
        let mut calendar = TriggerCalendar::from_config(&SchedulerConfig::default(), start).unwrap();
        assert_eq!(calendar.entries().len(), 4);
        assert_eq!(calendar.next_due(), Some(at(2025, 3, 1, 2, 0)));

        let fired = calendar.due(at(2025, 3, 1, 2, 0));
        assert!(fired.contains(&Trigger::Operation(OperationKind::ProductSync)));
        assert!(fired.contains(&Trigger::Operation(OperationKind::InventorySync)));
        assert!(!fired.contains(&Trigger::Operation(OperationKind::OrderExport)));

        assert!(calendar.due(at(2025, 3, 1, 2, 0)).is_empty());
        assert_eq!(
            calendar.due(at(2025, 3, 1, 3, 0)),
            vec![
                Trigger::Operation(OperationKind::InventorySync),
                Trigger::Operation(OperationKind::OrderExport)
            ]
        );
    }

    #[test]
    fn test_bad_time_is_configuration_error() {
        let config = SchedulerConfig {
            product_sync_at: "25:00".into(),
            ..SchedulerConfig::default()
        };
        assert!(matches!(
            TriggerCalendar::from_config(&config, Utc::now()),
            Err(SyncError::Configuration(_))
        ));
    }
}
