//! Calendar trigger for snapshot compilation.
//!
//! A tokio interval polls the clock; whenever a scheduled instant falls in
//! the window since the previous poll, one compilation cycle runs. Instants
//! missed while the process was down are not replayed.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::compiler::{CycleOutcome, SnapshotCompiler};
use crate::error::SnapshotError;

/// A parsed cron schedule.
#[derive(Debug, Clone)]
pub struct SnapshotSchedule {
    expr: String,
    schedule: cron::Schedule,
}

impl SnapshotSchedule {
    /// Parse a cron expression (with leading seconds field).
    pub fn parse(expr: &str) -> Result<Self, SnapshotError> {
        let schedule =
            cron::Schedule::from_str(expr).map_err(|e| SnapshotError::InvalidSchedule {
                expr: expr.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            expr: expr.to_string(),
            schedule,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// First scheduled instant strictly after `t`.
    pub fn next_after(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&t).next()
    }

    /// The scheduled instant in `(last_check, now]`, if any. When several
    /// fall in the window only the first is returned; one run covers them.
    pub fn due_between(
        &self,
        last_check: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        self.next_after(last_check).filter(|fire_at| *fire_at <= now)
    }
}

/// Spawn the snapshot ticker background task.
pub fn spawn_snapshot_ticker(
    compiler: Arc<SnapshotCompiler>,
    schedule: SnapshotSchedule,
    poll_interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        // Skip immediate first tick
        ticker.tick().await;
        let mut last_check = Utc::now();

        if let Some(next) = schedule.next_after(last_check) {
            tracing::info!(schedule = %schedule.expr(), next = %next, "Snapshot ticker started");
        }

        loop {
            ticker.tick().await;
            let now = Utc::now();
            run_if_due(&compiler, &schedule, last_check, now).await;
            last_check = now;
        }
    })
}

/// One ticker poll covering `(last_check, now]`.
///
/// A due cycle is stamped with `now`, the poll time at which contacts are
/// read, not the scheduled instant. Returns `None` when nothing was due or
/// the cycle failed.
pub async fn run_if_due(
    compiler: &SnapshotCompiler,
    schedule: &SnapshotSchedule,
    last_check: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<CycleOutcome> {
    let fire_at = schedule.due_between(last_check, now)?;
    tracing::info!(scheduled_for = %fire_at, "Snapshot compilation due");
    compiler.run_scheduled(now).await
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::config::DEFAULT_SCHEDULE;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn default_schedule_is_first_of_month_midnight() {
        let schedule = SnapshotSchedule::parse(DEFAULT_SCHEDULE).unwrap();
        assert_eq!(
            schedule.next_after(utc(2025, 1, 15, 12, 0, 0)),
            Some(utc(2025, 2, 1, 0, 0, 0))
        );
        assert_eq!(
            schedule.next_after(utc(2025, 12, 31, 23, 59, 59)),
            Some(utc(2026, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn next_after_is_strict() {
        let schedule = SnapshotSchedule::parse(DEFAULT_SCHEDULE).unwrap();
        assert_eq!(
            schedule.next_after(utc(2025, 3, 1, 0, 0, 0)),
            Some(utc(2025, 4, 1, 0, 0, 0))
        );
    }

    #[test]
    fn due_between_window() {
        let schedule = SnapshotSchedule::parse(DEFAULT_SCHEDULE).unwrap();

        // Poll straddling midnight on the 1st.
        assert_eq!(
            schedule.due_between(utc(2025, 2, 28, 23, 59, 30), utc(2025, 3, 1, 0, 0, 30)),
            Some(utc(2025, 3, 1, 0, 0, 0))
        );
        // Ends exactly on the instant: included.
        assert_eq!(
            schedule.due_between(utc(2025, 2, 28, 23, 59, 0), utc(2025, 3, 1, 0, 0, 0)),
            Some(utc(2025, 3, 1, 0, 0, 0))
        );
        // Starts exactly on the instant: already handled by the previous poll.
        assert_eq!(
            schedule.due_between(utc(2025, 3, 1, 0, 0, 0), utc(2025, 3, 1, 0, 1, 0)),
            None
        );
        // Mid-month.
        assert_eq!(
            schedule.due_between(utc(2025, 3, 10, 0, 0, 0), utc(2025, 3, 10, 0, 1, 0)),
            None
        );
    }

    #[tokio::test]
    async fn due_cycle_is_stamped_with_poll_time() {
        use crate::contacts::{Contact, NewContact, PhoneNumber};
        use crate::snapshot::FileArtifactStore;
        use crate::store::{Database, LibSqlBackend};

        let tmp = tempfile::tempdir().unwrap();
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        db.insert_contact(&Contact::from_new(
            NewContact {
                name: "Alice".into(),
                phone: PhoneNumber::parse("+8801712345678").unwrap(),
                submitted_by: "U1".into(),
            },
            utc(2025, 2, 10, 8, 0, 0),
        ))
        .await
        .unwrap();
        let artifacts = Arc::new(FileArtifactStore::new(tmp.path(), "https://example.com/vcf"));
        let compiler = SnapshotCompiler::new(db.clone(), artifacts);
        let schedule = SnapshotSchedule::parse(DEFAULT_SCHEDULE).unwrap();

        // Mid-month poll: nothing due.
        let idle = run_if_due(
            &compiler,
            &schedule,
            utc(2025, 2, 20, 0, 0, 0),
            utc(2025, 2, 20, 0, 1, 0),
        )
        .await;
        assert!(idle.is_none());
        assert!(db.get_snapshot().await.unwrap().is_none());

        // Poll lands 40s after midnight on the 1st.
        let poll_time = utc(2025, 3, 1, 0, 0, 40);
        let outcome = run_if_due(&compiler, &schedule, utc(2025, 2, 28, 23, 59, 40), poll_time)
            .await
            .unwrap();
        let CycleOutcome::Compiled(snapshot) = outcome else {
            panic!("expected a compiled snapshot");
        };
        assert_eq!(snapshot.generated_at, poll_time);
        assert_eq!(db.get_snapshot().await.unwrap(), Some(snapshot));
    }

    #[test]
    fn invalid_expression_is_rejected() {
        let err = SnapshotSchedule::parse("not a cron").unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidSchedule { ref expr, .. } if expr == "not a cron"));
    }
}
