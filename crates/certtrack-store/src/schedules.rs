use chrono::{DateTime, Duration, Utc};
use tracing::instrument;

use crate::error::{Result, StoreError};
use crate::store::{fmt_utc, parse_utc, parse_utc_opt, Store};
use crate::types::{NewSchedule, Schedule, ScheduleContext};

/// Outer bound of the notification window: schedules stay eligible until
/// this many days after the grace-period deadline.
pub const POST_GRACE_NOTIFY_DAYS: i64 = 7;

fn row_to_schedule(row: &rusqlite::Row<'_>) -> rusqlite::Result<Schedule> {
    Ok(Schedule {
        id: row.get(0)?,
        requirement_id: row.get(1)?,
        academic_year_id: row.get(2)?,
        submission_deadline: parse_utc(3, &row.get::<_, String>(3)?)?,
        grace_period_deadline: parse_utc(4, &row.get::<_, String>(4)?)?,
        start_notify_at: parse_utc(5, &row.get::<_, String>(5)?)?,
        last_notified_at: parse_utc_opt(6, row.get(6)?)?,
    })
}

const CONTEXT_SELECT: &str = "SELECT s.id, s.requirement_id, s.academic_year_id,
        s.submission_deadline, s.grace_period_deadline, s.start_notify_at, s.last_notified_at,
        r.name, r.program_id, p.program_code, p.program_name, r.cert_type_id,
        r.target_year, r.is_mandatory, ay.year_code
 FROM schedules s
 JOIN requirements r ON r.id = s.requirement_id
 JOIN programs p ON p.id = r.program_id
 JOIN academic_years ay ON ay.id = s.academic_year_id";

fn row_to_context(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleContext> {
    Ok(ScheduleContext {
        schedule: row_to_schedule(row)?,
        requirement_name: row.get(7)?,
        program_id: row.get(8)?,
        program_code: row.get(9)?,
        program_name: row.get(10)?,
        cert_type_id: row.get(11)?,
        target_year: row.get(12)?,
        is_mandatory: row.get::<_, i64>(13)? != 0,
        year_code: row.get(14)?,
    })
}

impl Store {
    /// The schedule for (requirement, cohort year), if one was already
    /// materialized. The year is matched against the academic-year record
    /// the schedule points at — the cohort year, by design.
    pub fn get_schedule(
        &self,
        requirement_id: &str,
        cohort_year: i32,
    ) -> Result<Option<Schedule>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT s.id, s.requirement_id, s.academic_year_id,
                    s.submission_deadline, s.grace_period_deadline,
                    s.start_notify_at, s.last_notified_at
             FROM schedules s
             JOIN academic_years ay ON ay.id = s.academic_year_id
             WHERE s.requirement_id = ?1 AND ay.year_code = ?2",
            rusqlite::params![requirement_id, cohort_year],
            row_to_schedule,
        ) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Batch-insert staged schedules inside one transaction.
    ///
    /// `INSERT OR IGNORE`: a unique-constraint clash on (requirement,
    /// academic year) means another run already materialized the cohort and
    /// counts as success, not an error. Returns the ids of the rows that
    /// were actually inserted, so follow-up work (stats seeding) never
    /// references a row the constraint swallowed.
    #[instrument(skip(self, schedules), fields(staged = schedules.len()))]
    pub fn insert_schedules(
        &self,
        schedules: &[NewSchedule],
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let mut inserted = Vec::new();
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO schedules
                 (id, requirement_id, academic_year_id, submission_deadline,
                  grace_period_deadline, start_notify_at, last_notified_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7)",
            )?;
            for s in schedules {
                let changed = stmt.execute(rusqlite::params![
                    s.id,
                    s.requirement_id,
                    s.academic_year_id,
                    fmt_utc(s.submission_deadline),
                    fmt_utc(s.grace_period_deadline),
                    fmt_utc(s.start_notify_at),
                    fmt_utc(now),
                ])?;
                if changed > 0 {
                    inserted.push(s.id.clone());
                }
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Set the notification throttle marker after a send.
    #[instrument(skip(self))]
    pub fn update_schedule_last_notified(
        &self,
        schedule_id: &str,
        notified_at: DateTime<Utc>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        let changed = db.execute(
            "UPDATE schedules SET last_notified_at = ?2 WHERE id = ?1",
            rusqlite::params![schedule_id, fmt_utc(notified_at)],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "schedule",
                id: schedule_id.to_string(),
            });
        }
        Ok(())
    }

    /// Schedules inside their notification window:
    /// `start_notify_at <= now <= grace_period_deadline + 7 days`,
    /// joined with requirement/program/year context, soonest deadline first.
    pub fn list_schedules_needing_attention(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduleContext>> {
        let cutoff = now - Duration::days(POST_GRACE_NOTIFY_DAYS);
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!(
            "{CONTEXT_SELECT}
             WHERE s.start_notify_at <= ?1 AND s.grace_period_deadline >= ?2
             ORDER BY s.submission_deadline"
        ))?;
        let rows = stmt.query_map(
            rusqlite::params![fmt_utc(now), fmt_utc(cutoff)],
            row_to_context,
        )?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Full display context for one schedule — used when building
    /// notification metadata.
    pub fn get_schedule_context(&self, schedule_id: &str) -> Result<Option<ScheduleContext>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            &format!("{CONTEXT_SELECT} WHERE s.id = ?1"),
            rusqlite::params![schedule_id],
            row_to_context,
        ) {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All schedules for a requirement — test and inspection helper.
    pub fn list_schedules_for_requirement(&self, requirement_id: &str) -> Result<Vec<Schedule>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, requirement_id, academic_year_id, submission_deadline,
                    grace_period_deadline, start_notify_at, last_notified_at
             FROM schedules WHERE requirement_id = ?1 ORDER BY submission_deadline",
        )?;
        let rows = stmt.query_map(rusqlite::params![requirement_id], row_to_schedule)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}
