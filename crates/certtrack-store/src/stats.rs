use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::store::{fmt_utc, Store};

/// Aggregate dashboard record seeded alongside each new schedule.
#[derive(Debug, Clone)]
pub struct ScheduleStats {
    pub id: String,
    pub schedule_id: String,
    pub total_required: i64,
    pub submitted_count: i64,
    pub approved_count: i64,
    pub not_submitted_count: i64,
}

impl Store {
    /// Seed the stats record for a freshly materialized schedule: the full
    /// headcount is outstanding, nothing submitted yet. `INSERT OR IGNORE`
    /// keeps a re-run from resetting counters an earlier run already seeded.
    pub fn insert_schedule_stats(
        &self,
        schedule_id: &str,
        program_id: &str,
        cert_type_id: &str,
        academic_year_id: &str,
        total_required: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR IGNORE INTO schedule_stats
             (id, schedule_id, program_id, cert_type_id, academic_year_id,
              total_required, submitted_count, approved_count,
              not_submitted_count, last_calculated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?6, ?7)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                schedule_id,
                program_id,
                cert_type_id,
                academic_year_id,
                total_required,
                fmt_utc(now),
            ],
        )?;
        Ok(())
    }

    pub fn get_schedule_stats(&self, schedule_id: &str) -> Result<Option<ScheduleStats>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT id, schedule_id, total_required, submitted_count,
                    approved_count, not_submitted_count
             FROM schedule_stats WHERE schedule_id = ?1",
            rusqlite::params![schedule_id],
            |row| {
                Ok(ScheduleStats {
                    id: row.get(0)?,
                    schedule_id: row.get(1)?,
                    total_required: row.get(2)?,
                    submitted_count: row.get(3)?,
                    approved_count: row.get(4)?,
                    not_submitted_count: row.get(5)?,
                })
            },
        ) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
