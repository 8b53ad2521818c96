use std::str::FromStr;

use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::store::{fmt_utc, fmt_utc_opt, parse_utc_opt, Store};
use crate::types::{RecurrenceKind, Requirement};

const REQUIREMENT_SELECT: &str = "SELECT id, program_id, cert_type_id, name, target_year,
        deadline_month, deadline_day, grace_period_days, is_mandatory, is_active,
        recurrence_kind, last_recurrence_at, notification_days_before_deadline,
        effective_from_year, effective_until_year, months_before_deadline
 FROM requirements";

/// Map a SELECT row (column order from REQUIREMENT_SELECT) to a Requirement.
fn row_to_requirement(row: &rusqlite::Row<'_>) -> rusqlite::Result<Requirement> {
    let kind = RecurrenceKind::from_str(&row.get::<_, String>(10)?).unwrap_or_default();
    Ok(Requirement {
        id: row.get(0)?,
        program_id: row.get(1)?,
        cert_type_id: row.get(2)?,
        name: row.get(3)?,
        target_year: row.get(4)?,
        deadline_month: row.get::<_, i64>(5)? as u32,
        deadline_day: row.get::<_, i64>(6)? as u32,
        grace_period_days: row.get(7)?,
        is_mandatory: row.get::<_, i64>(8)? != 0,
        is_active: row.get::<_, i64>(9)? != 0,
        recurrence_kind: kind,
        last_recurrence_at: parse_utc_opt(11, row.get(11)?)?,
        notification_days_before_deadline: row.get(12)?,
        effective_from_year: row.get(13)?,
        effective_until_year: row.get(14)?,
        months_before_deadline: row.get::<_, Option<i64>>(15)?.map(|m| m as u32),
    })
}

impl Store {
    /// All requirements the materializer considers: active, with a
    /// materialization window configured.
    pub fn list_active_requirements(&self) -> Result<Vec<Requirement>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!(
            "{REQUIREMENT_SELECT}
             WHERE is_active = 1 AND months_before_deadline IS NOT NULL
             ORDER BY program_id, target_year"
        ))?;
        let rows = stmt.query_map([], row_to_requirement)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Fetch one requirement by id.
    pub fn get_requirement(&self, id: &str) -> Result<Option<Requirement>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            &format!("{REQUIREMENT_SELECT} WHERE id = ?1"),
            rusqlite::params![id],
            row_to_requirement,
        ) {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Stamp the year-granularity recurrence dedup marker.
    #[instrument(skip(self))]
    pub fn update_recurrence_marker(
        &self,
        id: &str,
        marker: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE requirements SET last_recurrence_at = ?2, updated_at = ?3 WHERE id = ?1",
            rusqlite::params![id, fmt_utc(marker), fmt_utc(now)],
        )?;
        Ok(())
    }

    /// Active requirements whose effective window has ended: strict `<`,
    /// a requirement effective until the current academic year stays live.
    pub fn list_expired_requirements(&self, current_academic_year: i32) -> Result<Vec<Requirement>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!(
            "{REQUIREMENT_SELECT}
             WHERE is_active = 1
               AND effective_until_year IS NOT NULL
               AND effective_until_year < ?1
             ORDER BY program_id, effective_until_year, target_year"
        ))?;
        let rows = stmt.query_map(rusqlite::params![current_academic_year], row_to_requirement)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Deactivate the given requirements. Returns the number of rows that
    /// actually flipped; nothing is deleted.
    pub fn archive_requirements(&self, ids: &[String], now: DateTime<Utc>) -> Result<usize> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let mut archived = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE requirements SET is_active = 0, updated_at = ?2
                 WHERE id = ?1 AND is_active = 1",
            )?;
            for id in ids {
                archived += stmt.execute(rusqlite::params![id, fmt_utc(now)])?;
            }
        }
        tx.commit()?;
        Ok(archived)
    }

    /// Program code for a program id — used when seeding a schedule's stats
    /// record, which is keyed by code on the dashboard side.
    pub fn get_program_code(&self, program_id: &str) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT program_code FROM programs WHERE id = ?1",
            rusqlite::params![program_id],
            |row| row.get::<_, String>(0),
        ) {
            Ok(code) => Ok(Some(code)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert a program row. Staff CRUD owns these in production; the engine
    /// only reads them. Used by seeds and tests.
    pub fn insert_program(
        &self,
        program_code: &str,
        program_name: &str,
        duration_years: i32,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO programs (id, program_code, program_name, duration_years, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![id, program_code, program_name, duration_years, fmt_utc(now)],
        )?;
        Ok(id)
    }

    /// Insert a fully-specified requirement row. Staff CRUD owns these in
    /// production; used by seeds and tests.
    pub fn insert_requirement(&self, r: &Requirement, now: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO requirements
             (id, program_id, cert_type_id, name, target_year,
              deadline_month, deadline_day, grace_period_days, is_mandatory, is_active,
              recurrence_kind, last_recurrence_at, notification_days_before_deadline,
              effective_from_year, effective_until_year, months_before_deadline,
              created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?17)",
            rusqlite::params![
                r.id,
                r.program_id,
                r.cert_type_id,
                r.name,
                r.target_year,
                r.deadline_month,
                r.deadline_day,
                r.grace_period_days,
                r.is_mandatory,
                r.is_active,
                r.recurrence_kind.to_string(),
                fmt_utc_opt(r.last_recurrence_at),
                r.notification_days_before_deadline,
                r.effective_from_year,
                r.effective_until_year,
                r.months_before_deadline,
                fmt_utc(now),
            ],
        )?;
        Ok(())
    }
}
