use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::store::{fmt_utc, parse_utc, Store};
use crate::types::AcademicYear;

fn row_to_academic_year(row: &rusqlite::Row<'_>) -> rusqlite::Result<AcademicYear> {
    Ok(AcademicYear {
        id: row.get(0)?,
        year_code: row.get(1)?,
        start_date: parse_utc(2, &row.get::<_, String>(2)?)?,
        end_date: parse_utc(3, &row.get::<_, String>(3)?)?,
    })
}

impl Store {
    pub fn get_academic_year(&self, year_code: i32) -> Result<Option<AcademicYear>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT id, year_code, start_date, end_date FROM academic_years WHERE year_code = ?1",
            rusqlite::params![year_code],
            row_to_academic_year,
        ) {
            Ok(ay) => Ok(Some(ay)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Return the academic-year record for `year_code`, creating it lazily
    /// with the given span if it does not exist yet (upsert pattern).
    pub fn get_or_create_academic_year(
        &self,
        year_code: i32,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<AcademicYear> {
        let id = Uuid::new_v4().to_string();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR IGNORE INTO academic_years (id, year_code, start_date, end_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                id,
                year_code,
                fmt_utc(start_date),
                fmt_utc(end_date),
                fmt_utc(now)
            ],
        )?;

        // Read back — handles the race where two runs insert simultaneously.
        let ay = db.query_row(
            "SELECT id, year_code, start_date, end_date FROM academic_years WHERE year_code = ?1",
            rusqlite::params![year_code],
            row_to_academic_year,
        )?;
        Ok(ay)
    }
}
