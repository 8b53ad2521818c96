use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::store::{fmt_utc, Store};
use crate::types::SubmissionStatus;

impl Store {
    /// Active-student headcount for a program and cohort academic year.
    /// Seeds the `total_required` figure on a schedule's stats record.
    pub fn count_active_students(&self, program_code: &str, year_code: i32) -> Result<i64> {
        let db = self.db.lock().unwrap();
        let count = db.query_row(
            "SELECT COUNT(*) FROM students st
             JOIN programs p ON p.id = st.program_id
             JOIN academic_years ay ON ay.id = st.academic_year_id
             WHERE p.program_code = ?1 AND ay.year_code = ?2
               AND st.enrollment_status = 'active'",
            rusqlite::params![program_code, year_code],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(count)
    }

    /// User ids of students who still owe a submission for a schedule:
    /// enrolled in the schedule's program and cohort year, minus anyone
    /// with an approved submission. An unknown schedule id yields an empty
    /// list, not an error.
    pub fn list_eligible_student_user_ids(&self, schedule_id: &str) -> Result<Vec<String>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT st.user_id
             FROM schedules s
             JOIN requirements r ON r.id = s.requirement_id
             JOIN students st ON st.program_id = r.program_id
                             AND st.academic_year_id = s.academic_year_id
             WHERE s.id = ?1
               AND st.id NOT IN (SELECT sub.student_id FROM submissions sub
                                 WHERE sub.schedule_id = s.id AND sub.status = 'approved')
             ORDER BY st.user_id",
        )?;
        let rows = stmt.query_map(rusqlite::params![schedule_id], |row| row.get::<_, String>(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Insert a student row — seeds and tests. Returns the student id.
    pub fn insert_student(
        &self,
        user_id: &str,
        program_id: &str,
        academic_year_id: &str,
        enrollment_status: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO students (id, user_id, program_id, academic_year_id,
                                   enrollment_status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                id,
                user_id,
                program_id,
                academic_year_id,
                enrollment_status,
                fmt_utc(now)
            ],
        )?;
        Ok(id)
    }

    /// Insert a certificate submission — seeds and tests.
    pub fn insert_submission(
        &self,
        schedule_id: &str,
        student_id: &str,
        status: SubmissionStatus,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO submissions (id, schedule_id, student_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![id, schedule_id, student_id, status.to_string(), fmt_utc(now)],
        )?;
        Ok(id)
    }
}
