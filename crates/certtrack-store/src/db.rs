use rusqlite::Connection;

use crate::error::Result;

/// Initialise the full schema. Safe to call on every startup — uses
/// `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_program_tables(conn)?;
    create_schedule_tables(conn)?;
    create_roster_tables(conn)?;
    create_notification_tables(conn)?;
    Ok(())
}

fn create_program_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS programs (
            id             TEXT PRIMARY KEY,
            program_code   TEXT NOT NULL UNIQUE,
            program_name   TEXT NOT NULL,
            duration_years INTEGER NOT NULL DEFAULT 4,
            created_at     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS requirements (
            id                TEXT PRIMARY KEY,
            program_id        TEXT NOT NULL REFERENCES programs(id),
            cert_type_id      TEXT NOT NULL,
            name              TEXT NOT NULL,
            target_year       INTEGER NOT NULL CHECK (target_year >= 1),
            deadline_month    INTEGER NOT NULL CHECK (deadline_month BETWEEN 1 AND 12),
            deadline_day      INTEGER NOT NULL CHECK (deadline_day BETWEEN 1 AND 31),
            grace_period_days INTEGER NOT NULL DEFAULT 7,
            is_mandatory      INTEGER NOT NULL DEFAULT 1,
            is_active         INTEGER NOT NULL DEFAULT 1,
            recurrence_kind   TEXT NOT NULL DEFAULT 'annual',
            last_recurrence_at TEXT,
            notification_days_before_deadline INTEGER NOT NULL DEFAULT 90,
            effective_from_year  INTEGER,
            effective_until_year INTEGER,
            months_before_deadline INTEGER
                CHECK (months_before_deadline IS NULL
                       OR months_before_deadline BETWEEN 1 AND 6),
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL,
            UNIQUE(program_id, cert_type_id, target_year),
            CHECK (effective_from_year IS NULL
                   OR effective_until_year IS NULL
                   OR effective_from_year <= effective_until_year)
        );
        CREATE INDEX IF NOT EXISTS idx_requirements_active
            ON requirements (is_active, program_id);",
    )?;
    Ok(())
}

fn create_schedule_tables(conn: &Connection) -> Result<()> {
    // UNIQUE(requirement_id, academic_year_id) is the materializer's
    // idempotence backstop: a second insert for the same cohort is ignored.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS academic_years (
            id         TEXT PRIMARY KEY,
            year_code  INTEGER NOT NULL UNIQUE,
            start_date TEXT NOT NULL,
            end_date   TEXT NOT NULL,
            created_at TEXT NOT NULL,
            CHECK (end_date > start_date)
        );

        CREATE TABLE IF NOT EXISTS schedules (
            id                    TEXT PRIMARY KEY,
            requirement_id        TEXT NOT NULL REFERENCES requirements(id) ON DELETE CASCADE,
            academic_year_id      TEXT NOT NULL REFERENCES academic_years(id),
            submission_deadline   TEXT NOT NULL,
            grace_period_deadline TEXT NOT NULL,
            start_notify_at       TEXT NOT NULL,
            last_notified_at      TEXT,
            created_at            TEXT NOT NULL,
            UNIQUE(requirement_id, academic_year_id)
        );
        CREATE INDEX IF NOT EXISTS idx_schedules_deadline
            ON schedules (submission_deadline);
        CREATE INDEX IF NOT EXISTS idx_schedules_notify_window
            ON schedules (start_notify_at, grace_period_deadline);

        CREATE TABLE IF NOT EXISTS schedule_stats (
            id                  TEXT PRIMARY KEY,
            schedule_id         TEXT NOT NULL UNIQUE REFERENCES schedules(id) ON DELETE CASCADE,
            program_id          TEXT NOT NULL,
            cert_type_id        TEXT NOT NULL,
            academic_year_id    TEXT NOT NULL,
            total_required      INTEGER NOT NULL,
            submitted_count     INTEGER NOT NULL DEFAULT 0,
            approved_count      INTEGER NOT NULL DEFAULT 0,
            not_submitted_count INTEGER NOT NULL,
            last_calculated_at  TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn create_roster_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS students (
            id                TEXT PRIMARY KEY,
            user_id           TEXT NOT NULL,
            program_id        TEXT NOT NULL REFERENCES programs(id),
            academic_year_id  TEXT NOT NULL REFERENCES academic_years(id),
            enrollment_status TEXT NOT NULL DEFAULT 'active',
            created_at        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_students_cohort
            ON students (program_id, academic_year_id);

        CREATE TABLE IF NOT EXISTS submissions (
            id          TEXT PRIMARY KEY,
            schedule_id TEXT NOT NULL REFERENCES schedules(id),
            student_id  TEXT NOT NULL REFERENCES students(id),
            status      TEXT NOT NULL DEFAULT 'pending',
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_submissions_schedule
            ON submissions (schedule_id, status);",
    )?;
    Ok(())
}

fn create_notification_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS notifications (
            id         TEXT PRIMARY KEY,
            code       TEXT NOT NULL,
            entity_id  TEXT NOT NULL,
            actor_type TEXT NOT NULL,
            actor_id   TEXT,
            metadata   TEXT,               -- JSON payload for the dispatcher
            expires_at TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_notifications_expires_at
            ON notifications (expires_at);
        CREATE INDEX IF NOT EXISTS idx_notifications_entity
            ON notifications (entity_id, code);

        CREATE TABLE IF NOT EXISTS notification_recipients (
            id              TEXT PRIMARY KEY,
            notification_id TEXT NOT NULL REFERENCES notifications(id) ON DELETE CASCADE,
            recipient_id    TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'pending',
            delivered_at    TEXT,
            read_at         TEXT,
            UNIQUE(notification_id, recipient_id)
        );
        CREATE INDEX IF NOT EXISTS idx_recipients_status
            ON notification_recipients (notification_id, status);",
    )?;
    Ok(())
}
