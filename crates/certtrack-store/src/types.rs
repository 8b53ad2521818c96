use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How often a requirement re-materializes a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    /// A single schedule for one cohort, ever.
    Once,
    /// One schedule per cohort year.
    Annual,
}

impl Default for RecurrenceKind {
    fn default() -> Self {
        RecurrenceKind::Annual
    }
}

impl std::fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecurrenceKind::Once => "once",
            RecurrenceKind::Annual => "annual",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RecurrenceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "once" => Ok(RecurrenceKind::Once),
            "annual" => Ok(RecurrenceKind::Annual),
            other => Err(format!("unknown recurrence kind: {other}")),
        }
    }
}

/// Who triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    User,
    System,
    Scheduled,
}

impl Default for ActorType {
    fn default() -> Self {
        ActorType::System
    }
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActorType::User => "user",
            ActorType::System => "system",
            ActorType::Scheduled => "scheduled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ActorType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(ActorType::User),
            "system" => Ok(ActorType::System),
            "scheduled" => Ok(ActorType::Scheduled),
            other => Err(format!("unknown actor type: {other}")),
        }
    }
}

/// Delivery state of one notification-recipient pair.
///
/// PENDING → DELIVERED → READ, or PENDING → FAILED, or PENDING → EXPIRED.
/// READ, FAILED and EXPIRED are terminal; DELIVERED is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    Pending,
    Delivered,
    Read,
    Failed,
    Expired,
}

impl Default for RecipientStatus {
    fn default() -> Self {
        RecipientStatus::Pending
    }
}

impl RecipientStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RecipientStatus::Read | RecipientStatus::Failed | RecipientStatus::Expired
        )
    }
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecipientStatus::Pending => "pending",
            RecipientStatus::Delivered => "delivered",
            RecipientStatus::Read => "read",
            RecipientStatus::Failed => "failed",
            RecipientStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RecipientStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecipientStatus::Pending),
            "delivered" => Ok(RecipientStatus::Delivered),
            "read" => Ok(RecipientStatus::Read),
            "failed" => Ok(RecipientStatus::Failed),
            "expired" => Ok(RecipientStatus::Expired),
            other => Err(format!("unknown recipient status: {other}")),
        }
    }
}

/// Review state of a certificate submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
    ManualReview,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
            SubmissionStatus::ManualReview => "manual_review",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubmissionStatus::Pending),
            "approved" => Ok(SubmissionStatus::Approved),
            "rejected" => Ok(SubmissionStatus::Rejected),
            "manual_review" => Ok(SubmissionStatus::ManualReview),
            other => Err(format!("unknown submission status: {other}")),
        }
    }
}

/// A certificate obligation attached to a program and target year.
///
/// Definitional fields are owned by staff CRUD; the engine only ever writes
/// `is_active` (Archiver) and `last_recurrence_at` (Materializer).
#[derive(Debug, Clone)]
pub struct Requirement {
    pub id: String,
    pub program_id: String,
    pub cert_type_id: String,
    pub name: String,
    /// Ordinal year within the program this requirement applies to (1 = freshman).
    pub target_year: i32,
    /// Templated deadline: month/day, year-agnostic.
    pub deadline_month: u32,
    pub deadline_day: u32,
    pub grace_period_days: i64,
    pub is_mandatory: bool,
    pub is_active: bool,
    pub recurrence_kind: RecurrenceKind,
    /// Year-granularity dedup marker; only its year component is compared.
    pub last_recurrence_at: Option<DateTime<Utc>>,
    pub notification_days_before_deadline: i64,
    /// Inclusive cohort bounds; None = unbounded on that side.
    pub effective_from_year: Option<i32>,
    pub effective_until_year: Option<i32>,
    /// How many calendar months ahead a schedule must be materialized.
    pub months_before_deadline: Option<u32>,
}

/// An academic year record: year code plus its [start, end] UTC span.
#[derive(Debug, Clone)]
pub struct AcademicYear {
    pub id: String,
    pub year_code: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// One concrete deadline instance for (requirement, cohort academic year).
#[derive(Debug, Clone)]
pub struct Schedule {
    pub id: String,
    pub requirement_id: String,
    pub academic_year_id: String,
    pub submission_deadline: DateTime<Utc>,
    pub grace_period_deadline: DateTime<Utc>,
    pub start_notify_at: DateTime<Utc>,
    /// Throttle marker, set by the cadence engine after each send.
    pub last_notified_at: Option<DateTime<Utc>>,
}

/// A schedule staged for batch insertion by the materializer.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub id: String,
    pub requirement_id: String,
    pub academic_year_id: String,
    pub submission_deadline: DateTime<Utc>,
    pub grace_period_deadline: DateTime<Utc>,
    pub start_notify_at: DateTime<Utc>,
}

/// A schedule joined with its requirement, program and academic year —
/// everything the cadence engine and content providers need in one row.
#[derive(Debug, Clone)]
pub struct ScheduleContext {
    pub schedule: Schedule,
    pub requirement_name: String,
    pub program_id: String,
    pub program_code: String,
    pub program_name: String,
    pub cert_type_id: String,
    pub target_year: i32,
    pub is_mandatory: bool,
    /// Cohort academic year the schedule belongs to.
    pub year_code: i32,
}

/// A notification staged for insertion together with its recipients.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub code: String,
    pub entity_id: String,
    pub actor_type: ActorType,
    pub actor_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub expires_at: Option<DateTime<Utc>>,
    pub recipient_ids: Vec<String>,
}

/// A persisted notification header row.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: String,
    pub code: String,
    pub entity_id: String,
    pub actor_type: ActorType,
    pub actor_id: Option<String>,
    pub metadata: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn enum_text_round_trips() {
        for status in [
            RecipientStatus::Pending,
            RecipientStatus::Delivered,
            RecipientStatus::Read,
            RecipientStatus::Failed,
            RecipientStatus::Expired,
        ] {
            assert_eq!(RecipientStatus::from_str(&status.to_string()), Ok(status));
        }
        assert_eq!(RecurrenceKind::from_str("annual"), Ok(RecurrenceKind::Annual));
        assert_eq!(ActorType::from_str("scheduled"), Ok(ActorType::Scheduled));
        assert_eq!(
            SubmissionStatus::from_str("manual_review"),
            Ok(SubmissionStatus::ManualReview)
        );
        assert!(RecipientStatus::from_str("bogus").is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!RecipientStatus::Pending.is_terminal());
        assert!(!RecipientStatus::Delivered.is_terminal());
        assert!(RecipientStatus::Read.is_terminal());
        assert!(RecipientStatus::Failed.is_terminal());
        assert!(RecipientStatus::Expired.is_terminal());
    }
}
