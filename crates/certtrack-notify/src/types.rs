use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use certtrack_store::types::ActorType;

/// Notification codes the deadline lifecycle engine fires. The dispatcher's
/// channel templates key off these exact strings.
pub const SCHEDULE_REMIND: &str = "program_requirement_schedule_remind";
pub const SCHEDULE_WARN: &str = "program_requirement_schedule_warn";
pub const SCHEDULE_LATE: &str = "program_requirement_schedule_late";
pub const SCHEDULE_OVERDUE: &str = "program_requirement_schedule_overdue";

/// A request to create one notification, fanning out to every recipient.
///
/// Created by the cadence engine; consumed by a [`crate::NotificationSink`].
/// Delivery and rendering happen downstream — the engine never awaits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Code identifying the notification type (see the constants above).
    pub code: String,
    /// Id of the entity the notification is about (a schedule id here).
    pub entity_id: String,
    pub actor_type: ActorType,
    /// Triggering user, if any. Always `None` for scheduled jobs.
    pub actor_id: Option<String>,
    /// Target user ids. The sink creates one PENDING delivery row each.
    pub recipient_ids: Vec<String>,
    /// When undelivered copies of this notification go stale.
    pub expires_at: Option<DateTime<Utc>>,
    /// Extra metadata merged over the content provider's payload;
    /// caller-supplied keys win.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}
