//! Daily notification cadence.
//!
//! Every schedule inside its notification window gets run through a tiered
//! decision table keyed on calendar-day distance to the deadline and to the
//! grace-period end, throttled by the schedule's `last_notified_at` marker.
//! First matching tier wins; at most one notification per schedule per run.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, error, info, instrument};

use certtrack_core::clock::Clock;
use certtrack_notify::types::{SCHEDULE_LATE, SCHEDULE_OVERDUE, SCHEDULE_REMIND, SCHEDULE_WARN};
use certtrack_notify::{NotificationRequest, NotificationSink};
use certtrack_store::types::{ActorType, ScheduleContext};
use certtrack_store::Store;

use crate::error::Result;
use crate::report::NotifierReport;
use crate::retry::{with_backoff, RetryPolicy};

/// Notifications fired by this job expire after this many days unless the
/// config overrides it.
pub const DEFAULT_NOTIFICATION_EXPIRY_DAYS: i64 = 15;

/// Cadence tier for a schedule on a given day. Order matters: the first
/// matching rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadenceTier {
    /// More than 90 days out — quiet period.
    TooEarly,
    /// 30–90 days out — monthly reminder.
    MonthlyReminder,
    /// 7–29 days out — weekly reminder.
    WeeklyReminder,
    /// 1–6 days out — warning every 2 days.
    Warning,
    /// Deadline day — one warning.
    DueToday,
    /// Past deadline, inside grace — late notice every 3 days.
    Late,
    /// Past grace, within 7 days — overdue notice every 3 days.
    Overdue,
    /// More than 7 days past grace — notifications stop for good.
    Stopped,
}

pub fn tier_for(days_until_deadline: i64, days_until_grace_end: i64) -> CadenceTier {
    if days_until_deadline > 90 {
        CadenceTier::TooEarly
    } else if days_until_deadline >= 30 {
        CadenceTier::MonthlyReminder
    } else if days_until_deadline >= 7 {
        CadenceTier::WeeklyReminder
    } else if days_until_deadline >= 1 {
        CadenceTier::Warning
    } else if days_until_deadline == 0 {
        CadenceTier::DueToday
    } else if days_until_grace_end >= 0 {
        CadenceTier::Late
    } else if days_until_grace_end >= -7 {
        CadenceTier::Overdue
    } else {
        CadenceTier::Stopped
    }
}

/// Outcome of the decision table: whether to send now, and which code the
/// tier maps to (set even when the throttle suppresses the send).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceDecision {
    pub tier: CadenceTier,
    pub should_send: bool,
    pub code: Option<&'static str>,
}

/// Apply the decision table for one schedule on `today`.
pub fn decide(
    today: NaiveDate,
    deadline: NaiveDate,
    grace_end: NaiveDate,
    last_notified: Option<NaiveDate>,
) -> CadenceDecision {
    let days_until_deadline = (deadline - today).num_days();
    let days_until_grace_end = (grace_end - today).num_days();
    let days_since_last = last_notified.map(|d| (today - d).num_days());

    let tier = tier_for(days_until_deadline, days_until_grace_end);
    let (should_send, code) = match tier {
        CadenceTier::TooEarly | CadenceTier::Stopped => (false, None),
        CadenceTier::MonthlyReminder => {
            (throttle_elapsed(days_since_last, 30), Some(SCHEDULE_REMIND))
        }
        CadenceTier::WeeklyReminder => {
            (throttle_elapsed(days_since_last, 7), Some(SCHEDULE_REMIND))
        }
        CadenceTier::Warning => (throttle_elapsed(days_since_last, 2), Some(SCHEDULE_WARN)),
        // On the deadline day the throttle is "not yet notified today",
        // not a day-count.
        CadenceTier::DueToday => (last_notified != Some(today), Some(SCHEDULE_WARN)),
        CadenceTier::Late => (throttle_elapsed(days_since_last, 3), Some(SCHEDULE_LATE)),
        CadenceTier::Overdue => (throttle_elapsed(days_since_last, 3), Some(SCHEDULE_OVERDUE)),
    };

    CadenceDecision {
        tier,
        should_send,
        code,
    }
}

/// Never notified, or at least `min_days` since the last notification.
fn throttle_elapsed(days_since_last: Option<i64>, min_days: i64) -> bool {
    days_since_last.map_or(true, |d| d >= min_days)
}

pub struct CadenceEngine {
    store: Arc<Store>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    expiry_days: i64,
}

impl CadenceEngine {
    pub fn new(
        store: Arc<Store>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            sink,
            clock,
            retry,
            expiry_days: DEFAULT_NOTIFICATION_EXPIRY_DAYS,
        }
    }

    pub fn with_expiry_days(mut self, days: i64) -> Self {
        self.expiry_days = days;
        self
    }

    /// Run the daily job to completion, retrying transient store failures.
    pub async fn run(&self, request_id: &str) -> NotifierReport {
        match with_backoff(&self.retry, "cadence_engine", request_id, || {
            self.run_once(request_id)
        })
        .await
        {
            Ok(report) => report,
            Err(e) => {
                error!(%request_id, error = %e, "cadence engine failed");
                NotifierReport::failed(request_id, e.to_string())
            }
        }
    }

    #[instrument(skip(self))]
    async fn run_once(&self, request_id: &str) -> Result<NotifierReport> {
        let now = self.clock.now_utc();
        let today = now.date_naive();

        let schedules = self.store.list_schedules_needing_attention(now)?;

        let mut processed = 0u64;
        let mut sent = 0u64;
        let mut errors = 0u64;

        for ctx in &schedules {
            processed += 1;
            match self.process_schedule(ctx, today, now).await {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => {
                    error!(
                        schedule_id = %ctx.schedule.id,
                        error = %e,
                        "error processing schedule"
                    );
                    errors += 1;
                }
            }
        }

        info!(
            processed,
            notifications_sent = sent,
            errors,
            "daily cadence run completed"
        );

        Ok(NotifierReport {
            success: true,
            processed_count: processed,
            notifications_sent: sent,
            error_count: errors,
            error: None,
            request_id: request_id.to_string(),
        })
    }

    /// Returns `true` when a notification was actually created. Skips —
    /// throttled tiers, empty recipient sets, unregistered codes — leave
    /// the throttle marker untouched.
    async fn process_schedule(
        &self,
        ctx: &ScheduleContext,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let decision = decide(
            today,
            ctx.schedule.submission_deadline.date_naive(),
            ctx.schedule.grace_period_deadline.date_naive(),
            ctx.schedule.last_notified_at.map(|d| d.date_naive()),
        );
        if !decision.should_send {
            return Ok(false);
        }
        let Some(code) = decision.code else {
            return Ok(false);
        };

        let recipients = self.store.list_eligible_student_user_ids(&ctx.schedule.id)?;
        if recipients.is_empty() {
            debug!(schedule_id = %ctx.schedule.id, "no eligible recipients");
            return Ok(false);
        }

        // One notification per schedule per run; recipient fan-out is rows
        // on the notification, delivery belongs to the dispatcher.
        let created = self
            .sink
            .create_notification(NotificationRequest {
                code: code.to_string(),
                entity_id: ctx.schedule.id.clone(),
                actor_type: ActorType::System,
                actor_id: None,
                recipient_ids: recipients,
                expires_at: Some(now + Duration::days(self.expiry_days)),
                metadata: None,
            })
            .await?;
        if created.is_none() {
            return Ok(false);
        }

        self.store
            .update_schedule_last_notified(&ctx.schedule.id, now)?;
        Ok(true)
    }
}
