//! Per-code metadata builders.
//!
//! The dispatcher renders channel templates from a JSON metadata payload;
//! each notification code has one [`ContentProvider`] that knows how to
//! assemble that payload from the schedule the notification points at. The
//! [`ProviderRegistry`] is the explicit code→provider table — built once at
//! process start, no reflection.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::warn;

use certtrack_store::types::ScheduleContext;
use certtrack_store::Store;

use crate::error::{NotifyError, Result};
use crate::types::{SCHEDULE_LATE, SCHEDULE_OVERDUE, SCHEDULE_REMIND, SCHEDULE_WARN};

/// Builds the dispatcher-facing metadata for one notification code.
pub trait ContentProvider: Send + Sync {
    /// The notification code this provider serves.
    fn code(&self) -> &'static str;

    /// Assemble the metadata payload for the given entity.
    fn build_metadata(&self, store: &Store, entity_id: &str, now: DateTime<Utc>) -> Result<Value>;
}

/// Days from `now` until `deadline`, floored at zero.
fn days_remaining(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (deadline.date_naive() - now.date_naive()).num_days().max(0)
}

/// Days `now` is past `deadline`, floored at zero.
fn days_past(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now.date_naive() - deadline.date_naive()).num_days().max(0)
}

fn fetch_context(store: &Store, code: &str, entity_id: &str) -> Result<ScheduleContext> {
    store
        .get_schedule_context(entity_id)?
        .ok_or_else(|| NotifyError::MissingEntity {
            code: code.to_string(),
            entity_id: entity_id.to_string(),
        })
}

/// Fields shared by every schedule notification.
fn base_metadata(ctx: &ScheduleContext) -> serde_json::Map<String, Value> {
    let mandatory_flag = if ctx.is_mandatory {
        "This is a mandatory requirement."
    } else {
        "This is an optional requirement."
    };
    let mut map = serde_json::Map::new();
    map.insert("schedule_id".into(), json!(ctx.schedule.id));
    map.insert("requirement_name".into(), json!(ctx.requirement_name));
    map.insert("program_name".into(), json!(ctx.program_name));
    map.insert("program_code".into(), json!(ctx.program_code));
    map.insert("academic_year".into(), json!(ctx.year_code));
    map.insert("target_year".into(), json!(ctx.target_year));
    map.insert("is_mandatory".into(), json!(ctx.is_mandatory));
    map.insert("mandatory_flag".into(), json!(mandatory_flag));
    map.insert(
        "deadline_date".into(),
        json!(ctx.schedule.submission_deadline.date_naive().to_string()),
    );
    map.insert(
        "grace_period_deadline".into(),
        json!(ctx.schedule.grace_period_deadline.date_naive().to_string()),
    );
    map
}

/// Upcoming-deadline reminder (30–90 and 7–30 day tiers).
pub struct RemindProvider;

impl ContentProvider for RemindProvider {
    fn code(&self) -> &'static str {
        SCHEDULE_REMIND
    }

    fn build_metadata(&self, store: &Store, entity_id: &str, now: DateTime<Utc>) -> Result<Value> {
        let ctx = fetch_context(store, self.code(), entity_id)?;
        let mut map = base_metadata(&ctx);
        map.insert(
            "days_remaining".into(),
            json!(days_remaining(ctx.schedule.submission_deadline, now)),
        );
        map.insert("urgency".into(), json!("normal"));
        Ok(Value::Object(map))
    }
}

/// Imminent-deadline warning (under 7 days, and deadline day itself).
pub struct WarnProvider;

impl ContentProvider for WarnProvider {
    fn code(&self) -> &'static str {
        SCHEDULE_WARN
    }

    fn build_metadata(&self, store: &Store, entity_id: &str, now: DateTime<Utc>) -> Result<Value> {
        let ctx = fetch_context(store, self.code(), entity_id)?;
        let remaining = days_remaining(ctx.schedule.submission_deadline, now);
        let mut map = base_metadata(&ctx);
        map.insert("days_remaining".into(), json!(remaining));
        map.insert("is_due_today".into(), json!(remaining == 0));
        map.insert("urgency".into(), json!("high"));
        Ok(Value::Object(map))
    }
}

/// Past deadline but inside the grace period.
pub struct LateProvider;

impl ContentProvider for LateProvider {
    fn code(&self) -> &'static str {
        SCHEDULE_LATE
    }

    fn build_metadata(&self, store: &Store, entity_id: &str, now: DateTime<Utc>) -> Result<Value> {
        let ctx = fetch_context(store, self.code(), entity_id)?;
        let mut map = base_metadata(&ctx);
        map.insert(
            "days_late".into(),
            json!(days_past(ctx.schedule.submission_deadline, now)),
        );
        map.insert(
            "grace_days_remaining".into(),
            json!(days_remaining(ctx.schedule.grace_period_deadline, now)),
        );
        map.insert("urgency".into(), json!("high"));
        Ok(Value::Object(map))
    }
}

/// Past the grace period, inside the final 7-day window.
pub struct OverdueProvider;

impl ContentProvider for OverdueProvider {
    fn code(&self) -> &'static str {
        SCHEDULE_OVERDUE
    }

    fn build_metadata(&self, store: &Store, entity_id: &str, now: DateTime<Utc>) -> Result<Value> {
        let ctx = fetch_context(store, self.code(), entity_id)?;
        let mut map = base_metadata(&ctx);
        map.insert(
            "days_overdue".into(),
            json!(days_past(ctx.schedule.grace_period_deadline, now)),
        );
        map.insert("urgency".into(), json!("urgent"));
        Ok(Value::Object(map))
    }
}

/// Explicit code→provider table.
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Box<dyn ContentProvider>>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// The standard table: one provider per schedule notification code.
    pub fn with_schedule_providers() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(RemindProvider));
        registry.register(Box::new(WarnProvider));
        registry.register(Box::new(LateProvider));
        registry.register(Box::new(OverdueProvider));
        registry
    }

    pub fn register(&mut self, provider: Box<dyn ContentProvider>) {
        self.providers.insert(provider.code(), provider);
    }

    /// Look up the provider for a code, logging when none is registered.
    pub fn get(&self, code: &str) -> Option<&dyn ContentProvider> {
        let provider = self.providers.get(code).map(|p| p.as_ref());
        if provider.is_none() {
            warn!(%code, "no content provider registered for notification code");
        }
        provider
    }

    pub fn is_registered(&self, code: &str) -> bool {
        self.providers.contains_key(code)
    }

    pub fn registered_codes(&self) -> Vec<&'static str> {
        let mut codes: Vec<_> = self.providers.keys().copied().collect();
        codes.sort_unstable();
        codes
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_schedule_providers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_all_schedule_codes() {
        let registry = ProviderRegistry::with_schedule_providers();
        for code in [SCHEDULE_REMIND, SCHEDULE_WARN, SCHEDULE_LATE, SCHEDULE_OVERDUE] {
            assert!(registry.is_registered(code), "missing provider for {code}");
        }
        assert!(!registry.is_registered("certificate_submission_submit"));
        assert!(registry.get("nonexistent_code").is_none());
    }

    #[test]
    fn day_math_floors_at_zero() {
        use chrono::TimeZone;
        let deadline = Utc.with_ymd_and_hms(2025, 3, 15, 16, 59, 59).unwrap();
        let before = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 3, 20, 9, 0, 0).unwrap();

        assert_eq!(days_remaining(deadline, before), 5);
        assert_eq!(days_remaining(deadline, after), 0);
        assert_eq!(days_past(deadline, after), 5);
        assert_eq!(days_past(deadline, before), 0);
    }
}
