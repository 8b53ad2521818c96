//! Clock and timezone adapter.
//!
//! All business-time decisions (academic-year boundaries, deadline
//! wall-clock times) happen in the fixed business timezone — Bangkok,
//! UTC+7 — while every stored timestamp is UTC. This module is the only
//! place where the two meet; jobs never call `Utc::now()` directly.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// Bangkok is UTC+7 year-round; Thailand has not observed DST since 1941.
pub const BANGKOK_OFFSET_SECS: i32 = 7 * 3600;

/// The business timezone as a chrono offset.
pub fn bangkok() -> FixedOffset {
    FixedOffset::east_opt(BANGKOK_OFFSET_SECS).expect("UTC+7 is a valid fixed offset")
}

/// Convert a Bangkok wall-clock datetime to a UTC instant.
///
/// A fixed offset has no DST gaps or folds, so the conversion is always
/// unambiguous.
pub fn bangkok_to_utc(local: NaiveDateTime) -> DateTime<Utc> {
    let shifted = local - Duration::seconds(i64::from(BANGKOK_OFFSET_SECS));
    DateTime::from_naive_utc_and_offset(shifted, Utc)
}

/// The calendar date in the business timezone for a given UTC instant.
pub fn business_date(now_utc: DateTime<Utc>) -> NaiveDate {
    now_utc.with_timezone(&bangkok()).date_naive()
}

/// Source of "now" for the jobs. Production uses [`SystemClock`]; tests pin
/// a [`FixedClock`] so every date computation is reproducible.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    /// Today's date in the business timezone.
    fn business_date(&self) -> NaiveDate {
        business_date(self.now_utc())
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}
