//! SQLite persistence for the deadline lifecycle engine.
//!
//! One [`Store`] handle wraps a single connection behind a mutex; the four
//! jobs share it for the duration of a run. All timestamps are stored as
//! RFC-3339 UTC text, all ids as UUID text.

pub mod db;
pub mod error;
pub mod types;

mod academic_years;
mod notifications;
mod requirements;
mod roster;
mod schedules;
mod stats;
mod store;

pub use error::{Result, StoreError};
pub use schedules::POST_GRACE_NOTIFY_DAYS;
pub use stats::ScheduleStats;
pub use store::Store;
