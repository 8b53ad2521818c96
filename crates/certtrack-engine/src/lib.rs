//! The deadline lifecycle engine: four independent, idempotent batch jobs
//! sharing one store.
//!
//! - [`materializer::ScheduleMaterializer`] (monthly) creates per-cohort
//!   submission schedules once their look-ahead window opens.
//! - [`cadence::CadenceEngine`] (daily) walks every schedule inside its
//!   notification window and fires tiered reminders with throttling.
//! - [`archiver::RequirementArchiver`] (annual) deactivates requirements
//!   whose effective window has ended.
//! - [`expirer::NotificationExpirer`] (daily) expires stale pending
//!   notification deliveries.
//!
//! An external cron-style scheduler triggers each job; a run is a single
//! logical unit of work with bounded-backoff retries on transient store
//! failures.

pub mod archiver;
pub mod cadence;
pub mod error;
pub mod expirer;
pub mod materializer;
pub mod report;
pub mod retry;

pub use archiver::RequirementArchiver;
pub use cadence::CadenceEngine;
pub use error::{EngineError, Result};
pub use expirer::NotificationExpirer;
pub use materializer::ScheduleMaterializer;
pub use retry::RetryPolicy;
