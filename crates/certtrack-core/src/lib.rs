//! Shared foundation for the CertTrack deadline lifecycle engine:
//! configuration, the business clock/timezone adapter, and academic-year
//! calendar arithmetic. Every other crate in the workspace depends on this
//! one; it depends on nothing internal.

pub mod calendar;
pub mod clock;
pub mod config;
pub mod error;

pub use error::{CoreError, Result};
