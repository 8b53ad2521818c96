//! Notification creation boundary.
//!
//! The engine decides *when* and *which* notification code fires; this crate
//! turns that decision into a persisted notification with per-recipient
//! delivery rows, attaching the metadata payload the external dispatcher
//! renders from. One [`content::ContentProvider`] per notification code,
//! looked up through an explicit code→provider table built at startup.

pub mod content;
pub mod error;
pub mod sink;
pub mod types;

pub use content::{ContentProvider, ProviderRegistry};
pub use error::{NotifyError, Result};
pub use sink::{NotificationSink, StoreSink};
pub use types::NotificationRequest;
