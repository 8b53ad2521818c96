//! Daily notification expiry.
//!
//! The cadence engine stamps every notification with an expiry; once that
//! instant passes, any recipient still waiting for delivery is moved to
//! EXPIRED so stale reminders are never delivered late. Recipients in any
//! other state are untouched, which makes re-runs harmless.

use std::sync::Arc;

use tracing::{error, info, instrument};

use certtrack_core::clock::Clock;
use certtrack_store::Store;

use crate::error::Result;
use crate::report::ExpirerReport;
use crate::retry::{with_backoff, RetryPolicy};

pub struct NotificationExpirer {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl NotificationExpirer {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            retry,
        }
    }

    /// Run the daily job to completion, retrying transient store failures.
    pub async fn run(&self, request_id: &str) -> ExpirerReport {
        match with_backoff(&self.retry, "notification_expirer", request_id, || {
            self.run_once(request_id)
        })
        .await
        {
            Ok(report) => report,
            Err(e) => {
                error!(%request_id, error = %e, "notification expirer failed");
                ExpirerReport::failed(request_id, e.to_string())
            }
        }
    }

    #[instrument(skip(self))]
    async fn run_once(&self, request_id: &str) -> Result<ExpirerReport> {
        let now = self.clock.now_utc();

        let expiring = self.store.list_expiring_notifications(now)?;
        let total_checked = expiring.len() as u64;

        let mut expired_notifications = 0u64;
        let mut expired_recipients = 0u64;

        for notification in &expiring {
            let expired = self.store.expire_pending_recipients(&notification.id)? as u64;
            if expired > 0 {
                expired_notifications += 1;
                expired_recipients += expired;
            }
        }

        info!(
            expired_notifications,
            expired_recipients, total_checked, "daily notification expiry completed"
        );

        Ok(ExpirerReport {
            success: true,
            expired_notifications,
            expired_recipients,
            total_checked,
            error: None,
            request_id: request_id.to_string(),
        })
    }
}
