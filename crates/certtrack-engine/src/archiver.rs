//! Annual requirement archival.
//!
//! A requirement whose `effective_until_year` lies strictly before the
//! current academic year can never apply to another cohort; flip it
//! inactive so the materializer stops considering it. Rows are never
//! deleted.

use std::sync::Arc;

use tracing::{error, info, instrument};

use certtrack_core::calendar;
use certtrack_core::clock::Clock;
use certtrack_store::Store;

use crate::error::Result;
use crate::report::ArchiverReport;
use crate::retry::{with_backoff, RetryPolicy};

pub struct RequirementArchiver {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl RequirementArchiver {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            retry,
        }
    }

    /// Run the annual job to completion, retrying transient store failures.
    pub async fn run(&self, request_id: &str) -> ArchiverReport {
        let current_ay = calendar::current_academic_year(self.clock.business_date());
        match with_backoff(&self.retry, "requirement_archiver", request_id, || {
            self.run_once(request_id)
        })
        .await
        {
            Ok(report) => report,
            Err(e) => {
                error!(%request_id, error = %e, "requirement archiver failed");
                ArchiverReport::failed(request_id, current_ay, e.to_string())
            }
        }
    }

    #[instrument(skip(self))]
    async fn run_once(&self, request_id: &str) -> Result<ArchiverReport> {
        let now = self.clock.now_utc();
        let current_ay = calendar::current_academic_year(self.clock.business_date());

        info!(
            current_academic_year = current_ay,
            "starting annual requirement archival"
        );

        let expired = self.store.list_expired_requirements(current_ay)?;
        if expired.is_empty() {
            info!("no expired requirements found to archive");
            return Ok(ArchiverReport {
                success: true,
                archived_count: 0,
                current_academic_year: current_ay,
                error: None,
                request_id: request_id.to_string(),
            });
        }

        let ids: Vec<String> = expired.iter().map(|r| r.id.clone()).collect();
        let archived = self.store.archive_requirements(&ids, now)? as u64;

        info!(
            archived_count = archived,
            current_academic_year = current_ay,
            "annual requirement archival completed"
        );

        Ok(ArchiverReport {
            success: true,
            archived_count: archived,
            current_academic_year: current_ay,
            error: None,
            request_id: request_id.to_string(),
        })
    }
}
