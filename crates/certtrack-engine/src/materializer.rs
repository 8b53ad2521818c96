//! Monthly schedule materialization.
//!
//! For every active requirement, work out which cohort it currently applies
//! to, and — if that cohort's schedule is due to exist within the next 30
//! days — create the schedule, its academic-year record (lazily) and its
//! dashboard stats seed, then stamp the requirement's recurrence marker.
//! Running monthly with a 30-day look-ahead catches every requirement
//! exactly once per cohort.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{error, info, instrument};
use uuid::Uuid;

use certtrack_core::calendar;
use certtrack_core::clock::Clock;
use certtrack_store::types::{NewSchedule, Requirement};
use certtrack_store::Store;

use crate::error::{EngineError, Result};
use crate::report::MaterializerReport;
use crate::retry::{with_backoff, RetryPolicy};

/// A schedule is only created once its creation date is at most this many
/// days away. Bounds how far ahead schedules exist.
pub const SCHEDULE_LOOKAHEAD_DAYS: i64 = 30;

/// Data carried alongside a staged schedule row for the post-insert steps
/// (stats seeding and recurrence-marker update).
struct StagedSchedule {
    row: NewSchedule,
    requirement_id: String,
    program_id: String,
    cert_type_id: String,
    cohort_year: i32,
}

pub struct ScheduleMaterializer {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl ScheduleMaterializer {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            retry,
        }
    }

    /// Run the monthly job to completion, retrying transient store failures.
    pub async fn run(&self, request_id: &str) -> MaterializerReport {
        let current_ay = calendar::current_academic_year(self.clock.business_date());
        match with_backoff(&self.retry, "schedule_materializer", request_id, || {
            self.run_once(request_id)
        })
        .await
        {
            Ok(report) => report,
            Err(e) => {
                error!(%request_id, error = %e, "schedule materializer failed");
                MaterializerReport::failed(request_id, current_ay, e.to_string())
            }
        }
    }

    #[instrument(skip(self))]
    async fn run_once(&self, request_id: &str) -> Result<MaterializerReport> {
        let now = self.clock.now_utc();
        let today = now.date_naive();
        let current_ay = calendar::current_academic_year(self.clock.business_date());

        info!(
            current_academic_year = current_ay,
            "starting monthly schedule materialization"
        );

        let requirements = self.store.list_active_requirements()?;
        if requirements.is_empty() {
            info!("no active requirements found");
            return Ok(MaterializerReport {
                success: true,
                processed_count: 0,
                created_count: 0,
                skipped_count: 0,
                error_count: 0,
                current_academic_year: current_ay,
                error: None,
                request_id: request_id.to_string(),
            });
        }

        let mut processed = 0u64;
        let mut skipped = 0u64;
        let mut errors = 0u64;
        let mut staged: Vec<StagedSchedule> = Vec::new();

        for requirement in &requirements {
            processed += 1;
            match self.stage_requirement(requirement, current_ay, now, today) {
                Ok(Some(entry)) => staged.push(entry),
                Ok(None) => skipped += 1,
                // Connectivity problems abort the batch into the retry
                // wrapper; anything else skips just this requirement.
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => {
                    error!(
                        requirement_id = %requirement.id,
                        error = %e,
                        "error processing requirement"
                    );
                    errors += 1;
                }
            }
        }

        let mut created = 0u64;
        if !staged.is_empty() {
            let rows: Vec<NewSchedule> = staged.iter().map(|s| s.row.clone()).collect();
            let inserted: std::collections::HashSet<String> =
                self.store.insert_schedules(&rows, now)?.into_iter().collect();
            created = inserted.len() as u64;

            for entry in &staged {
                // Stats only for rows that actually landed; a row the
                // unique constraint swallowed was seeded by the run that
                // won the race.
                if inserted.contains(&entry.row.id) {
                    self.seed_stats(entry, now)?;
                }

                // Year-only marker: August 1 of the cohort year, stamped for
                // every staged requirement — both the inserted and the
                // already-materialized path mean "this cohort is done".
                let marker = calendar::recurrence_marker(entry.cohort_year)?;
                self.store
                    .update_recurrence_marker(&entry.requirement_id, marker, now)?;
            }
        }

        info!(
            processed,
            created, skipped, errors, "monthly schedule materialization completed"
        );

        Ok(MaterializerReport {
            success: true,
            processed_count: processed,
            created_count: created,
            skipped_count: skipped,
            error_count: errors,
            current_academic_year: current_ay,
            error: None,
            request_id: request_id.to_string(),
        })
    }

    /// Apply the per-requirement pipeline; `Ok(None)` means a legitimate
    /// skip (not effective, already materialized, outside the window).
    fn stage_requirement(
        &self,
        requirement: &Requirement,
        current_ay: i32,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<Option<StagedSchedule>> {
        let Some(months_before) = requirement.months_before_deadline else {
            return Ok(None);
        };

        let cohort_year = calendar::student_cohort_year(current_ay, requirement.target_year);

        if !is_effective(requirement, cohort_year) {
            return Ok(None);
        }
        if self.store.get_schedule(&requirement.id, cohort_year)?.is_some() {
            return Ok(None);
        }
        if calendar::marker_matches_cohort(requirement.last_recurrence_at, cohort_year) {
            return Ok(None);
        }

        let deadline_ay = calendar::deadline_academic_year(cohort_year, requirement.target_year);
        let deadline = calendar::deadline_instant(
            deadline_ay,
            requirement.deadline_month,
            requirement.deadline_day,
        )?;

        // Look-ahead gate: calendar months back from the deadline, then a
        // 0..=30 day window on the date distance.
        let creation_date = calendar::months_before(deadline, months_before)?;
        let days_until_creation = (creation_date.date_naive() - today).num_days();
        if !(0..=SCHEDULE_LOOKAHEAD_DAYS).contains(&days_until_creation) {
            return Ok(None);
        }

        // The schedule belongs to the cohort's academic year, not the
        // deadline's; only the timestamps above use the deadline year.
        let (span_start, span_end) = calendar::academic_year_span(cohort_year)?;
        let academic_year =
            self.store
                .get_or_create_academic_year(cohort_year, span_start, span_end, now)?;

        let grace_deadline = deadline + Duration::days(requirement.grace_period_days);
        let start_notify_at =
            deadline - Duration::days(requirement.notification_days_before_deadline);

        Ok(Some(StagedSchedule {
            row: NewSchedule {
                id: Uuid::new_v4().to_string(),
                requirement_id: requirement.id.clone(),
                academic_year_id: academic_year.id,
                submission_deadline: deadline,
                grace_period_deadline: grace_deadline,
                start_notify_at,
            },
            requirement_id: requirement.id.clone(),
            program_id: requirement.program_id.clone(),
            cert_type_id: requirement.cert_type_id.clone(),
            cohort_year,
        }))
    }

    /// Seed the dashboard stats record with the cohort's active headcount.
    fn seed_stats(&self, entry: &StagedSchedule, now: DateTime<Utc>) -> Result<()> {
        let Some(program_code) = self.store.get_program_code(&entry.program_id)? else {
            return Err(EngineError::Store(certtrack_store::StoreError::NotFound {
                entity: "program",
                id: entry.program_id.clone(),
            }));
        };
        let headcount = self
            .store
            .count_active_students(&program_code, entry.cohort_year)?;
        self.store.insert_schedule_stats(
            &entry.row.id,
            &entry.program_id,
            &entry.cert_type_id,
            &entry.row.academic_year_id,
            headcount,
            now,
        )?;
        Ok(())
    }
}

/// Inclusive effectiveness bounds: a requirement applies to a cohort unless
/// the cohort enrolled before `effective_from_year` or after
/// `effective_until_year`.
fn is_effective(requirement: &Requirement, cohort_year: i32) -> bool {
    if requirement
        .effective_from_year
        .is_some_and(|from| cohort_year < from)
    {
        return false;
    }
    if requirement
        .effective_until_year
        .is_some_and(|until| cohort_year > until)
    {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use certtrack_store::types::RecurrenceKind;

    fn requirement(from: Option<i32>, until: Option<i32>) -> Requirement {
        Requirement {
            id: "req-1".into(),
            program_id: "prog-1".into(),
            cert_type_id: "cert-1".into(),
            name: "Safety certificate".into(),
            target_year: 1,
            deadline_month: 3,
            deadline_day: 15,
            grace_period_days: 7,
            is_mandatory: true,
            is_active: true,
            recurrence_kind: RecurrenceKind::Annual,
            last_recurrence_at: None,
            notification_days_before_deadline: 90,
            effective_from_year: from,
            effective_until_year: until,
            months_before_deadline: Some(3),
        }
    }

    #[test]
    fn effectiveness_bounds_are_inclusive() {
        let r = requirement(Some(2020), Some(2030));
        assert!(is_effective(&r, 2025));
        assert!(is_effective(&r, 2020));
        assert!(is_effective(&r, 2030));
        assert!(!is_effective(&r, 2019));
        assert!(!is_effective(&r, 2031));
    }

    #[test]
    fn unbounded_sides_always_pass() {
        assert!(is_effective(&requirement(None, None), 1999));
        assert!(is_effective(&requirement(None, None), 2099));

        let from_only = requirement(Some(2020), None);
        assert!(!is_effective(&from_only, 2019));
        assert!(is_effective(&from_only, 2031));

        let until_only = requirement(None, Some(2030));
        assert!(is_effective(&until_only, 2019));
        assert!(!is_effective(&until_only, 2031));
    }
}
