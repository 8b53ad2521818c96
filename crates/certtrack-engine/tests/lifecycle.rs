// End-to-end runs of the four jobs against an in-memory store with a
// frozen clock. Each test seeds its own fixture; nothing is shared.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

use certtrack_core::calendar;
use certtrack_core::clock::{Clock, FixedClock};
use certtrack_engine::{
    CadenceEngine, NotificationExpirer, RequirementArchiver, RetryPolicy, ScheduleMaterializer,
};
use certtrack_notify::types::{SCHEDULE_REMIND, SCHEDULE_WARN};
use certtrack_notify::{ProviderRegistry, StoreSink};
use certtrack_store::types::{
    ActorType, NewNotification, NewSchedule, RecipientStatus, RecurrenceKind, Requirement,
    SubmissionStatus,
};
use certtrack_store::Store;

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 1,
        base_delay: std::time::Duration::from_millis(0),
        max_delay: std::time::Duration::from_millis(0),
    }
}

struct Fixture {
    store: Arc<Store>,
    clock: Arc<FixedClock>,
    program_id: String,
}

impl Fixture {
    fn new(now: DateTime<Utc>) -> Self {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let program_id = store
            .insert_program("CS-ENG", "Computer Science", 4, now)
            .unwrap();
        Self {
            store,
            clock: Arc::new(FixedClock(now)),
            program_id,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    fn requirement(&self, id: &str, cert_type: &str) -> Requirement {
        Requirement {
            id: id.to_string(),
            program_id: self.program_id.clone(),
            cert_type_id: cert_type.to_string(),
            name: "Research ethics certificate".to_string(),
            target_year: 1,
            deadline_month: 3,
            deadline_day: 15,
            grace_period_days: 7,
            is_mandatory: true,
            is_active: true,
            recurrence_kind: RecurrenceKind::Annual,
            last_recurrence_at: None,
            notification_days_before_deadline: 90,
            effective_from_year: None,
            effective_until_year: None,
            months_before_deadline: Some(3),
        }
    }

    fn materializer(&self) -> ScheduleMaterializer {
        ScheduleMaterializer::new(self.store.clone(), self.clock.clone(), fast_retry())
    }

    fn cadence(&self) -> CadenceEngine {
        let sink = Arc::new(StoreSink::new(
            self.store.clone(),
            ProviderRegistry::with_schedule_providers(),
            self.clock.clone(),
        ));
        CadenceEngine::new(self.store.clone(), sink, self.clock.clone(), fast_retry())
    }

    /// Seed an academic year, a requirement and a schedule with the given
    /// deadline, bypassing the materializer. Returns the schedule id.
    fn seed_schedule(
        &self,
        cert_type: &str,
        cohort_year: i32,
        deadline: DateTime<Utc>,
    ) -> String {
        let now = self.now();
        let (start, end) = calendar::academic_year_span(cohort_year).unwrap();
        let ay = self
            .store
            .get_or_create_academic_year(cohort_year, start, end, now)
            .unwrap();

        let req_id = format!("req-{cert_type}");
        self.store
            .insert_requirement(&self.requirement(&req_id, cert_type), now)
            .unwrap();

        let schedule_id = format!("sched-{cert_type}");
        self.store
            .insert_schedules(
                &[NewSchedule {
                    id: schedule_id.clone(),
                    requirement_id: req_id,
                    academic_year_id: ay.id,
                    submission_deadline: deadline,
                    grace_period_deadline: deadline + Duration::days(7),
                    start_notify_at: deadline - Duration::days(90),
                }],
                now,
            )
            .unwrap();
        schedule_id
    }

    /// Enroll `n` active students in the cohort. Returns their user ids.
    fn seed_students(&self, cohort_year: i32, n: usize) -> Vec<String> {
        let now = self.now();
        let (start, end) = calendar::academic_year_span(cohort_year).unwrap();
        let ay = self
            .store
            .get_or_create_academic_year(cohort_year, start, end, now)
            .unwrap();
        (0..n)
            .map(|i| {
                let user_id = format!("user-{cohort_year}-{i}");
                self.store
                    .insert_student(&user_id, &self.program_id, &ay.id, "active", now)
                    .unwrap();
                user_id
            })
            .collect()
    }
}

// --- materializer -----------------------------------------------------------

/// Dec 15 with a Mar 15 deadline and a 3-month window: the creation date is
/// exactly today, so the schedule is materialized this run.
#[tokio::test]
async fn materializes_schedule_when_creation_window_opens() {
    let now = Utc.with_ymd_and_hms(2024, 12, 15, 2, 0, 0).unwrap();
    let fx = Fixture::new(now);
    fx.seed_students(2024, 3);
    fx.store
        .insert_requirement(&fx.requirement("req-1", "cert-ethics"), now)
        .unwrap();

    let report = fx.materializer().run("req-id-1").await;

    assert!(report.success);
    assert_eq!(report.processed_count, 1);
    assert_eq!(report.created_count, 1);
    assert_eq!(report.skipped_count, 0);
    assert_eq!(report.current_academic_year, 2024);

    let schedules = fx.store.list_schedules_for_requirement("req-1").unwrap();
    assert_eq!(schedules.len(), 1);
    let schedule = &schedules[0];

    // Deadline: Mar 15 of the academic year's spring, 23:59:59 Bangkok.
    let deadline = Utc.with_ymd_and_hms(2025, 3, 15, 16, 59, 59).unwrap();
    assert_eq!(schedule.submission_deadline, deadline);
    assert_eq!(schedule.grace_period_deadline, deadline + Duration::days(7));
    assert_eq!(schedule.start_notify_at, deadline - Duration::days(90));
    assert_eq!(schedule.last_notified_at, None);

    // Recurrence marker: Aug 1 00:00:00 UTC of the cohort year.
    let requirement = fx.store.get_requirement("req-1").unwrap().unwrap();
    assert_eq!(
        requirement.last_recurrence_at,
        Some(Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap())
    );

    // Stats seeded with the active headcount, all outstanding.
    let stats = fx.store.get_schedule_stats(&schedule.id).unwrap().unwrap();
    assert_eq!(stats.total_required, 3);
    assert_eq!(stats.not_submitted_count, 3);
    assert_eq!(stats.submitted_count, 0);
}

/// The schedule's academic-year FK stores the student cohort year; only the
/// deadline timestamps use the deadline year. Pinning the asymmetry.
#[tokio::test]
async fn cohort_year_fk_vs_deadline_year_timestamps() {
    let now = Utc.with_ymd_and_hms(2024, 12, 15, 2, 0, 0).unwrap();
    let fx = Fixture::new(now);
    fx.store
        .insert_requirement(&fx.requirement("req-1", "cert-ethics"), now)
        .unwrap();

    fx.materializer().run("req-id-2").await;

    let schedules = fx.store.list_schedules_for_requirement("req-1").unwrap();
    let schedule = &schedules[0];

    let cohort_year = fx.store.get_academic_year(2024).unwrap().unwrap();
    assert_eq!(schedule.academic_year_id, cohort_year.id);
    assert_eq!(schedule.submission_deadline.year(), 2025);

    // Lookup is by cohort year, not deadline year.
    assert!(fx.store.get_schedule("req-1", 2024).unwrap().is_some());
    assert!(fx.store.get_schedule("req-1", 2025).unwrap().is_none());
}

#[tokio::test]
async fn second_run_never_duplicates_a_schedule() {
    let now = Utc.with_ymd_and_hms(2024, 12, 15, 2, 0, 0).unwrap();
    let fx = Fixture::new(now);
    fx.store
        .insert_requirement(&fx.requirement("req-1", "cert-ethics"), now)
        .unwrap();

    let first = fx.materializer().run("run-1").await;
    assert_eq!(first.created_count, 1);

    let second = fx.materializer().run("run-2").await;
    assert!(second.success);
    assert_eq!(second.created_count, 0);
    assert_eq!(second.skipped_count, 1);

    assert_eq!(
        fx.store.list_schedules_for_requirement("req-1").unwrap().len(),
        1
    );
}

/// The dedup marker compares the year component only: a marker stamped for
/// the cohort with a completely different month/day still suppresses
/// re-materialization after a mid-cycle deadline edit.
#[tokio::test]
async fn recurrence_marker_compares_year_only() {
    let now = Utc.with_ymd_and_hms(2024, 12, 15, 2, 0, 0).unwrap();
    let fx = Fixture::new(now);

    let mut marked = fx.requirement("req-marked", "cert-a");
    marked.last_recurrence_at = Some(Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap());
    fx.store.insert_requirement(&marked, now).unwrap();

    let mut stale = fx.requirement("req-stale", "cert-b");
    stale.last_recurrence_at = Some(Utc.with_ymd_and_hms(2023, 8, 1, 0, 0, 0).unwrap());
    fx.store.insert_requirement(&stale, now).unwrap();

    let report = fx.materializer().run("run-3").await;

    assert_eq!(report.created_count, 1);
    assert!(fx
        .store
        .list_schedules_for_requirement("req-marked")
        .unwrap()
        .is_empty());
    assert_eq!(
        fx.store
            .list_schedules_for_requirement("req-stale")
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn effectiveness_window_is_inclusive() {
    let now = Utc.with_ymd_and_hms(2024, 12, 15, 2, 0, 0).unwrap();
    let fx = Fixture::new(now);

    // Cohort for target_year 1 in Dec 2024 is 2024.
    let mut not_yet = fx.requirement("req-future", "cert-a");
    not_yet.effective_from_year = Some(2025);
    fx.store.insert_requirement(&not_yet, now).unwrap();

    let mut last_year = fx.requirement("req-boundary", "cert-b");
    last_year.effective_until_year = Some(2024);
    fx.store.insert_requirement(&last_year, now).unwrap();

    let report = fx.materializer().run("run-4").await;

    assert_eq!(report.created_count, 1);
    assert!(fx
        .store
        .list_schedules_for_requirement("req-future")
        .unwrap()
        .is_empty());
    assert_eq!(
        fx.store
            .list_schedules_for_requirement("req-boundary")
            .unwrap()
            .len(),
        1
    );
}

// --- cadence ----------------------------------------------------------------

#[tokio::test]
async fn due_today_fires_one_warning_and_reruns_stay_quiet() {
    // Deadline's UTC date equals today's UTC date.
    let now = Utc.with_ymd_and_hms(2025, 3, 15, 8, 0, 0).unwrap();
    let fx = Fixture::new(now);
    let deadline = Utc.with_ymd_and_hms(2025, 3, 15, 16, 59, 59).unwrap();
    let schedule_id = fx.seed_schedule("cert-ethics", 2024, deadline);
    let users = fx.seed_students(2024, 2);

    let report = fx.cadence().run("daily-1").await;
    assert!(report.success);
    assert_eq!(report.processed_count, 1);
    assert_eq!(report.notifications_sent, 1);

    let notifications = fx
        .store
        .list_notifications_for_entity(&schedule_id)
        .unwrap();
    assert_eq!(notifications.len(), 1);
    let notification = &notifications[0];
    assert_eq!(notification.code, SCHEDULE_WARN);
    assert_eq!(notification.actor_type, ActorType::System);
    assert_eq!(notification.expires_at, Some(now + Duration::days(15)));

    let recipients = fx
        .store
        .list_recipient_statuses(&notification.id)
        .unwrap();
    assert_eq!(recipients.len(), users.len());
    assert!(recipients
        .iter()
        .all(|(_, status)| *status == RecipientStatus::Pending));

    // Same day, second run: throttle says already notified today.
    let again = fx.cadence().run("daily-2").await;
    assert_eq!(again.notifications_sent, 0);
    assert_eq!(
        fx.store
            .list_notifications_for_entity(&schedule_id)
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn monthly_tier_honors_thirty_day_throttle() {
    let now = Utc.with_ymd_and_hms(2025, 1, 29, 8, 0, 0).unwrap();
    let fx = Fixture::new(now);
    // 45 days until deadline.
    let deadline = Utc.with_ymd_and_hms(2025, 3, 15, 16, 59, 59).unwrap();
    let schedule_id = fx.seed_schedule("cert-ethics", 2024, deadline);
    fx.seed_students(2024, 1);

    // Notified 20 days ago — inside the 30-day throttle.
    fx.store
        .update_schedule_last_notified(&schedule_id, now - Duration::days(20))
        .unwrap();
    let throttled = fx.cadence().run("daily-3").await;
    assert_eq!(throttled.notifications_sent, 0);

    // Notified 35 days ago — throttle elapsed, reminder fires.
    fx.store
        .update_schedule_last_notified(&schedule_id, now - Duration::days(35))
        .unwrap();
    let sent = fx.cadence().run("daily-4").await;
    assert_eq!(sent.notifications_sent, 1);

    let notifications = fx
        .store
        .list_notifications_for_entity(&schedule_id)
        .unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].code, SCHEDULE_REMIND);

    // Throttle marker advanced to now.
    let schedule = fx
        .store
        .get_schedule_context(&schedule_id)
        .unwrap()
        .unwrap()
        .schedule;
    assert_eq!(schedule.last_notified_at, Some(now));
}

#[tokio::test]
async fn hard_stop_after_seven_days_past_grace() {
    let now = Utc.with_ymd_and_hms(2025, 3, 30, 8, 0, 0).unwrap();
    let fx = Fixture::new(now);
    // Grace ended Mar 22 — 8 days ago, outside the window query entirely.
    let deadline = Utc.with_ymd_and_hms(2025, 3, 15, 16, 59, 59).unwrap();
    let schedule_id = fx.seed_schedule("cert-ethics", 2024, deadline);
    fx.seed_students(2024, 1);

    let report = fx.cadence().run("daily-5").await;
    assert_eq!(report.processed_count, 0);
    assert_eq!(report.notifications_sent, 0);
    assert!(fx
        .store
        .list_notifications_for_entity(&schedule_id)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn approved_submissions_leave_no_recipients_and_skip_silently() {
    let now = Utc.with_ymd_and_hms(2025, 3, 15, 8, 0, 0).unwrap();
    let fx = Fixture::new(now);
    let deadline = Utc.with_ymd_and_hms(2025, 3, 15, 16, 59, 59).unwrap();
    let schedule_id = fx.seed_schedule("cert-ethics", 2024, deadline);

    // One student, already approved for this schedule.
    let (start, end) = calendar::academic_year_span(2024).unwrap();
    let ay = fx
        .store
        .get_or_create_academic_year(2024, start, end, now)
        .unwrap();
    let student_id = fx
        .store
        .insert_student("user-done", &fx.program_id, &ay.id, "active", now)
        .unwrap();
    fx.store
        .insert_submission(&schedule_id, &student_id, SubmissionStatus::Approved, now)
        .unwrap();

    let report = fx.cadence().run("daily-6").await;
    assert_eq!(report.processed_count, 1);
    assert_eq!(report.notifications_sent, 0);

    // No throttle update on a silent skip.
    let schedule = fx
        .store
        .get_schedule_context(&schedule_id)
        .unwrap()
        .unwrap()
        .schedule;
    assert_eq!(schedule.last_notified_at, None);
}

#[tokio::test]
async fn unregistered_code_drops_request_without_throttle_update() {
    let now = Utc.with_ymd_and_hms(2025, 3, 15, 8, 0, 0).unwrap();
    let fx = Fixture::new(now);
    let deadline = Utc.with_ymd_and_hms(2025, 3, 15, 16, 59, 59).unwrap();
    let schedule_id = fx.seed_schedule("cert-ethics", 2024, deadline);
    fx.seed_students(2024, 1);

    // Empty registry: the sink has no provider for any schedule code.
    let sink = Arc::new(StoreSink::new(
        fx.store.clone(),
        ProviderRegistry::empty(),
        fx.clock.clone(),
    ));
    let engine = CadenceEngine::new(fx.store.clone(), sink, fx.clock.clone(), fast_retry());

    let report = engine.run("daily-7").await;
    assert_eq!(report.notifications_sent, 0);
    assert!(fx
        .store
        .list_notifications_for_entity(&schedule_id)
        .unwrap()
        .is_empty());

    let schedule = fx
        .store
        .get_schedule_context(&schedule_id)
        .unwrap()
        .unwrap()
        .schedule;
    assert_eq!(schedule.last_notified_at, None);
}

// --- archiver ---------------------------------------------------------------

#[tokio::test]
async fn archives_strictly_expired_requirements_only() {
    let now = Utc.with_ymd_and_hms(2024, 12, 15, 2, 0, 0).unwrap();
    let fx = Fixture::new(now);

    let mut expired = fx.requirement("req-old", "cert-a");
    expired.effective_until_year = Some(2023);
    fx.store.insert_requirement(&expired, now).unwrap();

    // Boundary: effective through the current academic year stays active.
    let mut current = fx.requirement("req-current", "cert-b");
    current.effective_until_year = Some(2024);
    fx.store.insert_requirement(&current, now).unwrap();

    let unbounded = fx.requirement("req-open", "cert-c");
    fx.store.insert_requirement(&unbounded, now).unwrap();

    let archiver = RequirementArchiver::new(fx.store.clone(), fx.clock.clone(), fast_retry());
    let report = archiver.run("annual-1").await;

    assert!(report.success);
    assert_eq!(report.archived_count, 1);
    assert_eq!(report.current_academic_year, 2024);

    assert!(!fx.store.get_requirement("req-old").unwrap().unwrap().is_active);
    assert!(fx
        .store
        .get_requirement("req-current")
        .unwrap()
        .unwrap()
        .is_active);
    assert!(fx.store.get_requirement("req-open").unwrap().unwrap().is_active);

    // Re-run finds nothing left to archive.
    let again = archiver.run("annual-2").await;
    assert_eq!(again.archived_count, 0);
}

// --- expirer ----------------------------------------------------------------

#[tokio::test]
async fn expirer_flips_pending_recipients_and_leaves_delivered_alone() {
    let now = Utc.with_ymd_and_hms(2025, 3, 20, 0, 5, 0).unwrap();
    let fx = Fixture::new(now);

    let stale_id = fx
        .store
        .insert_notification(
            &NewNotification {
                code: SCHEDULE_WARN.to_string(),
                entity_id: "sched-1".to_string(),
                actor_type: ActorType::System,
                actor_id: None,
                metadata: None,
                expires_at: Some(now - Duration::days(1)),
                recipient_ids: vec!["user-a".to_string(), "user-b".to_string()],
            },
            now - Duration::days(16),
        )
        .unwrap();
    // user-b already got theirs.
    fx.store
        .mark_recipient_delivered(&stale_id, "user-b", now - Duration::days(2))
        .unwrap();

    let fresh_id = fx
        .store
        .insert_notification(
            &NewNotification {
                code: SCHEDULE_WARN.to_string(),
                entity_id: "sched-2".to_string(),
                actor_type: ActorType::System,
                actor_id: None,
                metadata: None,
                expires_at: Some(now + Duration::days(1)),
                recipient_ids: vec!["user-c".to_string()],
            },
            now,
        )
        .unwrap();

    let expirer = NotificationExpirer::new(fx.store.clone(), fx.clock.clone(), fast_retry());
    let report = expirer.run("expire-1").await;

    assert!(report.success);
    assert_eq!(report.total_checked, 1);
    assert_eq!(report.expired_notifications, 1);
    assert_eq!(report.expired_recipients, 1);

    let statuses = fx.store.list_recipient_statuses(&stale_id).unwrap();
    assert_eq!(
        statuses,
        vec![
            ("user-a".to_string(), RecipientStatus::Expired),
            ("user-b".to_string(), RecipientStatus::Delivered),
        ]
    );

    let fresh = fx.store.list_recipient_statuses(&fresh_id).unwrap();
    assert_eq!(fresh[0].1, RecipientStatus::Pending);

    // Idempotent: nothing pending remains on the stale notification.
    let again = expirer.run("expire-2").await;
    assert_eq!(again.total_checked, 0);
    assert_eq!(again.expired_recipients, 0);
}
