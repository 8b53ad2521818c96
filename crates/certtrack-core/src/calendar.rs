//! Academic-year and cohort arithmetic.
//!
//! An academic year spans August 1 through May 31 of the following calendar
//! year and is named after its starting year: January 2025 belongs to
//! academic year 2024, August 2025 to academic year 2025. Requirements are
//! defined against an ordinal `target_year` within a program (1 = freshman
//! year), which these functions translate into the cohort that must submit
//! and the calendar year a deadline falls in.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};

use crate::clock::bangkok_to_utc;
use crate::error::{CoreError, Result};

/// First month of an academic year.
const ACADEMIC_YEAR_START_MONTH: u32 = 8;

/// The academic year a business-timezone date falls in.
pub fn current_academic_year(business_date: NaiveDate) -> i32 {
    if business_date.month() >= ACADEMIC_YEAR_START_MONTH {
        business_date.year()
    } else {
        business_date.year() - 1
    }
}

/// The enrollment year of the cohort a requirement currently applies to.
///
/// `target_year` 1 is the current freshman cohort; higher target years point
/// at cohorts that enrolled earlier.
pub fn student_cohort_year(current_academic_year: i32, target_year: i32) -> i32 {
    current_academic_year - target_year + 1
}

/// The academic year the deadline itself falls in. For a cohort computed
/// from the current academic year this always lands back on the current
/// academic year.
pub fn deadline_academic_year(student_cohort_year: i32, target_year: i32) -> i32 {
    student_cohort_year + target_year - 1
}

/// The calendar year a deadline month falls in within an academic year:
/// August–December belong to the year the academic year starts in,
/// January–July to the following one. A March deadline of academic year
/// 2024 is March 2025.
pub fn deadline_calendar_year(deadline_academic_year: i32, month: u32) -> i32 {
    if month >= ACADEMIC_YEAR_START_MONTH {
        deadline_academic_year
    } else {
        deadline_academic_year + 1
    }
}

/// The UTC instant of a templated deadline: 23:59:59 Bangkok time on
/// `month`/`day` within the deadline academic year.
///
/// Fails with [`CoreError::InvalidDate`] when the month/day combination does
/// not exist in the resolved calendar year (Feb 29 outside a leap year,
/// Apr 31, ...).
pub fn deadline_instant(deadline_academic_year: i32, month: u32, day: u32) -> Result<DateTime<Utc>> {
    let year = deadline_calendar_year(deadline_academic_year, month);
    let local = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .ok_or(CoreError::InvalidDate { year, month, day })?;
    Ok(bangkok_to_utc(local))
}

/// The `[start, end]` UTC instants of an academic year: August 1 00:00:00
/// through May 31 23:59:59 of the following year, both Bangkok wall-clock.
pub fn academic_year_span(year_code: i32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = NaiveDate::from_ymd_opt(year_code, 8, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or(CoreError::InvalidDate {
            year: year_code,
            month: 8,
            day: 1,
        })?;
    let end = NaiveDate::from_ymd_opt(year_code + 1, 5, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .ok_or(CoreError::InvalidDate {
            year: year_code + 1,
            month: 5,
            day: 31,
        })?;
    Ok((bangkok_to_utc(start), bangkok_to_utc(end)))
}

/// The recurrence dedup marker for a cohort: August 1 00:00:00 UTC of the
/// cohort year.
///
/// Only the year component of this marker is ever compared (see
/// [`marker_matches_cohort`]); storing the academic-year start rather than
/// the real materialization time is what makes the comparison stable when a
/// requirement's deadline month/day is edited mid-cohort.
pub fn recurrence_marker(student_cohort_year: i32) -> Result<DateTime<Utc>> {
    let naive = NaiveDate::from_ymd_opt(student_cohort_year, 8, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or(CoreError::InvalidDate {
            year: student_cohort_year,
            month: 8,
            day: 1,
        })?;
    Ok(DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Whether a stored recurrence marker already covers a cohort.
///
/// Invariant: the comparison is by year only, never by full timestamp.
pub fn marker_matches_cohort(marker: Option<DateTime<Utc>>, student_cohort_year: i32) -> bool {
    marker.is_some_and(|m| m.year() == student_cohort_year)
}

/// Calendar-aware month subtraction (`Mar 15 - 3 months = Dec 15`), not
/// fixed 30-day blocks.
pub fn months_before(instant: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>> {
    instant
        .checked_sub_months(Months::new(months))
        .ok_or_else(|| CoreError::OutOfRange(format!("{instant} minus {months} months")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn academic_year_rolls_on_august_first() {
        assert_eq!(current_academic_year(d(2024, 7, 31)), 2023);
        assert_eq!(current_academic_year(d(2024, 8, 1)), 2024);
        assert_eq!(
            current_academic_year(d(2024, 8, 1)),
            current_academic_year(d(2024, 7, 31)) + 1
        );
    }

    #[test]
    fn january_belongs_to_previous_academic_year() {
        assert_eq!(current_academic_year(d(2025, 1, 15)), 2024);
        assert_eq!(current_academic_year(d(2024, 12, 31)), 2024);
    }

    #[test]
    fn cohort_arithmetic_round_trips_to_current_year() {
        // For every target year, the deadline academic year of the cohort
        // computed from the current year is the current year again.
        let current = 2025;
        for target in 1..=6 {
            let cohort = student_cohort_year(current, target);
            assert_eq!(cohort, current - target + 1);
            assert_eq!(deadline_academic_year(cohort, target), current);
        }
    }

    #[test]
    fn spring_deadlines_land_in_the_academic_years_second_half() {
        // March of academic year 2024 is calendar March 2025.
        assert_eq!(deadline_calendar_year(2024, 3), 2025);
        // September of academic year 2024 is calendar September 2024.
        assert_eq!(deadline_calendar_year(2024, 9), 2024);
        assert_eq!(deadline_calendar_year(2024, 7), 2025);
        assert_eq!(deadline_calendar_year(2024, 8), 2024);
    }

    #[test]
    fn deadline_instant_is_bangkok_end_of_day_in_utc() {
        let deadline = deadline_instant(2024, 3, 15).unwrap();
        assert_eq!(
            deadline,
            Utc.with_ymd_and_hms(2025, 3, 15, 16, 59, 59).unwrap()
        );

        let autumn = deadline_instant(2024, 9, 30).unwrap();
        assert_eq!(autumn, Utc.with_ymd_and_hms(2024, 9, 30, 16, 59, 59).unwrap());
    }

    #[test]
    fn deadline_instant_rejects_nonexistent_dates() {
        // Feb of academic year 2023 is calendar 2024 — a leap year.
        assert!(deadline_instant(2023, 2, 29).is_ok());
        // Feb of academic year 2024 is calendar 2025 — not a leap year.
        assert!(matches!(
            deadline_instant(2024, 2, 29),
            Err(CoreError::InvalidDate { .. })
        ));
    }

    #[test]
    fn academic_year_span_covers_august_through_may() {
        let (start, end) = academic_year_span(2024).unwrap();
        // Aug 1 00:00 Bangkok is Jul 31 17:00 UTC.
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 7, 31, 17, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 5, 31, 16, 59, 59).unwrap());
        assert!(end > start);
    }

    #[test]
    fn recurrence_marker_is_august_first_utc_of_cohort_year() {
        let marker = recurrence_marker(2024).unwrap();
        assert_eq!(marker, Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn marker_comparison_uses_year_only() {
        // A marker anywhere inside the cohort year matches, regardless of
        // the month/day it was stamped with.
        let stamped = Utc.with_ymd_and_hms(2024, 12, 25, 13, 37, 0).unwrap();
        assert!(marker_matches_cohort(Some(stamped), 2024));
        assert!(!marker_matches_cohort(Some(stamped), 2023));
        assert!(!marker_matches_cohort(None, 2024));
    }

    #[test]
    fn months_before_is_calendar_aware() {
        let mar15 = Utc.with_ymd_and_hms(2025, 3, 15, 16, 59, 59).unwrap();
        let dec15 = months_before(mar15, 3).unwrap();
        assert_eq!(dec15, Utc.with_ymd_and_hms(2024, 12, 15, 16, 59, 59).unwrap());

        // Day is clamped when the source day does not exist in the target month.
        let mar31 = Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap();
        let feb28 = months_before(mar31, 1).unwrap();
        assert_eq!(feb28, Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap());
    }
}
