//! Read-only projections over committed state.
//!
//! Nothing here is persisted: percentages, status levels and estimates are
//! recomputed from allocation and obligation rows on every read, so they can
//! never drift from the counters they summarize.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{AllocationState, BulkAllocation, Period};

/// Thresholds and windows used by the projections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionPolicy {
    pub critical_threshold: i64,
    pub warning_threshold: i64,
    /// Trailing window, in days, used to measure the celebration rate.
    pub estimate_window_days: u32,
}

impl Default for ProjectionPolicy {
    fn default() -> Self {
        Self {
            critical_threshold: 5,
            warning_threshold: 10,
            estimate_window_days: 30,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Completed,
    Paused,
    Critical,
    Warning,
    Normal,
}

pub fn status_level(allocation: &BulkAllocation, policy: &ProjectionPolicy) -> StatusLevel {
    match allocation.state() {
        AllocationState::Completed => StatusLevel::Completed,
        AllocationState::Paused => StatusLevel::Paused,
        AllocationState::Active if allocation.remaining <= policy.critical_threshold => {
            StatusLevel::Critical
        }
        AllocationState::Active if allocation.remaining <= policy.warning_threshold => {
            StatusLevel::Warning
        }
        AllocationState::Active => StatusLevel::Normal,
    }
}

/// `part / whole` as a percentage rounded to two decimals.
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 100.0;
    }
    let raw = part as f64 / whole as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Completion date extrapolated from the recent celebration rate.
///
/// Kept apart from the committed allocation fields: this is a guess, not a
/// promise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub as_of: NaiveDate,
    pub window_days: u32,
    /// Celebrations per day over the trailing window.
    pub daily_rate: f64,
    pub completion_date: Option<NaiveDate>,
}

impl Estimate {
    pub fn for_allocation(
        allocation: &BulkAllocation,
        recent_celebrations: u64,
        window_days: u32,
        as_of: NaiveDate,
    ) -> Self {
        let daily_rate = if window_days == 0 {
            0.0
        } else {
            recent_celebrations as f64 / f64::from(window_days)
        };

        let completion_date = match allocation.state() {
            AllocationState::Completed => allocation.completed_on,
            AllocationState::Paused => None,
            AllocationState::Active if daily_rate > 0.0 => {
                let days = (allocation.remaining as f64 / daily_rate).ceil() as i64;
                as_of.checked_add_signed(Duration::days(days))
            }
            AllocationState::Active => None,
        };

        Self {
            as_of,
            window_days,
            daily_rate,
            completion_date,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationProgress {
    pub allocation: BulkAllocation,
    pub state: AllocationState,
    pub completion_percentage: f64,
    pub status_level: StatusLevel,
    pub estimate: Estimate,
}

impl AllocationProgress {
    pub fn new(
        allocation: BulkAllocation,
        recent_celebrations: u64,
        policy: &ProjectionPolicy,
        as_of: NaiveDate,
    ) -> Self {
        let estimate = Estimate::for_allocation(
            &allocation,
            recent_celebrations,
            policy.estimate_window_days,
            as_of,
        );
        Self {
            state: allocation.state(),
            completion_percentage: percentage(allocation.completed, allocation.total),
            status_level: status_level(&allocation, policy),
            estimate,
            allocation,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthlyStatus {
    Completed,
    Overdue,
    OnTrack,
    Behind,
    Urgent,
    Future,
}

impl MonthlyStatus {
    pub fn evaluate(period: Period, completed: i64, target: i64, as_of: NaiveDate) -> Self {
        let current = Period::of(as_of);
        if completed >= target {
            Self::Completed
        } else if period.is_before(current) {
            Self::Overdue
        } else if period == current {
            if completed * 100 >= target * 67 {
                Self::OnTrack
            } else if as_of.day() > 24 {
                Self::Urgent
            } else {
                Self::Behind
            }
        } else {
            Self::Future
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyProgress {
    pub owner_id: String,
    pub period: Period,
    pub completed: i64,
    pub target: i64,
    pub remaining: i64,
    pub completion_percentage: f64,
    pub status: MonthlyStatus,
}

impl MonthlyProgress {
    pub fn new(
        owner_id: String,
        period: Period,
        completed: i64,
        target: i64,
        as_of: NaiveDate,
    ) -> Self {
        Self {
            owner_id,
            period,
            completed,
            target,
            remaining: (target - completed).max(0),
            completion_percentage: percentage(completed, target),
            status: MonthlyStatus::evaluate(period, completed, target, as_of),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn allocation(total: i64, celebrated: i64) -> BulkAllocation {
        let mut alloc = BulkAllocation::new(
            "alice".to_string(),
            "Generalate".to_string(),
            total,
            date(2025, 1, 1),
            None,
            Utc::now(),
        )
        .unwrap();
        for _ in 0..celebrated {
            alloc.celebrate(date(2025, 1, 2), Utc::now()).unwrap();
        }
        alloc
    }

    #[test]
    fn status_levels() {
        let policy = ProjectionPolicy::default();
        assert_eq!(status_level(&allocation(30, 0), &policy), StatusLevel::Normal);
        assert_eq!(status_level(&allocation(30, 20), &policy), StatusLevel::Warning);
        assert_eq!(status_level(&allocation(30, 25), &policy), StatusLevel::Critical);
        assert_eq!(status_level(&allocation(30, 30), &policy), StatusLevel::Completed);

        let mut paused = allocation(30, 28);
        paused.pause("retreat", Utc::now()).unwrap();
        assert_eq!(status_level(&paused, &policy), StatusLevel::Paused);
    }

    #[test]
    fn percentage_rounds() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(0, 0), 100.0);
    }

    #[test]
    fn estimate_extrapolates_recent_rate() {
        let as_of = date(2025, 3, 1);
        let alloc = allocation(100, 40);

        // 30 celebrations in 30 days: one a day, 60 left.
        let estimate = Estimate::for_allocation(&alloc, 30, 30, as_of);
        assert_eq!(estimate.daily_rate, 1.0);
        assert_eq!(estimate.completion_date, Some(date(2025, 4, 30)));

        let idle = Estimate::for_allocation(&alloc, 0, 30, as_of);
        assert_eq!(idle.completion_date, None);

        let done = Estimate::for_allocation(&allocation(2, 2), 0, 30, as_of);
        assert_eq!(done.completion_date, Some(date(2025, 1, 2)));
    }

    #[test]
    fn progress_is_idempotent() {
        let policy = ProjectionPolicy::default();
        let alloc = allocation(10, 4);
        let first = AllocationProgress::new(alloc.clone(), 4, &policy, date(2025, 1, 10));
        let second = AllocationProgress::new(alloc, 4, &policy, date(2025, 1, 10));
        assert_eq!(first, second);
        assert_eq!(first.completion_percentage, 40.0);
    }

    #[test]
    fn monthly_status() {
        let january = Period::new(2025, 1).unwrap();
        assert_eq!(
            MonthlyStatus::evaluate(january, 3, 3, date(2025, 1, 5)),
            MonthlyStatus::Completed
        );
        assert_eq!(
            MonthlyStatus::evaluate(january, 1, 3, date(2025, 2, 5)),
            MonthlyStatus::Overdue
        );
        assert_eq!(
            MonthlyStatus::evaluate(january, 2, 3, date(2025, 1, 5)),
            MonthlyStatus::OnTrack
        );
        assert_eq!(
            MonthlyStatus::evaluate(january, 1, 3, date(2025, 1, 5)),
            MonthlyStatus::Behind
        );
        assert_eq!(
            MonthlyStatus::evaluate(january, 1, 3, date(2025, 1, 28)),
            MonthlyStatus::Urgent
        );
        assert_eq!(
            MonthlyStatus::evaluate(january, 0, 3, date(2024, 12, 28)),
            MonthlyStatus::Future
        );
    }
}
