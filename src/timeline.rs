use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dates::{months_elapsed, resolve_start_date, StartDate};
use crate::models::{ExpectedMonths, MilestoneId, StudentRecord, Timeline, TimelineMilestone, TimelineStatus};

/// Months before the programme end at which a student is flagged.
const WARNING_WINDOW_MONTHS: i32 = 3;

/// How many quarters a timeline spans for a given total duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuarterPolicy {
    /// 12 months shows 8 quarters, anything else 12, widened when the P5
    /// quarter would otherwise fall outside the range.
    #[default]
    Observed,
    /// Exactly enough quarters to reach the quarter holding P5.
    RoundUp,
}

impl QuarterPolicy {
    pub fn quarter_count(self, total_months: i32) -> usize {
        let through_target = quarter_index(total_months) + 1;
        match self {
            QuarterPolicy::Observed => {
                let observed = if total_months == 12 { 8 } else { 12 };
                through_target.max(observed)
            }
            QuarterPolicy::RoundUp => through_target,
        }
    }
}

/// Index of the quarter a month offset falls into; negative offsets map to 0.
pub fn quarter_index(month_offset: i32) -> usize {
    (month_offset.max(0) / 3) as usize
}

pub fn quarter_label(index: usize) -> String {
    format!("Y{}Q{}", index / 4 + 1, index % 4 + 1)
}

pub fn quarter_labels(count: usize) -> Vec<String> {
    (0..count).map(quarter_label).collect()
}

pub fn classify_status(p5_approved: bool, elapsed: i32, total_months: i32) -> TimelineStatus {
    if p5_approved {
        TimelineStatus::Completed
    } else if elapsed > total_months {
        TimelineStatus::Overduration
    } else if elapsed > total_months - WARNING_WINDOW_MONTHS {
        TimelineStatus::Warning
    } else {
        TimelineStatus::OnTrack
    }
}

/// Resolves the record's start date, warning when it falls back to `today`.
pub fn resolve_record_start(record: &StudentRecord, today: NaiveDate) -> StartDate {
    let start = resolve_start_date(&record.start_date, today);
    if start.is_fallback() {
        warn!(
            matric = %record.matric,
            raw = %record.start_date,
            "start date unreadable, anchoring on today"
        );
    }
    start
}

/// Builds the timeline, resolving the start date from the record.
pub fn build_timeline(
    record: &StudentRecord,
    months: &ExpectedMonths,
    policy: QuarterPolicy,
    today: NaiveDate,
) -> Timeline {
    let start = resolve_record_start(record, today);
    build_timeline_from(record, months, policy, start.date, today)
}

pub fn build_timeline_from(
    record: &StudentRecord,
    months: &ExpectedMonths,
    policy: QuarterPolicy,
    start: NaiveDate,
    today: NaiveDate,
) -> Timeline {
    let quarters = quarter_labels(policy.quarter_count(months.p5));

    let milestones = MilestoneId::ALL
        .iter()
        .map(|id| {
            let index = quarter_index(months.offset(*id)).min(quarters.len() - 1);
            let slot = record.slot(*id);
            TimelineMilestone {
                id: *id,
                expected_quarter: quarters[index].clone(),
                submitted: slot.is_submitted(),
                approved: slot.is_approved(),
            }
        })
        .collect();

    let status = classify_status(
        record.slot(MilestoneId::P5).is_approved(),
        months_elapsed(start, today),
        months.p5,
    );

    Timeline {
        quarters,
        milestones,
        status,
    }
}
