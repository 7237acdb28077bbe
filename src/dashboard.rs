use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::config::TrackerConfig;
use crate::dates::{month_start_after, quarter_ranges, resolve_start_date};
use crate::models::{MilestoneId, Progress, ProgrammeClass, QuarterRange, StudentRecord, Timeline, TimelineStatus};
use crate::progress::score_progress;
use crate::timeline::{build_timeline_from, resolve_record_start};
use crate::tracker::RowFailure;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentView {
    pub matric: String,
    pub name: String,
    pub programme: String,
    pub programme_class: ProgrammeClass,
    pub start_date: NaiveDate,
    pub start_date_fallback: bool,
    pub timeline: Timeline,
    pub progress: Progress,
    pub quarter_ranges: Vec<QuarterRange>,
}

pub fn evaluate_student(record: &StudentRecord, config: &TrackerConfig, today: NaiveDate) -> StudentView {
    let class = ProgrammeClass::classify(&record.programme);
    let months = config.expected_months(class);

    let start = resolve_record_start(record, today);
    let timeline = build_timeline_from(record, months, config.quarter_policy, start.date, today);
    let quarter_ranges = quarter_ranges(start.date, &timeline.quarters);

    StudentView {
        matric: record.matric.clone(),
        name: record.name.clone(),
        programme: record.programme.clone(),
        programme_class: class,
        start_date: start.date,
        start_date_fallback: start.is_fallback(),
        progress: score_progress(record, &config.weights),
        timeline,
        quarter_ranges,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MilestoneTally {
    pub submitted: usize,
    pub approved: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_students: usize,
    pub milestones: BTreeMap<MilestoneId, MilestoneTally>,
    pub statuses: BTreeMap<TimelineStatus, usize>,
    pub completed: usize,
    pub percent_complete: u8,
    pub average_progress: u8,
    pub failures: Vec<RowFailure>,
}

fn rounded_percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    ((part * 200 + whole) / (whole * 2)).min(100) as u8
}

pub fn summarize(views: &[StudentView], failures: Vec<RowFailure>) -> DashboardSummary {
    let mut milestones: BTreeMap<MilestoneId, MilestoneTally> = MilestoneId::ALL
        .iter()
        .map(|id| (*id, MilestoneTally::default()))
        .collect();
    let mut statuses: BTreeMap<TimelineStatus, usize> = [
        TimelineStatus::OnTrack,
        TimelineStatus::Warning,
        TimelineStatus::Overduration,
        TimelineStatus::Completed,
    ]
    .into_iter()
    .map(|status| (status, 0))
    .collect();

    let mut progress_total = 0usize;
    for view in views {
        for milestone in &view.timeline.milestones {
            let tally = milestones.entry(milestone.id).or_default();
            if milestone.submitted {
                tally.submitted += 1;
            }
            if milestone.approved {
                tally.approved += 1;
            }
        }
        *statuses.entry(view.timeline.status).or_default() += 1;
        progress_total += view.progress.percentage as usize;
    }

    let total_students = views.len();
    let completed = statuses[&TimelineStatus::Completed];

    DashboardSummary {
        total_students,
        milestones,
        statuses,
        completed,
        percent_complete: rounded_percent(completed, total_students),
        average_progress: rounded_percent(progress_total, total_students * 100),
        failures,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueMilestone {
    pub matric: String,
    pub name: String,
    pub milestone: MilestoneId,
    pub expected_date: NaiveDate,
}

/// Milestones due (first of the month `offset` months after the start month)
/// before `today` that carry neither a submission nor an approval.
/// Students without a readable start date are skipped.
pub fn overdue_milestones(
    records: &[StudentRecord],
    config: &TrackerConfig,
    today: NaiveDate,
) -> Vec<OverdueMilestone> {
    let mut overdue = Vec::new();

    for record in records {
        let start = resolve_start_date(&record.start_date, today);
        if start.is_fallback() {
            debug!(matric = %record.matric, "no start date, overdue check skipped");
            continue;
        }
        let months = config.expected_months(ProgrammeClass::classify(&record.programme));

        for id in MilestoneId::ALL {
            if record.slot(id).is_touched() {
                continue;
            }
            let Some(expected_date) = month_start_after(start.date, months.offset(id)) else {
                continue;
            };
            if expected_date < today {
                overdue.push(OverdueMilestone {
                    matric: record.matric.clone(),
                    name: record.name.clone(),
                    milestone: id,
                    expected_date,
                });
            }
        }
    }

    overdue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, Level};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(matric: &str, programme: &str, start: &str, marks: &[(MilestoneId, bool)]) -> StudentRecord {
        let mut record = StudentRecord {
            matric: matric.to_string(),
            name: format!("Student {matric}"),
            programme: programme.to_string(),
            start_date: start.to_string(),
            ..StudentRecord::default()
        };
        for (id, approved) in marks {
            let slot = record.slot_mut(*id);
            slot.submitted = CellValue::from("2023-01-01");
            if *approved {
                slot.approved = CellValue::from("2023-02-01");
            }
        }
        record
    }

    #[test]
    fn student_view_carries_every_derived_value() {
        let student = record("M1", "Master of Science", "01/01/2024", &[(MilestoneId::P1, false)]);
        let view = evaluate_student(&student, &TrackerConfig::default(), date(2024, 7, 1));

        assert_eq!(view.programme_class, ProgrammeClass::Standard);
        assert_eq!(view.start_date, date(2024, 1, 1));
        assert!(!view.start_date_fallback);
        assert_eq!(view.timeline.status, TimelineStatus::OnTrack);
        assert_eq!(view.progress.percentage, 5);
        assert_eq!(view.progress.level, Level::P1);
        assert_eq!(view.quarter_ranges.len(), view.timeline.quarters.len());
        assert_eq!(view.quarter_ranges[1].start, date(2024, 4, 1));

        let json = serde_json::to_value(&view).expect("json");
        assert_eq!(json["programmeClass"], "Standard");
        assert_eq!(json["startDate"], "2024-01-01");
        assert_eq!(json["startDateFallback"], false);
        assert_eq!(json["timeline"]["status"], "On Track");
        assert_eq!(json["quarterRanges"][0]["label"], "Y1Q1");
    }

    #[test]
    fn unreadable_start_date_falls_back_to_today() {
        let student = record("M2", "PhD Engineering", "someday", &[]);
        let today = date(2025, 3, 10);
        let view = evaluate_student(&student, &TrackerConfig::default(), today);
        assert!(view.start_date_fallback);
        assert_eq!(view.start_date, today);
        assert_eq!(view.programme_class, ProgrammeClass::Extended);
        assert_eq!(view.timeline.status, TimelineStatus::OnTrack);
    }

    #[test]
    fn summary_counts_milestones_and_statuses() {
        let config = TrackerConfig::default();
        let today = date(2024, 7, 1);
        let students = [
            record("A", "Master of Science", "01/01/2024", &[(MilestoneId::P1, true)]),
            record(
                "B",
                "Master of Science",
                "01/01/2022",
                &[
                    (MilestoneId::P1, true),
                    (MilestoneId::P3, true),
                    (MilestoneId::P4, true),
                    (MilestoneId::P5, true),
                ],
            ),
            record("C", "Master of Science", "01/01/2022", &[(MilestoneId::P3, false)]),
        ];
        let views: Vec<StudentView> = students
            .iter()
            .map(|student| evaluate_student(student, &config, today))
            .collect();
        let failures = vec![RowFailure {
            row: 9,
            matric: None,
            reason: "row 9 has a blank matric cell".to_string(),
        }];

        let summary = summarize(&views, failures);
        assert_eq!(summary.total_students, 3);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.percent_complete, 33);
        assert_eq!(summary.statuses[&TimelineStatus::OnTrack], 1);
        assert_eq!(summary.statuses[&TimelineStatus::Overduration], 1);
        assert_eq!(summary.statuses[&TimelineStatus::Warning], 0);
        assert_eq!(
            summary.milestones[&MilestoneId::P1],
            MilestoneTally { submitted: 2, approved: 2 }
        );
        assert_eq!(
            summary.milestones[&MilestoneId::P3],
            MilestoneTally { submitted: 2, approved: 1 }
        );
        // 10 + 100 + 13 over three students.
        assert_eq!(summary.average_progress, 41);
        assert_eq!(summary.failures.len(), 1);

        let json = serde_json::to_value(&summary).expect("json");
        assert_eq!(json["statuses"]["On Track"], 1);
        assert_eq!(json["milestones"]["P5"]["approved"], 1);
        assert_eq!(json["percentComplete"], 33);
    }

    #[test]
    fn empty_roster_summarizes_to_zero() {
        let summary = summarize(&[], Vec::new());
        assert_eq!(summary.total_students, 0);
        assert_eq!(summary.percent_complete, 0);
        assert_eq!(summary.average_progress, 0);
        assert_eq!(summary.statuses.len(), 4);
    }

    #[test]
    fn overdue_lists_untouched_milestones_past_their_month() {
        let students = [
            record("A", "Master of Science", "15/01/2024", &[(MilestoneId::P1, false)]),
            record("B", "Master of Science", "not a date", &[]),
        ];
        let overdue = overdue_milestones(&students, &TrackerConfig::default(), date(2024, 7, 2));

        let found: Vec<(MilestoneId, NaiveDate)> =
            overdue.iter().map(|o| (o.milestone, o.expected_date)).collect();
        assert_eq!(
            found,
            vec![
                (MilestoneId::P3, date(2024, 4, 1)),
                (MilestoneId::P4, date(2024, 7, 1)),
            ]
        );
        assert!(overdue.iter().all(|o| o.matric == "A"));
    }

    #[test]
    fn milestone_due_today_is_not_yet_overdue() {
        let students = [record("A", "Master of Science", "2024-01-20", &[(MilestoneId::P1, false)])];
        let overdue = overdue_milestones(&students, &TrackerConfig::default(), date(2024, 7, 1));
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].milestone, MilestoneId::P3);
    }
}
