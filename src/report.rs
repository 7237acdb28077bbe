use std::fmt::Write;

use chrono::NaiveDate;

use crate::dashboard::{DashboardSummary, OverdueMilestone, StudentView};
use crate::models::{MilestoneId, TimelineStatus};

const ATTENTION_LIMIT: usize = 10;

/// Students most in need of follow-up: not completed, lowest progress first.
pub fn needing_attention(views: &[StudentView]) -> Vec<&StudentView> {
    let mut pending: Vec<&StudentView> = views
        .iter()
        .filter(|view| view.timeline.status != TimelineStatus::Completed)
        .collect();
    pending.sort_by(|a, b| {
        a.progress
            .percentage
            .cmp(&b.progress.percentage)
            .then_with(|| b.timeline.status.cmp(&a.timeline.status))
            .then_with(|| a.matric.cmp(&b.matric))
    });
    pending
}

pub fn build_report(
    scope: Option<&str>,
    today: NaiveDate,
    summary: &DashboardSummary,
    views: &[StudentView],
    overdue: &[OverdueMilestone],
) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all students");

    let _ = writeln!(output, "# Milestone Progress Report");
    let _ = writeln!(output, "Generated for {} as of {}", scope_label, today);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} students, {} completed ({}%), average progress {}%",
        summary.total_students, summary.completed, summary.percent_complete, summary.average_progress
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Mix");

    if summary.total_students == 0 {
        let _ = writeln!(output, "No students on record.");
    } else {
        for (status, count) in summary.statuses.iter() {
            let _ = writeln!(output, "- {}: {}", status, count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Milestone Counts");
    for id in MilestoneId::ALL {
        let tally = summary.milestones.get(&id).copied().unwrap_or_default();
        let _ = writeln!(
            output,
            "- {}: {} submitted, {} approved",
            id, tally.submitted, tally.approved
        );
    }

    let attention = needing_attention(views);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Students Needing Attention");

    if attention.is_empty() {
        let _ = writeln!(output, "Every student has completed.");
    } else {
        for view in attention.iter().take(ATTENTION_LIMIT) {
            let fallback = if view.start_date_fallback {
                ", start date unknown"
            } else {
                ""
            };
            let _ = writeln!(
                output,
                "- {} ({}) {}% at {}, {}{}",
                view.name, view.matric, view.progress.percentage, view.progress.level, view.timeline.status, fallback
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Overdue Milestones");

    if overdue.is_empty() {
        let _ = writeln!(output, "No overdue milestones.");
    } else {
        for item in overdue {
            let _ = writeln!(
                output,
                "- {} ({}) {} expected by {}",
                item.name, item.matric, item.milestone, item.expected_date
            );
        }
    }

    if !summary.failures.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Rows Skipped");
        for failure in &summary.failures {
            let _ = writeln!(output, "- row {}: {}", failure.row, failure.reason);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::dashboard::{evaluate_student, overdue_milestones, summarize};
    use crate::models::{CellValue, StudentRecord};
    use crate::tracker::RowFailure;

    fn student(matric: &str, name: &str, start: &str, approved: &[MilestoneId]) -> StudentRecord {
        let mut record = StudentRecord {
            matric: matric.to_string(),
            name: name.to_string(),
            programme: "Master of Science".to_string(),
            start_date: start.to_string(),
            ..StudentRecord::default()
        };
        for id in approved {
            let slot = record.slot_mut(*id);
            slot.submitted = CellValue::from("TRUE");
            slot.approved = CellValue::from("TRUE");
        }
        record
    }

    #[test]
    fn report_lists_sections_in_order() {
        let config = TrackerConfig::default();
        let today = chrono::NaiveDate::from_ymd_opt(2024, 7, 2).unwrap();
        let records = vec![
            student("S1", "Aina", "01/01/2024", &[MilestoneId::P1]),
            student("S2", "Badrul", "01/01/2024", &[]),
            student("S3", "Chen", "01/01/2023", &MilestoneId::ALL),
        ];
        let views: Vec<_> = records
            .iter()
            .map(|record| evaluate_student(record, &config, today))
            .collect();
        let overdue = overdue_milestones(&records, &config, today);
        let summary = summarize(
            &views,
            vec![RowFailure {
                row: 6,
                matric: None,
                reason: "row 6 has a blank matric cell".to_string(),
            }],
        );

        let report = build_report(Some("sv@usm.my"), today, &summary, &views, &overdue);

        assert!(report.starts_with("# Milestone Progress Report\nGenerated for sv@usm.my as of 2024-07-02\n"));
        assert!(report.contains("3 students, 1 completed (33%)"));
        assert!(report.contains("- Completed: 1"));
        assert!(report.contains("- P1: 2 submitted, 2 approved"));
        assert!(report.contains("- Aina (S1) 10% at P1, On Track"));
        assert!(report.contains("- Badrul (S2) P1 expected by 2024-01-01"));
        assert!(!report.contains("Chen (S3) 100%"));
        assert!(report.contains("## Rows Skipped\n- row 6: row 6 has a blank matric cell"));

        let badrul = report.find("Badrul (S2) 0%").expect("badrul listed");
        let aina = report.find("Aina (S1) 10%").expect("aina listed");
        assert!(badrul < aina);
    }

    #[test]
    fn completed_students_are_not_flagged_for_attention() {
        let config = TrackerConfig::default();
        let today = chrono::NaiveDate::from_ymd_opt(2024, 7, 2).unwrap();
        let records = vec![
            student("S4", "Dina", "01/01/2023", &[MilestoneId::P5]),
            student("S5", "Eka", "01/01/2024", &[]),
        ];
        let views: Vec<_> = records
            .iter()
            .map(|record| evaluate_student(record, &config, today))
            .collect();
        assert_eq!(views[0].timeline.status, TimelineStatus::Completed);
        assert_eq!(views[0].progress.percentage, 40);

        let matrics: Vec<&str> = needing_attention(&views)
            .into_iter()
            .map(|view| view.matric.as_str())
            .collect();
        assert_eq!(matrics, vec!["S5"]);
    }

    #[test]
    fn empty_report_says_so() {
        let today = chrono::NaiveDate::from_ymd_opt(2024, 7, 2).unwrap();
        let summary = summarize(&[], Vec::new());
        let report = build_report(None, today, &summary, &[], &[]);
        assert!(report.contains("Generated for all students"));
        assert!(report.contains("No students on record."));
        assert!(report.contains("No overdue milestones."));
        assert!(!report.contains("Rows Skipped"));
    }
}
