use serde::{Deserialize, Serialize};

use crate::models::{Level, MilestoneId, Progress, StudentRecord};

/// Share of 100% each milestone is worth. A submitted milestone earns half
/// its share, an approved one the whole share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProgressWeights {
    pub p1: u32,
    pub p3: u32,
    pub p4: u32,
    pub p5: u32,
}

impl Default for ProgressWeights {
    fn default() -> Self {
        Self {
            p1: 10,
            p3: 25,
            p4: 25,
            p5: 40,
        }
    }
}

impl ProgressWeights {
    pub fn weight(&self, id: MilestoneId) -> u32 {
        match id {
            MilestoneId::P1 => self.p1,
            MilestoneId::P3 => self.p3,
            MilestoneId::P4 => self.p4,
            MilestoneId::P5 => self.p5,
        }
    }

    pub fn total(&self) -> u32 {
        MilestoneId::ALL.iter().map(|id| self.weight(*id)).sum()
    }
}

pub fn score_progress(record: &StudentRecord, weights: &ProgressWeights) -> Progress {
    // Counted in half points so odd weights halve exactly.
    let half_points: u32 = MilestoneId::ALL
        .iter()
        .map(|id| {
            let slot = record.slot(*id);
            let weight = weights.weight(*id);
            if slot.is_approved() {
                weight * 2
            } else if slot.is_submitted() {
                weight
            } else {
                0
            }
        })
        .sum();
    let percentage = ((half_points + 1) / 2).min(100) as u8;

    let level = MilestoneId::ALL
        .iter()
        .rev()
        .find(|id| record.slot(**id).is_touched())
        .map(|id| Level::from(*id))
        .unwrap_or(Level::NotStarted);

    Progress { percentage, level }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    #[derive(Clone, Copy)]
    enum Mark {
        Nothing,
        Submitted,
        Approved,
    }

    fn record_with(marks: [Mark; 4]) -> StudentRecord {
        let mut record = StudentRecord {
            matric: "T1".to_string(),
            ..StudentRecord::default()
        };
        for (id, mark) in MilestoneId::ALL.iter().zip(marks) {
            let slot = record.slot_mut(*id);
            match mark {
                Mark::Nothing => {}
                Mark::Submitted => slot.submitted = CellValue::from("2024-03-01"),
                Mark::Approved => {
                    slot.submitted = CellValue::from("2024-03-01");
                    slot.approved = CellValue::from("2024-04-01");
                }
            }
        }
        record
    }

    #[test]
    fn nothing_flagged_is_not_started() {
        let progress = score_progress(&record_with([Mark::Nothing; 4]), &ProgressWeights::default());
        assert_eq!(progress.percentage, 0);
        assert_eq!(progress.level, Level::NotStarted);
    }

    #[test]
    fn submitted_earns_half_and_approved_the_full_share() {
        let weights = ProgressWeights::default();
        let progress = score_progress(
            &record_with([Mark::Approved, Mark::Submitted, Mark::Nothing, Mark::Nothing]),
            &weights,
        );
        // 10 + 12.5 rounds up to 23.
        assert_eq!(progress.percentage, 23);
        assert_eq!(progress.level, Level::P3);

        let all_approved = score_progress(&record_with([Mark::Approved; 4]), &weights);
        assert_eq!(all_approved.percentage, 100);
        assert_eq!(all_approved.level, Level::P5);
    }

    #[test]
    fn approval_without_submission_still_counts_once() {
        let mut record = record_with([Mark::Nothing; 4]);
        record.slot_mut(MilestoneId::P4).approved = CellValue::from("ok");
        let progress = score_progress(&record, &ProgressWeights::default());
        assert_eq!(progress.percentage, 25);
        assert_eq!(progress.level, Level::P4);
    }

    #[test]
    fn level_is_highest_touched_milestone() {
        let progress = score_progress(
            &record_with([Mark::Nothing, Mark::Nothing, Mark::Nothing, Mark::Submitted]),
            &ProgressWeights::default(),
        );
        assert_eq!(progress.level, Level::P5);
        assert_eq!(progress.percentage, 20);
    }

    #[test]
    fn percentage_and_level_never_drop_when_a_milestone_advances() {
        let weights = ProgressWeights::default();
        let marks = [Mark::Nothing, Mark::Submitted, Mark::Approved];

        for state in 0..81usize {
            let current: [Mark; 4] = std::array::from_fn(|i| marks[(state / 3usize.pow(i as u32)) % 3]);
            let before = score_progress(&record_with(current), &weights);

            for slot in 0..4 {
                let mut advanced = current;
                advanced[slot] = match current[slot] {
                    Mark::Nothing => Mark::Submitted,
                    Mark::Submitted | Mark::Approved => Mark::Approved,
                };
                let after = score_progress(&record_with(advanced), &weights);
                assert!(after.percentage >= before.percentage);
                assert!(after.level >= before.level);
            }
        }
    }

    #[test]
    fn default_weights_sum_to_one_hundred() {
        assert_eq!(ProgressWeights::default().total(), 100);
    }
}
