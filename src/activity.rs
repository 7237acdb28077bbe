use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::models::MilestoneId;

pub struct ActivityRule {
    pub activity: &'static str,
    pub milestone: MilestoneId,
    pub keywords: &'static [&'static str],
}

/// Checked in order; the first rule with a matching keyword wins.
#[rustfmt::skip]
pub const ACTIVITY_RULES: &[ActivityRule] = &[
    ActivityRule { activity: "Registration", milestone: MilestoneId::P1, keywords: &["Registration"] },
    ActivityRule { activity: "Literature", milestone: MilestoneId::P3, keywords: &["Literature"] },
    ActivityRule { activity: "Proposal", milestone: MilestoneId::P3, keywords: &["Proposal"] },
    ActivityRule { activity: "Ethics", milestone: MilestoneId::P3, keywords: &["Ethics", "JEPeM"] },
    ActivityRule { activity: "Pilot", milestone: MilestoneId::P4, keywords: &["Pilot"] },
    ActivityRule { activity: "Implementation", milestone: MilestoneId::P4, keywords: &["Implementation"] },
    ActivityRule {
        activity: "Mid-Candidature",
        milestone: MilestoneId::P5,
        keywords: &["Mid-Candidature", "Mid Candidature"],
    },
    ActivityRule { activity: "Seminar", milestone: MilestoneId::P5, keywords: &["Seminar"] },
    ActivityRule { activity: "Publication", milestone: MilestoneId::P4, keywords: &["Publication"] },
    ActivityRule { activity: "Dissemination", milestone: MilestoneId::P4, keywords: &["Dissemination"] },
    ActivityRule { activity: "Thesis", milestone: MilestoneId::P5, keywords: &["Thesis"] },
    ActivityRule {
        activity: "Pre-Submission",
        milestone: MilestoneId::P5,
        keywords: &["Pre-Submission", "Pre Submission"],
    },
    ActivityRule {
        activity: "Examination",
        milestone: MilestoneId::P5,
        keywords: &["Examination", "Viva", "Viva Voce"],
    },
];

/// Where activities no rule recognises end up.
pub const DEFAULT_BUCKET: MilestoneId = MilestoneId::P4;

/// Activity plan used when a sheet carries no activity list of its own.
pub const STANDARD_ACTIVITIES: &[&str] = &[
    "Registration & Orientation",
    "Literature Review & Proposal Preparation",
    "Proposal Defence",
    "Research Ethics Approval (JEPeM)",
    "Research Implementation I",
    "Mid-Candidature Review",
    "Research Communication I",
    "Research Implementation II",
    "Publication I",
    "Research Dissemination",
    "Thesis Preparation",
    "Pre-Submission Review (JPMPMP)",
    "Thesis Examination & Completion",
];

pub fn match_rule(activity: &str) -> Option<&'static ActivityRule> {
    let activity = activity.to_lowercase();
    ACTIVITY_RULES.iter().find(|rule| {
        rule.keywords
            .iter()
            .any(|keyword| activity.contains(&keyword.to_lowercase()))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActivityBuckets(BTreeMap<MilestoneId, Vec<String>>);

impl Default for ActivityBuckets {
    fn default() -> Self {
        Self(MilestoneId::ALL.iter().map(|id| (*id, Vec::new())).collect())
    }
}

impl ActivityBuckets {
    #[cfg(test)]
    pub fn get(&self, id: MilestoneId) -> &[String] {
        self.0.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn push(&mut self, id: MilestoneId, activity: String) {
        self.0.entry(id).or_default().push(activity);
    }
}

pub fn group_activities<I, S>(activities: I) -> ActivityBuckets
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut buckets = ActivityBuckets::default();

    for activity in activities {
        let activity = activity.as_ref();
        let milestone = match match_rule(activity) {
            Some(rule) => {
                debug!(activity, rule = rule.activity, bucket = %rule.milestone, "activity rule matched");
                rule.milestone
            }
            None => {
                debug!(activity, bucket = %DEFAULT_BUCKET, "no activity rule matched");
                DEFAULT_BUCKET
            }
        };
        buckets.push(milestone, activity.to_string());
    }

    buckets
}
