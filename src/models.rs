use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The four scored checkpoints, in programme order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MilestoneId {
    P1,
    P3,
    P4,
    P5,
}

impl MilestoneId {
    pub const ALL: [MilestoneId; 4] = [
        MilestoneId::P1,
        MilestoneId::P3,
        MilestoneId::P4,
        MilestoneId::P5,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MilestoneId::P1 => "P1",
            MilestoneId::P3 => "P3",
            MilestoneId::P4 => "P4",
            MilestoneId::P5 => "P5",
        }
    }

    fn index(self) -> usize {
        match self {
            MilestoneId::P1 => 0,
            MilestoneId::P3 => 1,
            MilestoneId::P4 => 2,
            MilestoneId::P5 => 3,
        }
    }
}

impl fmt::Display for MilestoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MilestoneId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "P1" => Ok(MilestoneId::P1),
            "P3" => Ok(MilestoneId::P3),
            "P4" => Ok(MilestoneId::P4),
            "P5" => Ok(MilestoneId::P5),
            other => Err(format!(
                "unknown milestone stage `{other}` (expected P1, P3, P4 or P5)"
            )),
        }
    }
}

/// A raw milestone marker as it arrived from the sheet or a JSON payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    pub fn from_cell(raw: &str) -> Self {
        if raw.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(raw.to_string())
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => CellValue::Empty,
            serde_json::Value::Bool(flag) => CellValue::Bool(*flag),
            serde_json::Value::Number(number) => {
                number.as_f64().map_or(CellValue::Empty, CellValue::Number)
            }
            serde_json::Value::String(text) => CellValue::from_cell(text),
            other => CellValue::Text(other.to_string()),
        }
    }

    /// Anything other than empty, null or `false` counts as flagged.
    pub fn is_flagged(&self) -> bool {
        !matches!(self, CellValue::Empty | CellValue::Bool(false))
    }

    pub fn to_cell(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(text) => text.clone(),
            CellValue::Number(number) => number.to_string(),
            CellValue::Bool(flag) => flag.to_string(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(raw: &str) -> Self {
        CellValue::from_cell(raw)
    }
}

pub fn flagged(value: &CellValue) -> bool {
    value.is_flagged()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MilestoneSlot {
    pub submitted: CellValue,
    pub approved: CellValue,
}

impl MilestoneSlot {
    pub fn is_submitted(&self) -> bool {
        self.submitted.is_flagged()
    }

    pub fn is_approved(&self) -> bool {
        self.approved.is_flagged()
    }

    pub fn is_touched(&self) -> bool {
        self.is_submitted() || self.is_approved()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StudentRecord {
    pub matric: String,
    pub name: String,
    pub programme: String,
    /// Raw start date cell; parsed on evaluation.
    pub start_date: String,
    pub student_email: String,
    pub supervisor_email: String,
    pub last_update: String,
    pub milestones: [MilestoneSlot; 4],
}

impl StudentRecord {
    pub fn slot(&self, id: MilestoneId) -> &MilestoneSlot {
        &self.milestones[id.index()]
    }

    pub fn slot_mut(&mut self, id: MilestoneId) -> &mut MilestoneSlot {
        &mut self.milestones[id.index()]
    }

    pub fn is_supervised_by(&self, email: &str) -> bool {
        let email = email.trim();
        !email.is_empty() && self.supervisor_email.trim().eq_ignore_ascii_case(email)
    }
}

const DOCTORAL_TOKENS: [&str; 3] = ["philosophy", "phd", "doctor"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgrammeClass {
    Standard,
    Extended,
}

impl ProgrammeClass {
    pub fn classify(programme: &str) -> Self {
        let programme = programme.to_lowercase();
        if DOCTORAL_TOKENS
            .iter()
            .any(|token| programme.contains(token))
        {
            ProgrammeClass::Extended
        } else {
            ProgrammeClass::Standard
        }
    }
}

impl fmt::Display for ProgrammeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgrammeClass::Standard => f.write_str("Standard"),
            ProgrammeClass::Extended => f.write_str("Extended"),
        }
    }
}

/// Month offsets from the start date at which each milestone falls due.
/// `p5` doubles as the total programme duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpectedMonths {
    pub p1: i32,
    pub p3: i32,
    pub p4: i32,
    pub p5: i32,
}

impl ExpectedMonths {
    pub const STANDARD: ExpectedMonths = ExpectedMonths {
        p1: 0,
        p3: 3,
        p4: 6,
        p5: 12,
    };

    pub const EXTENDED: ExpectedMonths = ExpectedMonths {
        p1: 0,
        p3: 3,
        p4: 6,
        p5: 24,
    };

    pub fn offset(&self, id: MilestoneId) -> i32 {
        match id {
            MilestoneId::P1 => self.p1,
            MilestoneId::P3 => self.p3,
            MilestoneId::P4 => self.p4,
            MilestoneId::P5 => self.p5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum TimelineStatus {
    #[serde(rename = "On Track")]
    OnTrack,
    Warning,
    Overduration,
    Completed,
}

impl fmt::Display for TimelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimelineStatus::OnTrack => "On Track",
            TimelineStatus::Warning => "Warning",
            TimelineStatus::Overduration => "Overduration",
            TimelineStatus::Completed => "Completed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineMilestone {
    pub id: MilestoneId,
    pub expected_quarter: String,
    pub submitted: bool,
    pub approved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timeline {
    pub quarters: Vec<String>,
    pub milestones: Vec<TimelineMilestone>,
    pub status: TimelineStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarterRange {
    pub label: String,
    pub start: NaiveDate,
    /// Exclusive; equals the next quarter's start.
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Level {
    #[serde(rename = "Not Started")]
    NotStarted,
    P1,
    P3,
    P4,
    P5,
}

impl From<MilestoneId> for Level {
    fn from(id: MilestoneId) -> Self {
        match id {
            MilestoneId::P1 => Level::P1,
            MilestoneId::P3 => Level::P3,
            MilestoneId::P4 => Level::P4,
            MilestoneId::P5 => Level::P5,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::NotStarted => f.write_str("Not Started"),
            Level::P1 => f.write_str("P1"),
            Level::P3 => f.write_str("P3"),
            Level::P4 => f.write_str("P4"),
            Level::P5 => f.write_str("P5"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub percentage: u8,
    pub level: Level,
}
