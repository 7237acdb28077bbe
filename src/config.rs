use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Deserializer};

use crate::models::{ExpectedMonths, ProgrammeClass};
use crate::progress::ProgressWeights;
use crate::timeline::QuarterPolicy;

/// Tunables for the derivation engine, optionally read from a TOML file.
///
/// ```toml
/// quarter_policy = "observed"
/// sheet_candidates = ["MasterTracking", "Sheet1"]
///
/// [standard]
/// p5 = 24
///
/// [extended]
/// p5 = 36
///
/// [weights]
/// p1 = 10
/// p3 = 25
/// p4 = 25
/// p5 = 40
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    #[serde(deserialize_with = "standard_months")]
    pub standard: ExpectedMonths,
    #[serde(deserialize_with = "extended_months")]
    pub extended: ExpectedMonths,
    pub weights: ProgressWeights,
    pub quarter_policy: QuarterPolicy,
    /// Sheets tried in order when none is named explicitly.
    pub sheet_candidates: Vec<String>,
}

/// Longest programme duration accepted from a config file.
const MAX_PROGRAMME_MONTHS: i32 = 120;

/// A `[standard]` or `[extended]` section; absent keys keep that class's defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MonthsSection {
    p1: Option<i32>,
    p3: Option<i32>,
    p4: Option<i32>,
    p5: Option<i32>,
}

impl MonthsSection {
    fn over(self, base: ExpectedMonths) -> ExpectedMonths {
        ExpectedMonths {
            p1: self.p1.unwrap_or(base.p1),
            p3: self.p3.unwrap_or(base.p3),
            p4: self.p4.unwrap_or(base.p4),
            p5: self.p5.unwrap_or(base.p5),
        }
    }
}

fn standard_months<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ExpectedMonths, D::Error> {
    Ok(MonthsSection::deserialize(deserializer)?.over(ExpectedMonths::STANDARD))
}

fn extended_months<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ExpectedMonths, D::Error> {
    Ok(MonthsSection::deserialize(deserializer)?.over(ExpectedMonths::EXTENDED))
}

fn validate_months(section: &str, months: &ExpectedMonths) -> anyhow::Result<()> {
    if !(1..=MAX_PROGRAMME_MONTHS).contains(&months.p5) {
        bail!("[{section}] p5 must be between 1 and {MAX_PROGRAMME_MONTHS} months, got {}", months.p5);
    }
    for (key, offset) in [("p1", months.p1), ("p3", months.p3), ("p4", months.p4)] {
        if !(0..=months.p5).contains(&offset) {
            bail!("[{section}] {key} must be between 0 and p5 ({}), got {offset}", months.p5);
        }
    }
    Ok(())
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            standard: ExpectedMonths::STANDARD,
            extended: ExpectedMonths::EXTENDED,
            weights: ProgressWeights::default(),
            quarter_policy: QuarterPolicy::default(),
            sheet_candidates: vec![
                "MasterTracking".to_string(),
                "Form responses".to_string(),
                "Form responses 1".to_string(),
                "Sheet1".to_string(),
            ],
        }
    }
}

impl TrackerConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        validate_months("standard", &self.standard)?;
        validate_months("extended", &self.extended)?;

        let total = self.weights.total();
        if total != 100 {
            bail!("progress weights must sum to 100, got {total}");
        }
        Ok(())
    }

    pub fn expected_months(&self, class: ProgrammeClass) -> &ExpectedMonths {
        match class {
            ProgrammeClass::Standard => &self.standard,
            ProgrammeClass::Extended => &self.extended,
        }
    }
}
