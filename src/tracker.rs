use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::TrackerConfig;
use crate::error::{SchemaError, TrackerError};
use crate::models::{flagged, CellValue, MilestoneId, StudentRecord};
use crate::normalize::{ensure_fields, ColumnMap, Field};
use crate::store::{self, Sheet, TabularStore};

/// Spreadsheet row number of a data row (the header is row 1).
fn sheet_row_number(data_index: usize) -> usize {
    data_index + 2
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matric: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub records: Vec<StudentRecord>,
    pub failures: Vec<RowFailure>,
}

impl Roster {
    pub fn supervised_by(self, email: &str) -> Self {
        Self {
            records: self
                .records
                .into_iter()
                .filter(|record| record.is_supervised_by(email))
                .collect(),
            failures: self.failures,
        }
    }
}

/// Normalizes every data row, isolating bad rows instead of failing the batch.
/// Only an unusable header is fatal.
pub fn build_roster(sheet: &Sheet) -> Result<Roster, SchemaError> {
    if sheet.header.is_empty() {
        return Err(SchemaError::EmptySheet {
            sheet: sheet.name.clone(),
        });
    }
    let columns = ColumnMap::resolve(&sheet.header)?;

    let mut roster = Roster::default();
    let mut seen = HashSet::new();

    for (index, row) in sheet.rows.iter().enumerate() {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let row_number = sheet_row_number(index);

        match columns.read_record(row, row_number) {
            Ok(record) if !seen.insert(record.matric.clone()) => {
                warn!(row = row_number, matric = %record.matric, "duplicate matric skipped");
                roster.failures.push(RowFailure {
                    row: row_number,
                    reason: format!("duplicate matric {}", record.matric),
                    matric: Some(record.matric),
                });
            }
            Ok(record) => roster.records.push(record),
            Err(err) => {
                warn!(row = row_number, error = %err, "row skipped");
                roster.failures.push(RowFailure {
                    row: row_number,
                    matric: None,
                    reason: err.to_string(),
                });
            }
        }
    }

    Ok(roster)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Submitted,
    Approved,
}

/// Details used only when a submission introduces a new student.
#[derive(Debug, Clone, Default)]
pub struct NewStudent {
    pub name: Option<String>,
    pub programme: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampOutcome {
    pub created: bool,
    pub row: usize,
}

pub struct Tracker<'a> {
    store: &'a TabularStore,
    sheet: String,
}

impl<'a> Tracker<'a> {
    /// Uses `sheet` when given, otherwise the first configured candidate the
    /// store holds, otherwise the first sheet it lists.
    pub async fn open(
        store: &'a TabularStore,
        config: &TrackerConfig,
        sheet: Option<&str>,
    ) -> Result<Tracker<'a>, TrackerError> {
        let sheet = match sheet {
            Some(name) => name.to_string(),
            None => {
                let available = store.list_sheets().await?;
                store::pick_sheet(&available, &config.sheet_candidates).ok_or(TrackerError::NoSheet)?
            }
        };
        info!(sheet = %sheet, backend = store.backend(), "using tracking sheet");
        Ok(Tracker { store, sheet })
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet
    }

    pub async fn roster(&self) -> Result<Roster, TrackerError> {
        let sheet = self.store.read_sheet(&self.sheet).await?;
        Ok(build_roster(&sheet)?)
    }

    pub async fn find_student(&self, matric: &str) -> Result<StudentRecord, TrackerError> {
        let matric = matric.trim();
        self.roster()
            .await?
            .records
            .into_iter()
            .find(|record| record.matric == matric)
            .ok_or_else(|| TrackerError::StudentNotFound(matric.to_string()))
    }

    /// Writes `stamp` into the milestone's submitted or approved cell and the
    /// last-update cell. A submission for an unknown matric appends a row;
    /// an approval for one is an error. Missing columns are appended to the
    /// header. Derived values are never written.
    pub async fn stamp_milestone(
        &self,
        matric: &str,
        milestone: MilestoneId,
        mark: Mark,
        stamp: &str,
        new_student: &NewStudent,
    ) -> Result<StampOutcome, TrackerError> {
        let matric = matric.trim();
        let sheet = self.store.read_sheet(&self.sheet).await?;
        if sheet.header.is_empty() {
            return Err(SchemaError::EmptySheet {
                sheet: sheet.name.clone(),
            }
            .into());
        }

        let target = match mark {
            Mark::Submitted => Field::Submitted(milestone),
            Mark::Approved => Field::Approved(milestone),
        };
        let existing = ColumnMap::resolve(&sheet.header)?;
        let position = sheet
            .rows
            .iter()
            .position(|row| existing.matric_of(row) == matric);

        let mut fields = vec![target, Field::LastUpdate];
        if position.is_none() {
            if mark == Mark::Approved {
                return Err(TrackerError::StudentNotFound(matric.to_string()));
            }
            if new_student.name.is_some() {
                fields.push(Field::Name);
            }
            if new_student.programme.is_some() {
                fields.push(Field::Programme);
            }
        }

        let mut header = sheet.header.clone();
        let (columns, header_changed) = ensure_fields(&mut header, &fields)?;

        let cells = match position {
            // Existing rows keep every other cell byte for byte.
            Some(index) => {
                let mut cells = sheet.rows[index].clone();
                columns.write_cell(target, stamp, &mut cells);
                columns.write_cell(Field::LastUpdate, stamp, &mut cells);
                cells
            }
            None => {
                let mut record = StudentRecord {
                    matric: matric.to_string(),
                    name: new_student.name.clone().unwrap_or_default(),
                    programme: new_student.programme.clone().unwrap_or_default(),
                    last_update: stamp.to_string(),
                    ..StudentRecord::default()
                };
                record.slot_mut(milestone).submitted = CellValue::from_cell(stamp);
                let mut cells = vec![String::new(); header.len()];
                columns.write_record(&record, &mut cells);
                cells
            }
        };

        if header_changed {
            info!(sheet = %self.sheet, columns = header.len(), "extending sheet header");
            self.store.write_header(&self.sheet, &header).await?;
        }

        let outcome = match position {
            Some(index) => {
                self.store.update_row(&self.sheet, index, &cells).await?;
                StampOutcome {
                    created: false,
                    row: sheet_row_number(index),
                }
            }
            None => {
                let index = self.store.append_row(&self.sheet, &cells).await?;
                StampOutcome {
                    created: true,
                    row: sheet_row_number(index),
                }
            }
        };

        info!(
            matric,
            milestone = %milestone,
            mark = ?mark,
            row = outcome.row,
            created = outcome.created,
            "milestone stamped"
        );
        Ok(outcome)
    }
}

/// Replaces `sheet_name` with the rows of a CSV file, header first.
pub async fn import_csv(
    store: &TabularStore,
    sheet_name: &str,
    csv_path: &Path,
) -> anyhow::Result<usize> {
    let rows = store::read_csv_rows(csv_path)?;
    replace_with_rows(store, sheet_name, rows).await
}

/// Replaces `sheet_name` with a JSON export of sheet values: an array of
/// rows, header first, whose cells may be strings, numbers, booleans or null.
pub async fn import_json(
    store: &TabularStore,
    sheet_name: &str,
    json_path: &Path,
) -> anyhow::Result<usize> {
    let contents = std::fs::read_to_string(json_path)
        .with_context(|| format!("failed to read {}", json_path.display()))?;
    let rows = json_rows(&contents)
        .with_context(|| format!("{} is not a JSON array of rows", json_path.display()))?;
    replace_with_rows(store, sheet_name, rows).await
}

/// Typed values become text cells. Values that are not flagged (`null`,
/// `false`, `""`) become empty cells so they stay unflagged once stored.
pub fn json_rows(contents: &str) -> anyhow::Result<Vec<Vec<String>>> {
    let values: Vec<Vec<serde_json::Value>> = serde_json::from_str(contents)?;
    Ok(values
        .iter()
        .map(|row| {
            row.iter()
                .map(|value| {
                    let cell = CellValue::from_json(value);
                    if flagged(&cell) {
                        cell.to_cell()
                    } else {
                        String::new()
                    }
                })
                .collect()
        })
        .collect())
}

async fn replace_with_rows(
    store: &TabularStore,
    sheet_name: &str,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<usize> {
    let sheet = Sheet::from_rows(sheet_name, rows);
    ColumnMap::resolve(&sheet.header)?;
    store.replace_sheet(&sheet).await?;
    info!(sheet = sheet_name, rows = sheet.rows.len(), "sheet replaced");
    Ok(sheet.rows.len())
}

/// Writes a small tracking sheet whose headers use deployment-style spellings.
pub async fn seed(store: &TabularStore, sheet_name: &str) -> anyhow::Result<usize> {
    let sheet = sample_sheet(sheet_name);
    store.replace_sheet(&sheet).await?;
    Ok(sheet.rows.len())
}

pub fn sample_sheet(sheet_name: &str) -> Sheet {
    let header = [
        "Timestamp",
        "Matric No",
        "Student Name",
        "Programme",
        "Start Date",
        "Student Email",
        "Supervisor Email",
        "P1 Submitted",
        "P1 Approved",
        "P3 Submitted",
        "P3 Approved",
        "P4 Submitted",
        "P4 Approved",
        "P5 Submitted",
        "P5 Approved",
        "Last Update",
    ];
    let rows = [
        [
            "2024-01-08 09:12:44",
            "P-0102",
            "Nurul Aina binti Hassan",
            "Master of Science (Medical Research)",
            "08/01/2024",
            "nurul.aina@student.usm.my",
            "azlan.rahman@usm.my",
            "2024-01-20",
            "2024-02-02",
            "2024-04-15",
            "",
            "",
            "",
            "",
            "",
            "2024-04-15",
        ],
        [
            "2022-09-05 14:03:10",
            "P-0088",
            "Tan Wei Jie",
            "Doctor of Philosophy (Health Sciences)",
            "05/09/2022",
            "weijie.tan@student.usm.my",
            "azlan.rahman@usm.my",
            "2022-09-30",
            "2022-10-14",
            "2023-01-10",
            "2023-02-01",
            "2023-05-22",
            "2023-06-30",
            "",
            "",
            "2023-06-30",
        ],
        [
            "2021-02-01 08:00:00",
            "P-0051",
            "Priya Raman",
            "Master of Science (Biomedicine)",
            "01/02/2021",
            "priya.raman@student.usm.my",
            "siti.khadijah@usm.my",
            "2021-02-19",
            "2021-03-05",
            "2021-06-01",
            "2021-06-20",
            "2021-09-14",
            "2021-10-01",
            "2022-01-28",
            "2022-03-15",
            "2022-03-15",
        ],
        [
            "2023-03-13 11:45:00",
            "P-0093",
            "Muhammad Haziq Rosli",
            "Master of Science (Medical Research)",
            "13/03/2023",
            "haziq.rosli@student.usm.my",
            "siti.khadijah@usm.my",
            "2023-04-02",
            "",
            "",
            "",
            "",
            "",
            "",
            "",
            "2023-04-02",
        ],
    ];

    Sheet {
        name: sheet_name.to_string(),
        header: header.iter().map(|h| h.to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect(),
    }
}
