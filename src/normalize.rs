//! Maps an uncontrolled spreadsheet header onto canonical student fields.
//!
//! Each field tries an ordered list of exact names first (compared after
//! trimming, lower-casing and collapsing whitespace), then an optional fuzzy
//! rule where every token must appear in the header. Only the matric column
//! is required.

use std::collections::HashMap;

use crate::error::SchemaError;
use crate::models::{CellValue, MilestoneId, StudentRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Matric,
    Name,
    Programme,
    StartDate,
    StudentEmail,
    SupervisorEmail,
    LastUpdate,
    Submitted(MilestoneId),
    Approved(MilestoneId),
}

impl Field {
    pub const ALL: [Field; 15] = [
        Field::Matric,
        Field::Name,
        Field::Programme,
        Field::StartDate,
        Field::StudentEmail,
        Field::SupervisorEmail,
        Field::LastUpdate,
        Field::Submitted(MilestoneId::P1),
        Field::Approved(MilestoneId::P1),
        Field::Submitted(MilestoneId::P3),
        Field::Approved(MilestoneId::P3),
        Field::Submitted(MilestoneId::P4),
        Field::Approved(MilestoneId::P4),
        Field::Submitted(MilestoneId::P5),
        Field::Approved(MilestoneId::P5),
    ];

    /// Header written when the column has to be created.
    pub fn canonical_label(self) -> String {
        match self {
            Field::Matric => "Matric".to_string(),
            Field::Name => "Student Name".to_string(),
            Field::Programme => "Programme".to_string(),
            Field::StartDate => "Start Date".to_string(),
            Field::StudentEmail => "Student Email".to_string(),
            Field::SupervisorEmail => "Supervisor Email".to_string(),
            Field::LastUpdate => "Last Update".to_string(),
            Field::Submitted(id) => format!("{id} Submitted"),
            Field::Approved(id) => format!("{id} Approved"),
        }
    }

    fn candidates(self) -> Vec<String> {
        let fixed: &[&str] = match self {
            Field::Matric => &["Matric", "Matric No", "MatricNo", "StudentID", "ID"],
            Field::Name => &["Student Name", "StudentName", "Name"],
            Field::Programme => &["Programme", "Program", "Programme Name"],
            Field::StartDate => &[
                "Start Date",
                "StartDate",
                "Start",
                "Registration Date",
                "Timestamp",
            ],
            Field::StudentEmail => &["Student Email", "StudentEmail", "Email"],
            Field::SupervisorEmail => &[
                "Supervisor Email",
                "SupervisorEmail",
                "SupervisorEmailAddress",
                "SupervisorEmail1",
            ],
            Field::LastUpdate => &["Last Update", "LastUpdate", "Last Updated"],
            Field::Submitted(id) => {
                return vec![
                    format!("{id} Submitted"),
                    format!("{id}Submitted"),
                    format!("{id}_Submitted"),
                ]
            }
            Field::Approved(id) => {
                return vec![
                    format!("{id} Approved"),
                    format!("{id}Approved"),
                    format!("{id}_Approved"),
                ]
            }
        };
        fixed.iter().map(|name| name.to_string()).collect()
    }

    fn fuzzy_tokens(self) -> Vec<String> {
        match self {
            Field::Matric => vec!["matric".to_string()],
            Field::Programme => vec!["program".to_string()],
            Field::StartDate => vec!["start".to_string()],
            Field::SupervisorEmail => vec!["supervisor".to_string(), "email".to_string()],
            Field::Submitted(id) => vec![id.as_str().to_lowercase(), "submit".to_string()],
            Field::Approved(id) => vec![id.as_str().to_lowercase(), "approv".to_string()],
            Field::Name | Field::StudentEmail | Field::LastUpdate => Vec::new(),
        }
    }
}

fn normalize_header(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn find_column(normalized: &[String], field: Field) -> Option<usize> {
    for candidate in field.candidates() {
        let candidate = normalize_header(&candidate);
        if let Some(index) = normalized.iter().position(|header| *header == candidate) {
            return Some(index);
        }
    }

    let tokens = field.fuzzy_tokens();
    if tokens.is_empty() {
        return None;
    }
    normalized
        .iter()
        .position(|header| tokens.iter().all(|token| header.contains(token.as_str())))
}

/// Resolved positions of canonical fields within one header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<Field, usize>,
}

impl ColumnMap {
    pub fn resolve(header: &[String]) -> Result<Self, SchemaError> {
        let normalized: Vec<String> = header.iter().map(|h| normalize_header(h)).collect();
        let columns: HashMap<Field, usize> = Field::ALL
            .iter()
            .filter_map(|field| find_column(&normalized, *field).map(|index| (*field, index)))
            .collect();

        if !columns.contains_key(&Field::Matric) {
            return Err(SchemaError::MissingColumn { field: "matric" });
        }

        Ok(Self { columns })
    }

    pub fn index(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn cell<'r>(&self, row: &'r [String], field: Field) -> &'r str {
        self.index(field)
            .and_then(|index| row.get(index))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn matric_of<'r>(&self, row: &'r [String]) -> &'r str {
        self.cell(row, Field::Matric).trim()
    }

    /// `row_number` is only used to label a rejected row.
    pub fn read_record(&self, row: &[String], row_number: usize) -> Result<StudentRecord, SchemaError> {
        let matric = self.matric_of(row);
        if matric.is_empty() {
            return Err(SchemaError::BlankMatric { row: row_number });
        }

        let mut record = StudentRecord {
            matric: matric.to_string(),
            name: self.cell(row, Field::Name).to_string(),
            programme: self.cell(row, Field::Programme).to_string(),
            start_date: self.cell(row, Field::StartDate).to_string(),
            student_email: self.cell(row, Field::StudentEmail).to_string(),
            supervisor_email: self.cell(row, Field::SupervisorEmail).to_string(),
            last_update: self.cell(row, Field::LastUpdate).to_string(),
            ..StudentRecord::default()
        };

        for id in MilestoneId::ALL {
            let slot = record.slot_mut(id);
            slot.submitted = CellValue::from_cell(self.cell(row, Field::Submitted(id)));
            slot.approved = CellValue::from_cell(self.cell(row, Field::Approved(id)));
        }

        Ok(record)
    }

    /// Writes every mapped field of `record` back into `row`, padding as needed.
    /// Cells in unmapped columns are left untouched.
    pub fn write_record(&self, record: &StudentRecord, row: &mut Vec<String>) {
        for (field, index) in &self.columns {
            let value = match field {
                Field::Matric => record.matric.clone(),
                Field::Name => record.name.clone(),
                Field::Programme => record.programme.clone(),
                Field::StartDate => record.start_date.clone(),
                Field::StudentEmail => record.student_email.clone(),
                Field::SupervisorEmail => record.supervisor_email.clone(),
                Field::LastUpdate => record.last_update.clone(),
                Field::Submitted(id) => record.slot(*id).submitted.to_cell(),
                Field::Approved(id) => record.slot(*id).approved.to_cell(),
            };
            set_cell(row, *index, value);
        }
    }

    /// Writes one mapped field, leaving the rest of `row` untouched.
    /// Unmapped fields are ignored.
    pub fn write_cell(&self, field: Field, value: &str, row: &mut Vec<String>) {
        if let Some(index) = self.index(field) {
            set_cell(row, index, value.to_string());
        }
    }
}

fn set_cell(row: &mut Vec<String>, index: usize, value: String) {
    if row.len() <= index {
        row.resize(index + 1, String::new());
    }
    row[index] = value;
}

/// Appends canonical columns for any of `fields` the header cannot resolve.
/// Returns the refreshed map and whether the header changed.
pub fn ensure_fields(
    header: &mut Vec<String>,
    fields: &[Field],
) -> Result<(ColumnMap, bool), SchemaError> {
    let columns = ColumnMap::resolve(header)?;
    let missing: Vec<Field> = fields
        .iter()
        .copied()
        .filter(|field| columns.index(*field).is_none())
        .collect();

    if missing.is_empty() {
        return Ok((columns, false));
    }

    header.extend(missing.iter().map(|field| field.canonical_label()));
    Ok((ColumnMap::resolve(header)?, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn normalize_row(header: &[String], row: &[String]) -> Result<StudentRecord, SchemaError> {
        ColumnMap::resolve(header)?.read_record(row, 2)
    }

    #[test]
    fn resolves_matric_and_name_synonyms() {
        let record = normalize_row(&strings(&["Matric No", "Name"]), &strings(&["A123", "Jane"]))
            .expect("record");
        assert_eq!(record.matric, "A123");
        assert_eq!(record.name, "Jane");
        assert!(MilestoneId::ALL
            .iter()
            .all(|id| !record.slot(*id).is_touched()));
        assert_eq!(record.start_date, "");
    }

    #[test]
    fn missing_matric_column_is_a_schema_error() {
        let err = normalize_row(&strings(&["Name"]), &strings(&["Jane"])).unwrap_err();
        assert_eq!(err, SchemaError::MissingColumn { field: "matric" });
    }

    #[test]
    fn header_matching_tolerates_case_and_spacing() {
        let header = strings(&["  MATRIC   no ", "student  name", "p1 submitted", "P1_Approved"]);
        let record = normalize_row(&header, &strings(&[" B77 ", "Ali", "2024-02-01", ""]))
            .expect("record");
        assert_eq!(record.matric, "B77");
        assert_eq!(record.name, "Ali");
        assert!(record.slot(MilestoneId::P1).is_submitted());
        assert!(!record.slot(MilestoneId::P1).is_approved());
    }

    #[test]
    fn falls_back_to_fuzzy_tokens() {
        let header = strings(&[
            "Student Matriculation Number",
            "Programme of Study",
            "Date of Start",
            "Main Supervisor Email",
            "P3 submission date",
            "P3 approval date",
        ]);
        let row = strings(&["C9", "Doctor of Philosophy", "01/03/2023", "sv@usm.my", "x", "y"]);
        let record = normalize_row(&header, &row).expect("record");
        assert_eq!(record.matric, "C9");
        assert_eq!(record.programme, "Doctor of Philosophy");
        assert_eq!(record.start_date, "01/03/2023");
        assert_eq!(record.supervisor_email, "sv@usm.my");
        assert!(record.slot(MilestoneId::P3).is_submitted());
        assert!(record.slot(MilestoneId::P3).is_approved());
    }

    #[test]
    fn exact_candidates_win_over_fuzzy_matches() {
        let header = strings(&["Matric Remarks", "Matric"]);
        let columns = ColumnMap::resolve(&header).expect("columns");
        assert_eq!(columns.index(Field::Matric), Some(1));
    }

    #[test]
    fn short_rows_read_as_empty_cells() {
        let header = strings(&["Matric", "Name", "P5 Approved"]);
        let record = normalize_row(&header, &strings(&["D1"])).expect("record");
        assert_eq!(record.name, "");
        assert!(!record.slot(MilestoneId::P5).is_approved());
    }

    #[test]
    fn blank_matric_cell_rejects_the_row() {
        let columns = ColumnMap::resolve(&strings(&["Matric", "Name"])).expect("columns");
        let err = columns.read_record(&strings(&["  ", "Nobody"]), 7).unwrap_err();
        assert_eq!(err, SchemaError::BlankMatric { row: 7 });
    }

    #[test]
    fn write_record_reproduces_the_source_row() {
        let header = strings(&[
            "Timestamp",
            "Matric No",
            "Student Name",
            "Programme",
            "Supervisor Email",
            "P1 Submitted",
            "P1 Approved",
            "P4 Submitted",
            "Notes",
        ]);
        let row = strings(&[
            "15/01/2024",
            "E42",
            "Siti",
            "Master of Science",
            "sv@usm.my",
            "2024-01-20",
            "TRUE",
            "",
            "keep me",
        ]);
        let columns = ColumnMap::resolve(&header).expect("columns");
        let record = columns.read_record(&row, 2).expect("record");

        let mut rebuilt = vec![String::new(); header.len()];
        rebuilt[8] = "keep me".to_string();
        columns.write_record(&record, &mut rebuilt);
        assert_eq!(rebuilt, row);
    }

    #[test]
    fn ensure_fields_appends_only_missing_columns() {
        let mut header = strings(&["Matric", "P1 Submitted"]);
        let (columns, changed) = ensure_fields(
            &mut header,
            &[Field::Submitted(MilestoneId::P1), Field::Approved(MilestoneId::P1), Field::LastUpdate],
        )
        .expect("columns");
        assert!(changed);
        assert_eq!(header, strings(&["Matric", "P1 Submitted", "P1 Approved", "Last Update"]));
        assert_eq!(columns.index(Field::Approved(MilestoneId::P1)), Some(2));
        assert_eq!(columns.index(Field::LastUpdate), Some(3));

        let (_, changed_again) =
            ensure_fields(&mut header, &[Field::Approved(MilestoneId::P1)]).expect("columns");
        assert!(!changed_again);
    }
}
