use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use super::Sheet;

/// Reads every record of a CSV file, header included, as plain strings.
pub fn read_csv_rows(path: &Path) -> anyhow::Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("malformed CSV in {}", path.display()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// A directory holding one `<sheet>.csv` file per sheet.
#[derive(Debug, Clone)]
pub struct CsvSheetDir {
    root: PathBuf,
}

impl CsvSheetDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn init(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.csv"))
    }

    pub fn list_sheets(&self) -> anyhow::Result<Vec<String>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("failed to list {}", self.root.display()))?;

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn read_sheet(&self, name: &str) -> anyhow::Result<Sheet> {
        let rows = read_csv_rows(&self.path_for(name))?;
        Ok(Sheet::from_rows(name, rows))
    }

    pub fn write_sheet(&self, sheet: &Sheet) -> anyhow::Result<()> {
        let path = self.path_for(&sheet.name);
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;

        for row in sheet.all_rows() {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_header(&self, name: &str, header: &[String]) -> anyhow::Result<()> {
        let mut sheet = if self.path_for(name).exists() {
            self.read_sheet(name)?
        } else {
            Sheet::new(name, Vec::new())
        };
        sheet.header = header.to_vec();
        self.write_sheet(&sheet)
    }

    pub fn update_row(&self, name: &str, data_index: usize, cells: &[String]) -> anyhow::Result<()> {
        let mut sheet = self.read_sheet(name)?;
        let Some(row) = sheet.rows.get_mut(data_index) else {
            bail!("sheet `{name}` has no data row {data_index}");
        };
        *row = cells.to_vec();
        self.write_sheet(&sheet)
    }

    pub fn append_row(&self, name: &str, cells: &[String]) -> anyhow::Result<usize> {
        let mut sheet = self.read_sheet(name)?;
        sheet.rows.push(cells.to_vec());
        self.write_sheet(&sheet)?;
        Ok(sheet.rows.len() - 1)
    }
}
