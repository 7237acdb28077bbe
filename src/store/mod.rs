//! Spreadsheet-shaped storage: named sheets of string rows where the first
//! row is the header. Two backends share one interface; the handle is built
//! once in `main` and passed down by reference.

mod csv_file;
mod postgres;

use std::path::PathBuf;

use anyhow::{bail, Context};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

pub use csv_file::{read_csv_rows, CsvSheetDir};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub header: Vec<String>,
    /// Data rows, each padded to at least the header width.
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: &str, header: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            header,
            rows: Vec::new(),
        }
    }

    /// Splits raw rows into header and data, padding short rows with empty cells.
    pub fn from_rows(name: &str, rows: Vec<Vec<String>>) -> Self {
        let mut rows = rows.into_iter();
        let header = rows.next().unwrap_or_default();
        let width = header.len();
        let rows = rows
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();

        Self {
            name: name.to_string(),
            header,
            rows,
        }
    }

    pub fn all_rows(&self) -> impl Iterator<Item = &Vec<String>> {
        std::iter::once(&self.header).chain(self.rows.iter())
    }
}

pub fn validate_sheet_name(name: &str) -> anyhow::Result<()> {
    if name.trim().is_empty() || name.len() > 100 {
        bail!("sheet name must be 1 to 100 characters");
    }
    if name.contains(['/', '\\']) || name.contains("..") || name.chars().any(char::is_control) {
        bail!("sheet name `{name}` contains path or control characters");
    }
    Ok(())
}

/// First candidate present in `available`, else the first available sheet.
pub fn pick_sheet(available: &[String], candidates: &[String]) -> Option<String> {
    candidates
        .iter()
        .find(|candidate| available.contains(*candidate))
        .or_else(|| available.first())
        .cloned()
}

#[derive(Debug, Clone)]
pub enum TabularStore {
    Postgres(PgPool),
    CsvDir(CsvSheetDir),
}

impl TabularStore {
    pub async fn connect_postgres(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        Ok(TabularStore::Postgres(pool))
    }

    pub fn csv_dir(root: impl Into<PathBuf>) -> Self {
        TabularStore::CsvDir(CsvSheetDir::new(root))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            TabularStore::Postgres(_) => "postgres",
            TabularStore::CsvDir(_) => "csv",
        }
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        match self {
            TabularStore::Postgres(pool) => postgres::init_db(pool).await,
            TabularStore::CsvDir(dir) => dir.init(),
        }
    }

    pub async fn list_sheets(&self) -> anyhow::Result<Vec<String>> {
        match self {
            TabularStore::Postgres(pool) => postgres::list_sheets(pool).await,
            TabularStore::CsvDir(dir) => dir.list_sheets(),
        }
    }

    pub async fn read_sheet(&self, name: &str) -> anyhow::Result<Sheet> {
        validate_sheet_name(name)?;
        let sheet = match self {
            TabularStore::Postgres(pool) => postgres::read_sheet(pool, name).await?,
            TabularStore::CsvDir(dir) => dir.read_sheet(name)?,
        };
        debug!(sheet = name, rows = sheet.rows.len(), "read sheet");
        Ok(sheet)
    }

    pub async fn replace_sheet(&self, sheet: &Sheet) -> anyhow::Result<()> {
        validate_sheet_name(&sheet.name)?;
        match self {
            TabularStore::Postgres(pool) => postgres::replace_sheet(pool, sheet).await,
            TabularStore::CsvDir(dir) => dir.write_sheet(sheet),
        }
    }

    pub async fn write_header(&self, name: &str, header: &[String]) -> anyhow::Result<()> {
        validate_sheet_name(name)?;
        match self {
            TabularStore::Postgres(pool) => postgres::write_header(pool, name, header).await,
            TabularStore::CsvDir(dir) => dir.write_header(name, header),
        }
    }

    pub async fn update_row(
        &self,
        name: &str,
        data_index: usize,
        cells: &[String],
    ) -> anyhow::Result<()> {
        validate_sheet_name(name)?;
        match self {
            TabularStore::Postgres(pool) => postgres::update_row(pool, name, data_index, cells).await,
            TabularStore::CsvDir(dir) => dir.update_row(name, data_index, cells),
        }
    }

    pub async fn append_row(&self, name: &str, cells: &[String]) -> anyhow::Result<usize> {
        validate_sheet_name(name)?;
        match self {
            TabularStore::Postgres(pool) => postgres::append_row(pool, name, cells).await,
            TabularStore::CsvDir(dir) => dir.append_row(name, cells),
        }
    }
}
