use thiserror::Error;

/// Problems with the shape of the tracking sheet itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("no column resolves to required field `{field}`")]
    MissingColumn { field: &'static str },

    #[error("sheet `{sheet}` has no header row")]
    EmptySheet { sheet: String },

    #[error("row {row} has a blank matric cell")]
    BlankMatric { row: usize },
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("student `{0}` not found")]
    StudentNotFound(String),

    #[error("no tracking sheet found in the store")]
    NoSheet,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
