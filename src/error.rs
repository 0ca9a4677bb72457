use crate::excel::coordinates::AddressParseError;
use thiserror::Error;

pub type MicroDbResult<T> = Result<T, MicroDbError>;

#[derive(Error, Debug)]
pub enum MicroDbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The source workbook cannot be opened or parsed. Aborts extraction.
    #[error("Source workbook error: {0}")]
    Source(String),

    #[error(transparent)]
    Address(#[from] AddressParseError),

    #[error("Style translation error: {0}")]
    StyleTranslation(String),

    #[error("Chart translation error: {0}")]
    ChartTranslation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Sheet already exists: {0}")]
    SheetExists(String),

    /// The destination workbook cannot be written. Aborts reconstruction.
    #[error("Reconstruction write error: {0}")]
    ReconstructionWrite(String),
}

impl MicroDbError {
    /// Whether this error is scoped to a single record (cell, style, chart)
    /// and can be skipped without aborting the surrounding operation.
    pub fn is_record_scoped(&self) -> bool {
        matches!(
            self,
            MicroDbError::Address(_)
                | MicroDbError::StyleTranslation(_)
                | MicroDbError::ChartTranslation(_)
        )
    }
}
