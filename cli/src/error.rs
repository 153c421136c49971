use thiserror::Error;

/// Errors raised while reading, cleaning or drawing a schedule.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid xlsx package: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("part {part} is larger than {limit} bytes when decompressed")]
    PartTooLarge { part: String, limit: u64 },

    #[error("malformed xml in {part}: {message}")]
    Xml { part: String, message: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unsupported file '{0}': expected .xlsx or .csv")]
    UnsupportedFormat(String),

    #[error("workbook has no sheets")]
    NoSheets,

    #[error("sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("sheet '{sheet}' is missing required column: {column}")]
    MissingColumn { sheet: String, column: String },

    #[error("chart rendering failed: {0}")]
    Chart(String),
}

impl ScheduleError {
    pub(crate) fn xml(part: &str, err: impl std::fmt::Display) -> Self {
        ScheduleError::Xml {
            part: part.to_string(),
            message: err.to_string(),
        }
    }
}

/// Outcomes of the in-browser editor that leave nothing to draw.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManualEntryError {
    #[error("No valid rows found. Fill at least one activity.")]
    NoValidRows,

    #[error("All dates were invalid. Check the format (DD-MM-YYYY).")]
    AllDatesInvalid,
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
