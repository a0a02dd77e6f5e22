use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("The CSV file is empty")]
    EmptyUpload,

    #[error("No data provided or invalid format")]
    EmptyBatch,

    #[error("Unknown chart: {0}")]
    UnknownChart(String),

    #[error("Chart {chart} does not support the {mode} mode")]
    UnsupportedMode { chart: String, mode: String },

    #[error("Spreadsheet export failed: {0}")]
    Xlsx(String),

    #[error("Rendering failed: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
