use thiserror::Error;

pub type DashboardResult<T> = Result<T, DashboardError>;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source table unreachable or not tabular. Fatal to the refresh cycle.
    #[error("Fetch error for source '{source_name}': {message}")]
    Fetch {
        source_name: String,
        message: String,
    },

    /// A cell value that cannot be normalized to a number.
    #[error("Format error in column '{column}': cannot parse {value:?}")]
    Format { column: String, value: String },

    #[error("Schema mismatch: column '{column}' not present")]
    SchemaMismatch { column: String },

    #[error("Filtered dataset is empty")]
    EmptyResult,

    #[error("Export error: {0}")]
    Export(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl DashboardError {
    pub fn fetch(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn format(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Format {
            column: column.into(),
            value: value.into(),
        }
    }
}
