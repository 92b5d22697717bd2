use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChurnError {
    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Record skipped: batch cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ChurnError {
    /// True when the failure points at the deployed artifacts or settings rather
    /// than at the record being assessed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ChurnError::Registry(_) | ChurnError::SchemaMismatch(_) | ChurnError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ChurnError>;
