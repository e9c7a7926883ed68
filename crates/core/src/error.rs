use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TabulaError {
    /// Input failure: nothing to analyze.
    #[error("Dataset is empty: no rows or no columns to analyze")]
    EmptyDataset,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The run as a whole exceeded its deadline. Fatal.
    #[error(
        "Analysis timed out after {elapsed_ms}ms (limit {limit_ms}ms). \
         Raise TABULA_GLOBAL_TIMEOUT_MS, lower the sample size, or disable expensive analyses in the needs map"
    )]
    PipelineTimeout { elapsed_ms: u64, limit_ms: u64 },

    #[error("Calculation error: {0}")]
    Calculation(String),

    #[error("Matrix is singular or too ill-conditioned to solve")]
    SingularMatrix,

    #[error("Computation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TabulaError {
    /// Whether this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TabulaError::EmptyDataset | TabulaError::PipelineTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, TabulaError>;
