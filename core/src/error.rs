use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Stage index {index} out of range (stage count {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Run not started")]
    RunNotStarted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration { reason: reason.into() }
    }
}

pub type SimResult<T> = Result<T, SimError>;
