use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("required input not found: {}", path.display())]
    MissingInput { path: PathBuf },
    #[error("missing required credential: set {0}")]
    MissingCredential(&'static str),
    #[error("places api quota exhausted: {0}")]
    QuotaExceeded(String),
    #[error("request budget of {limit} calls exhausted")]
    BudgetExhausted { limit: u32 },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Config(String),
}

impl AppError {
    pub fn is_run_stop(&self) -> bool {
        matches!(
            self,
            AppError::QuotaExceeded(_) | AppError::BudgetExhausted { .. }
        )
    }
}
