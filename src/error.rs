use crate::validate::ValidationFailure;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("empty result: {0}")]
    EmptyResult(String),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    #[error("computation error: {0}")]
    Computation(String),

    #[error("join error: {0}")]
    Join(String),

    #[error("dataset not found: {0}")]
    NotFound(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DeckError>;
