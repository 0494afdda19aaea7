use crate::semantic::SearchEngineError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("document not found")]
    NotFound,

    #[error("{0}")]
    InvalidInput(String),

    #[error("search error: {0}")]
    Search(#[from] SearchEngineError),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("invalid base64 data: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}
