use thiserror::Error;

/// Core error kinds. Every failure the core surfaces maps onto exactly one
/// of these variants; the HTTP layer renders `machine_tag()` as the wire
/// error code.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Document is password protected")]
    Encrypted,
    #[error("Extraction produced no text")]
    EmptyContent,
    #[error("Store failure: {0}")]
    Store(#[from] surrealdb::Error),
    #[error("Embedding failure: {0}")]
    Embedding(String),
    #[error("LLM failure: {0}")]
    Llm(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    pub const fn machine_tag(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "InvalidInput",
            Self::UnsupportedFormat(_) => "UnsupportedFormat",
            Self::Encrypted => "Encrypted",
            Self::EmptyContent => "EmptyContent",
            Self::Store(_) => "StoreFailure",
            Self::Embedding(_) => "EmbeddingFailure",
            Self::Llm(_) => "LLMFailure",
            Self::Timeout(_) => "Timeout",
            Self::NotFound(_) => "NotFound",
        }
    }
}
