use crate::DocId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("document {0} not found")]
    NotFound(DocId),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("malformed query: {0}")]
    MalformedQuery(String),
    #[error("index format version {0} is not supported")]
    IncompatibleIndex(u32),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Encode(#[from] bincode::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
