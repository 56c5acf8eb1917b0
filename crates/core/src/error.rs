use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("vector database error: {0}")]
    Search(#[from] SearchError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("collection not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum HintError {
    #[error("no hint endpoint configured")]
    Unavailable,

    #[error("hint request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("hint endpoint returned {0}")]
    Status(String),

    #[error("malformed hint output: {0}")]
    Malformed(String),

    #[error("hint literal is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}
