use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("no cached snapshot at {path} and no RAW_URL configured")]
    MissingSource { path: String },
    #[error("snapshot download failed: {0}")]
    Download(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no rows survived normalization (check the source headers)")]
    NoRows,
}
