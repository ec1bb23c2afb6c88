use thiserror::Error;

/// The portfolio spec could not be loaded or is unusable
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read portfolio config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse portfolio config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("portfolio config is missing `{0}`")]
    MissingField(&'static str),
    #[error("invalid amount for {symbol}: {reason}")]
    InvalidAmount { symbol: String, reason: String },
    #[error("portfolio config has no holdings")]
    EmptyPortfolio,
}

/// The price feed returned nothing usable
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("non-success status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("response contained no quotes")]
    NoData,
}

/// Why a cycle did not complete
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("config unavailable: {0}")]
    ConfigUnavailable(#[from] ConfigError),
    #[error("feed unavailable: {0}")]
    FeedUnavailable(#[from] FeedError),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl CycleError {
    /// Config and feed problems defer the cycle, the rest fail it
    pub fn is_deferral(&self) -> bool {
        matches!(self, CycleError::ConfigUnavailable(_) | CycleError::FeedUnavailable(_))
    }
}
