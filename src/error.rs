use thiserror::Error;

/// Transport-level failure while fetching a page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
}

/// The embedded data blob could not be located or decoded.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("data blob marker not found in page")]
    MarkerNotFound,
    #[error("data blob is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Why a single page attempt (or the whole page) failed.
#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("data blob decoded but held no review collections")]
    EmptyTree,
    #[error("giving up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<PageError>,
    },
}

/// A raw record lacked one of the fields a review cannot exist without.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record is missing required field `{field}` ({pointer})")]
    MissingRequired {
        field: &'static str,
        pointer: &'static str,
    },
    #[error("record is not a JSON object")]
    NotAnObject,
}

#[derive(Debug, Error)]
pub enum DetailError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("no attraction details found at {url}")]
    NotFound { url: String },
    #[error("malformed attraction details at {url}: {reason}")]
    Malformed { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
