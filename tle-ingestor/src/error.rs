use thiserror::Error;

/// Enumeration of errors when fetching the raw element set payload.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to element set source failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("element set source responded with status {0}")]
    Status(reqwest::StatusCode),
}

/// Enumeration of errors for operations against the element set store.
/// Errors can originate from sqlx and are wrapped by us to provide additional context.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{command} query failed with: {error}")]
    Query {
        command: &'static str,
        error: sqlx::Error,
    },
    #[error("{command} did not complete within the store timeout")]
    Timeout { command: &'static str },
}

/// The two independent reconcile-and-persist stages of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Satellites,
    Telemetry,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Satellites => "satellites",
            Stage::Telemetry => "telemetry",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enumeration of the failures an ingestion cycle reports to its caller.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("fetching element sets failed: {0}")]
    FetchFailed(#[from] FetchError),
    #[error("loading stored {stage} for reconciliation failed: {error}")]
    StoreQueryFailed { stage: Stage, error: StoreError },
    #[error("persisting new {stage} failed: {error}")]
    StorePersistFailed { stage: Stage, error: StoreError },
}

impl IngestError {
    /// A short, stable label for metrics and status output.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::FetchFailed(_) => "fetch_failed",
            IngestError::StoreQueryFailed { .. } => "store_query_failed",
            IngestError::StorePersistFailed { .. } => "store_persist_failed",
        }
    }
}
