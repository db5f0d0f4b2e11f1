use thiserror::Error;

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

/// Failures surfaced to callers of the core.
///
/// Recoverable conditions (clamped ledger fields, contradictory goals) are
/// reported as values on the returned data instead.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::StoreUnavailable(format!("corrupt stored record: {err}"))
    }
}
