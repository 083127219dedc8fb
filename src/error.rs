use thiserror::Error;

/// Errors surfaced by the task store, time log store and focus timer
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Required input is missing or malformed (empty title, end before start)
    #[error("validation failed: {0}")]
    Validation(String),

    /// Operation referenced an id that does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Timer operation is not valid in the current state
    #[error("invalid timer state: {0}")]
    InvalidState(String),

    /// Underlying persistence failed
    #[error("storage error: {0}")]
    Storage(String),
}

impl TrackerError {
    pub fn task_not_found(id: i64) -> Self {
        Self::NotFound { entity: "task", id }
    }

    /// Wrap a file-layer failure, keeping the whole context chain in the message
    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", err))
    }
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;
