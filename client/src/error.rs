//! Unified error handling for the sync client.

/// Errors from the local key-value storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage state error: {0}")]
    State(#[from] valsync_engine::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Errors from the remote valuation API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Version conflict: {0}")]
    PreconditionFailed(String),

    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Unreachable: {0}")]
    Unreachable(String),
}

impl ApiError {
    /// Create an error from a non-2xx status and the server's message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 412 {
            Self::PreconditionFailed(message)
        } else {
            Self::Status { status, message }
        }
    }

    /// HTTP status, if the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::PreconditionFailed(_) => Some(412),
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check for a failed `If-Match` precondition.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::PreconditionFailed(_))
    }
}

/// Errors from the spreadsheet host.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("Sheet layout error: {0}")]
    Layout(#[from] valsync_engine::Error),

    #[error("Sheet host error: {0}")]
    Host(String),
}

/// Errors surfaced by a sync action.
///
/// Every error is scoped to the single action that produced it.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("No cached data found for {0}")]
    NoCachedData(String),

    #[error("Network error: {0}")]
    Network(#[from] ApiError),

    #[error("Cannot sync while offline")]
    Offline,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),

    #[error("Invalid state: {0}")]
    State(#[from] valsync_engine::Error),
}

/// Result type alias for sync actions.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_412_is_conflict() {
        let err = ApiError::from_status(412, "Data has changed on server");
        assert!(err.is_conflict());
        assert_eq!(err.status_code(), Some(412));
    }

    #[test]
    fn other_status_is_not_conflict() {
        let err = ApiError::from_status(500, "boom");
        assert!(!err.is_conflict());
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.to_string(), "API error (500): boom");
    }

    #[test]
    fn no_cached_data_message() {
        let err = SyncError::NoCachedData("V1".into());
        assert_eq!(err.to_string(), "No cached data found for V1");
    }
}
