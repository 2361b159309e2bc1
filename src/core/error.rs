use thiserror::Error;

/// Everything that can go wrong while serving a session.
///
/// None of these are fatal: the session stays usable after any of them.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("File {name} exceeds {limit} byte limit ({size} bytes)")]
    SizeLimitExceeded { name: String, size: u64, limit: u64 },

    #[error("Error processing {name}: {message}")]
    Conversion { name: String, message: String },

    #[error("{0} was removed in this session and will not be re-added")]
    Tombstoned(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("No documents uploaded yet")]
    NoDocuments,

    #[error("Completion request failed: {0}")]
    Request(String),
}

impl AppError {
    pub(crate) fn conversion(name: &str, message: impl Into<String>) -> Self {
        Self::Conversion {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
