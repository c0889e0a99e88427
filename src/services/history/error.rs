//! History service error types

use std::time::Duration;

/// Errors produced while querying the part hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// The identity is not part of the hierarchy.
    #[error("unknown part '{item}'")]
    NotFound {
        /// Identity that was looked up.
        item: String,
    },

    /// The children fetch was rejected by the backend.
    #[error("failed to fetch children of '{item}': {reason}")]
    FetchFailed {
        /// Identity whose children were requested.
        item: String,
        /// Backend supplied description.
        reason: String,
    },

    /// The children fetch did not resolve in time.
    #[error("fetching children of '{item}' timed out after {after:?}")]
    Timeout {
        /// Identity whose children were requested.
        item: String,
        /// Configured timeout.
        after: Duration,
    },
}

impl HistoryError {
    pub fn not_found(item: impl Into<String>) -> Self {
        Self::NotFound { item: item.into() }
    }

    pub fn fetch_failed(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FetchFailed {
            item: item.into(),
            reason: reason.into(),
        }
    }

    /// True for failures of the asynchronous fetch itself.
    ///
    /// A timeout is handled the same way as a rejected fetch.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::FetchFailed { .. } | Self::Timeout { .. })
    }

    /// Identity the error refers to.
    pub fn item(&self) -> &str {
        match self {
            Self::NotFound { item } | Self::FetchFailed { item, .. } | Self::Timeout { item, .. } => {
                item
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, HistoryError>;
