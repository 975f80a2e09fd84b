//! Error types for JIT access.
//!
//! All errors are strongly typed and propagated without panicking.
//! Configuration values are never echoed back in client-facing messages.

use std::time::Duration;

/// Errors raised by an allow-list store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Rule already exists: {0}")]
    Conflict(String),

    #[error("Rule not found: {0}")]
    NotFound(String),

    #[error("Invalid rule name: {0}")]
    InvalidName(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Access error types covering issuing and reclaiming grants.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// Client-caused; nothing was written.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Deployment-caused; raised before any store call.
    #[error("Service misconfigured: {0}")]
    MisconfiguredService(String),

    #[error("Backend failure while {context}: {source}")]
    BackendFailure {
        context: String,
        #[source]
        source: StoreError,
    },
}

impl AccessError {
    pub(crate) fn backend(context: impl Into<String>, source: StoreError) -> Self {
        Self::BackendFailure {
            context: context.into(),
            source,
        }
    }

    /// Stable status label used on the wire.
    pub fn status(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::MisconfiguredService(_) => "MisconfiguredService",
            Self::BackendFailure { .. } => "BackendFailure",
        }
    }

    /// True when the caller, not the deployment, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, AccessError>;
