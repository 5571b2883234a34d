//! Unified error taxonomy for the daemon core.
//!
//! Errors are classified per spec §7: `api`, `policy_reject`, `crypto`,
//! `storage`, `transport`. Concrete sentinel variants stay stable so the RPC
//! layer can map them to dense per-method error codes without guessing at
//! string contents.

use serde::{Deserialize, Serialize};

/// Stable error category used for dispatch-layer classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    Api,
    PolicyReject,
    Crypto,
    Storage,
    Transport,
}

/// Unified error type for all daemon-core operations.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AimError {
    #[error("invalid request: {message}")]
    Invalid { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("policy rejected: {message}")]
    PolicyReject { message: String },

    #[error("crypto error: {message}")]
    Crypto { message: String },

    #[error("storage error: {message}")]
    Storage { message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("out of order: {message}")]
    OutOfOrder { message: String },

    #[error("unsupported: {message}")]
    Unsupported { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AimError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied { message: message.into() }
    }

    pub fn policy_reject(message: impl Into<String>) -> Self {
        Self::PolicyReject { message: message.into() }
    }

    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto { message: message.into() }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    pub fn out_of_order(message: impl Into<String>) -> Self {
        Self::OutOfOrder { message: message.into() }
    }

    /// An optional capability the running service does not implement
    /// (spec §4.10: data wipe, diagnostics export, blob pin/replication/ACL
    /// preset, node binding lifecycle).
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Category used by the RPC layer to pick an error-code range.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Invalid { .. } | Self::NotFound { .. } => ErrorCategory::Api,
            Self::PermissionDenied { .. } | Self::PolicyReject { .. } | Self::OutOfOrder { .. } => {
                ErrorCategory::PolicyReject
            }
            Self::Crypto { .. } => ErrorCategory::Crypto,
            Self::Storage { .. } => ErrorCategory::Storage,
            Self::Network { .. } => ErrorCategory::Transport,
            Self::Unsupported { .. } | Self::Internal { .. } => ErrorCategory::Api,
        }
    }
}

/// Standard result alias for daemon-core operations.
pub type Result<T> = std::result::Result<T, AimError>;

impl From<serde_json::Error> for AimError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid(err.to_string())
    }
}

impl From<toml::de::Error> for AimError {
    fn from(err: toml::de::Error) -> Self {
        Self::invalid(err.to_string())
    }
}

impl From<std::io::Error> for AimError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(err.to_string()),
            _ => Self::storage(err.to_string()),
        }
    }
}
