//! Error taxonomy for the protocol & mount registry core.
//!
//! Every variant here corresponds to one row of the error surface table:
//! handlers, the mount registry, the alias engine, and the storable cache
//! all resolve failures down to one of these kinds before they cross the
//! tool boundary.

use std::fmt;

/// Result alias used throughout the core.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unknown scheme '{scheme}'; known schemes: {}", known.join(", "))]
    UnknownScheme { scheme: String, known: Vec<String> },

    #[error(
        "navigation required: '{id}' is a deep id under root '{root}'; \
         start at the root and navigate to relative path '{suffix}'"
    )]
    NavigationRequired { id: String, root: String, suffix: String },

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("alias resolution exceeded max depth ({max_depth}) while resolving '{id}'")]
    AliasDepthExceeded { id: String, max_depth: u32 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        CoreError::InvalidArgument(msg.into())
    }

    pub fn not_found(id: impl fmt::Display) -> Self {
        CoreError::NotFound(id.to_string())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        CoreError::Unsupported(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        CoreError::Conflict(msg.into())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(source: std::io::Error) -> Self {
        CoreError::Io { source }
    }
}
