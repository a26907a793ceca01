//! Unified error taxonomy for the host core.
//!
//! Every fault surfaces synchronously to the immediate caller; nothing is
//! swallowed or logged-and-forgotten inside the core. Recovery decisions
//! (retry a factory, fall back to a stale value, abort the request) belong
//! to the surrounding host.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Errors produced by the service container, the cache, and artifact
/// capture.
#[derive(Debug, Error)]
pub enum HostError {
    /// No registration for the requested contract anywhere in the
    /// container chain. `resolve` reports absence as `None`; this variant
    /// exists for call sites that treat absence as fatal.
    #[error("no service registered for `{type_name}`")]
    NotFound {
        /// Name of the contract type that could not be resolved.
        type_name: &'static str,
    },

    /// Operation structurally unsupported by the active load strategy.
    #[error("{operation} is not supported by the {context} load context")]
    Unsupported {
        /// The operation that was attempted.
        operation: &'static str,
        /// The load context that rejected it.
        context: &'static str,
    },

    /// A binary failed to bind into the execution context.
    #[error("failed to load `{identity}`: {reason}")]
    Load {
        /// Path or identity of the offending binary.
        identity: String,
        /// What went wrong, as reported by the loader.
        reason: String,
    },

    /// I/O failure reading a caller-supplied stream or file.
    #[error("I/O error while {0}: {1}")]
    Io(String, #[source] std::io::Error),

    /// A cached value exists under this key but with a different type.
    #[error("cached value for key {key} does not have the requested type `{requested}`")]
    TypeMismatch {
        /// Debug rendering of the offending cache key.
        key: String,
        /// The type the caller asked for.
        requested: &'static str,
    },

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure escaping a cache factory (compiler invocation, capture, ...).
    /// The cache guarantees no entry was created or updated for the key.
    #[error("cache factory failed: {0}")]
    Factory(#[source] anyhow::Error),
}

impl HostError {
    /// Wrap an I/O error with a description of the operation that failed.
    pub fn io(operation: impl Into<String>, err: std::io::Error) -> Self {
        HostError::Io(operation.into(), err)
    }

    /// Wrap an arbitrary collaborator failure crossing the cache boundary.
    pub fn factory(err: impl Into<anyhow::Error>) -> Self {
        HostError::Factory(err.into())
    }
}
