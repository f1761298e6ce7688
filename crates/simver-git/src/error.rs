//! Error types for git operations.
//!
//! [`GitError`] is the single error type returned by all [`GitRepo`](crate::GitRepo) trait
//! methods. Callers match on the variant (missing ref, name already taken,
//! failed subprocess) instead of parsing messages.

use thiserror::Error;

/// Errors returned by [`GitRepo`](crate::GitRepo) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// A requested object, ref, or revision was not found.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description of what was missing.
        message: String,
    },

    /// A ref could not be created because a ref with that name already exists,
    /// locally or on the remote. This is the compare-and-swap failure that
    /// tag reservation relies on.
    #[error("ref conflict on `{ref_name}`: {message}")]
    RefConflict {
        /// The ref that could not be written.
        ref_name: String,
        /// Details from the backend.
        message: String,
    },

    /// An OID string could not be parsed or was otherwise invalid.
    #[error("invalid OID `{value}`: {reason}")]
    InvalidOid {
        /// The raw value that failed validation.
        value: String,
        /// Why validation failed.
        reason: String,
    },

    /// An I/O error occurred (process spawn, file system, etc.).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A git subprocess exited with a non-zero status.
    #[error("`git {command}` failed: {stderr}")]
    CommandFailed {
        /// The git arguments that were run (e.g. `"fetch --tags"`).
        command: String,
        /// Captured stderr, trimmed.
        stderr: String,
    },

    /// A push to a remote was rejected or failed for a reason other than a
    /// name conflict.
    #[error("push to `{remote}` failed: {message}")]
    PushFailed {
        /// The remote name (e.g., `"origin"`).
        remote: String,
        /// Details about the failure.
        message: String,
    },

    /// The gix backend returned an unclassified error.
    #[error("git backend error: {message}")]
    BackendError {
        /// Freeform error description from the backend.
        message: String,
    },
}

impl GitError {
    /// Whether this error means "that name is already taken".
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::RefConflict { .. })
    }
}
