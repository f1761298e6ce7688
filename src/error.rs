//! Error types for simver.
//!
//! Two layers:
//!
//! - [`VersionError`]: a string that passed the "valid version" filter could
//!   not be taken apart arithmetically. This is an invariant violation and is
//!   never retried.
//! - [`SimverError`]: everything the orchestration layer can hit (git,
//!   the hosting CLI, pull-request resolution, contention, timeouts).
//!
//! Absence of a tag is not an error anywhere in simver; it is an empty
//! scalar (`None` / `0`).

use std::time::Duration;

use simver_git::GitError;
use thiserror::Error;

// ---------------------------------------------------------------------------
// VersionError
// ---------------------------------------------------------------------------

/// A version string could not be decomposed into numeric components.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The string does not have the `v<major>[.<minor>[.<patch>]]` shape.
    #[error("`{version}` is not a version: {reason}")]
    Malformed {
        /// The offending version string.
        version: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A component that must be an integer is not.
    #[error("{component} component `{value}` of `{version}` is not a number")]
    NonNumeric {
        /// The offending version string.
        version: String,
        /// Which component (`major`, `minor`, `patch`).
        component: &'static str,
        /// The raw component text.
        value: String,
    },
}

// ---------------------------------------------------------------------------
// SimverError
// ---------------------------------------------------------------------------

/// Errors surfaced by snapshot loading, tag writing, and the CLI commands.
#[derive(Debug, Error)]
pub enum SimverError {
    /// Version arithmetic hit a malformed version (invariant violation).
    #[error(transparent)]
    Version(#[from] VersionError),

    /// A git operation failed.
    #[error("git: {0}")]
    Git(#[from] GitError),

    /// A tag could not be created because the name is already taken.
    /// Another run won the race for this version.
    #[error("tag `{name}` already exists")]
    TagExists {
        /// The tag name that collided.
        name: String,
    },

    /// An external command (`gh`) failed or produced unusable output.
    #[error("`{command}` failed: {message}")]
    Command {
        /// The command line that was run.
        command: String,
        /// Captured stderr or a parse failure description.
        message: String,
    },

    /// A step output cannot be written in the `key=value` line format.
    #[error("invalid step output `{key}`: {reason}")]
    InvalidOutput {
        /// The output name.
        key: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// The current pull request could not be determined.
    #[error("cannot resolve pull request: {0}")]
    PullRequest(String),

    /// Every reservation attempt lost the race.
    #[error("could not reserve a version after {attempts} attempts (last conflict on `{last_conflict}`)")]
    ReservationExhausted {
        /// How many load/calculate/write cycles ran.
        attempts: u32,
        /// The tag name of the final collision.
        last_conflict: String,
    },

    /// No version tag appeared on the commit before the deadline.
    #[error("timed out after {waited:?} waiting for a version tag on {commit}")]
    WaitTimeout {
        /// The commit being watched.
        commit: String,
        /// How long we waited.
        waited: Duration,
    },

    /// JSON (de)serialization failed.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// A local file operation failed.
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl SimverError {
    /// Whether this error is recoverable by reloading the snapshot and
    /// recomputing (another writer claimed the name first).
    #[must_use]
    pub const fn is_contention(&self) -> bool {
        match self {
            Self::TagExists { .. } => true,
            Self::Git(e) => e.is_conflict(),
            _ => false,
        }
    }
}
