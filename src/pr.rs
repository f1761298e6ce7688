//! Pull-request metadata and resolvers.
//!
//! A direct push outside any PR is modeled as a synthetic PR with number 0
//! (see [`PrDetails::simulated_push`]).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimverError;

/// Everything simver needs to know about the current pull request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrDetails {
    /// PR number; 0 for a direct push.
    pub number: u64,
    /// The branch the PR comes from.
    pub head_branch: String,
    /// The branch the PR targets.
    pub base_branch: String,
    /// The trunk branch (e.g. `main`).
    pub root_branch: String,
    /// The PR has been merged.
    pub merged: bool,
    /// The merge commit once merged.
    pub merge_commit: String,
    /// The tip of the head branch.
    pub head_commit: String,
    /// The commit the PR is based on.
    pub base_commit: String,
    /// The tip of the root branch.
    pub root_commit: String,
    /// The hosting platform's trial merge commit for an open PR.
    pub potential_merge_commit: String,
}

impl PrDetails {
    /// A push straight to `branch`, treated as PR 0 whose base is the
    /// pushed commit's parent.
    pub fn simulated_push(
        branch: impl Into<String>,
        head_commit: impl Into<String>,
        parent_commit: impl Into<String>,
        root_branch: impl Into<String>,
        root_commit: impl Into<String>,
    ) -> Self {
        let branch = branch.into();
        let head_commit = head_commit.into();
        Self {
            number: 0,
            head_branch: branch.clone(),
            base_branch: branch,
            root_branch: root_branch.into(),
            merged: true,
            merge_commit: head_commit.clone(),
            head_commit,
            base_commit: parent_commit.into(),
            root_commit: root_commit.into(),
            potential_merge_commit: String::new(),
        }
    }

    /// Whether this is a synthetic PR standing in for a direct push.
    #[must_use]
    pub const fn is_simulated_push(&self) -> bool {
        self.number == 0
    }

    /// Whether this run tags a merge. A simulated push never does.
    #[must_use]
    pub const fn is_merge(&self) -> bool {
        !self.is_simulated_push() && self.merged
    }
}

/// Determines the PR the current run is for.
pub trait PullRequestResolver {
    /// The current PR, or a simulated push.
    ///
    /// # Errors
    /// Returns [`SimverError::PullRequest`] when the context is neither a PR
    /// nor a push, or a transport error from the hosting platform.
    fn current_pr(&self) -> Result<PrDetails, SimverError>;
}

/// Looks up PRs on the hosting platform.
pub trait PullRequestProvider {
    /// Details of PR `number`, or `None` if it does not exist.
    ///
    /// # Errors
    /// Transport or parse failures.
    fn by_number(&self, number: u64) -> Result<Option<PrDetails>, SimverError>;

    /// The PR (merged preferred, then open) that contains `commit`.
    ///
    /// # Errors
    /// Transport or parse failures.
    fn by_commit(&self, commit: &str) -> Result<Option<PrDetails>, SimverError>;
}

/// A resolver that always returns the same PR.
#[derive(Clone, Debug)]
pub struct StaticResolver {
    pr: PrDetails,
}

impl StaticResolver {
    /// Serve `pr` for every call.
    #[must_use]
    pub const fn new(pr: PrDetails) -> Self {
        Self { pr }
    }

    /// Read the PR from a JSON file (same field names as [`PrDetails`]).
    ///
    /// # Errors
    /// Returns an I/O or JSON error.
    pub fn from_file(path: &Path) -> Result<Self, SimverError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&contents)?))
    }
}

impl PullRequestResolver for StaticResolver {
    fn current_pr(&self) -> Result<PrDetails, SimverError> {
        Ok(self.pr.clone())
    }
}
