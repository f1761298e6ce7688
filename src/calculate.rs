//! The calculation engine.
//!
//! [`Calculation`] bundles the derived scalars and flags for one run.
//! [`Calculation::new_tags`] turns it into a [`CalculationOutput`]: four lists
//! of tag names, one per reference point. [`CalculationOutput::apply_refs`]
//! binds each list to its commit.
//!
//! The engine is pure. It reads no tags and writes none; the reservation loop
//! in [`crate::reserve`] owns all I/O.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::derive;
use crate::error::VersionError;
use crate::execution::Execution;
use crate::tags::{Tag, Tags};
use crate::version::{self, BASE_TAG};

// ---------------------------------------------------------------------------
// Refs
// ---------------------------------------------------------------------------

/// Maps the four logical reference points to concrete commit ids.
pub trait RefProvider {
    /// The PR head commit (or the pushed commit).
    fn head(&self) -> &str;
    /// The base commit the PR targets.
    fn base(&self) -> &str;
    /// The tip of the root branch.
    fn root(&self) -> &str;
    /// The merge commit, empty until the PR is merged.
    fn merge(&self) -> &str;
}

/// A plain [`RefProvider`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refs {
    /// Head commit.
    pub head: String,
    /// Base commit.
    pub base: String,
    /// Root-branch commit.
    pub root: String,
    /// Merge commit.
    pub merge: String,
}

impl Refs {
    /// All four points on the same commit (local mode).
    pub fn single(commit: impl Into<String>) -> Self {
        let commit = commit.into();
        Self {
            head: commit.clone(),
            base: commit.clone(),
            root: commit.clone(),
            merge: commit,
        }
    }
}

impl RefProvider for Refs {
    fn head(&self) -> &str {
        &self.head
    }

    fn base(&self) -> &str {
        &self.base
    }

    fn root(&self) -> &str {
        &self.root
    }

    fn merge(&self) -> &str {
        &self.merge
    }
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Derived scalars plus input flags for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Calculation {
    /// MMRT: the version this PR last claimed.
    pub my_most_recent_tag: Option<String>,
    /// MRLT: the highest release on the base branch.
    pub most_recent_live_tag: Option<String>,
    /// MMRBN: the highest build number tagged for this PR.
    pub my_most_recent_build: u64,
    /// Display-only decorated version.
    pub last_symbolic_tag: String,
    /// Pull request number; 0 for a direct push.
    pub pr: u64,
    /// NVT: one step past the highest live or reserved version.
    pub next_valid_tag: String,
    /// The PR has been merged; tag the merge commit.
    pub is_merge: bool,
    /// Abandon the claimed version for its next patch.
    pub force_patch: bool,
    /// The head commit is already versioned; emit nothing.
    pub skip: bool,
    /// The working tree has uncommitted changes.
    pub is_dirty: bool,
}

impl Calculation {
    /// Derive every scalar from a snapshot.
    ///
    /// # Errors
    /// Returns [`VersionError`] if the highest live or reserved version cannot
    /// be bumped (a malformed version passed the filter).
    #[instrument(skip_all, fields(pr = execution.pr))]
    pub fn from_execution(execution: &Execution) -> Result<Self, VersionError> {
        let mrlt = derive::most_recent_live_tag(&execution.base_branch_tags);
        let mrrt = derive::most_recent_reserved_tag(&execution.root_branch_tags);
        let mmrt = derive::my_most_recent_tag(&execution.head_branch_tags);
        let mmrbn =
            derive::my_most_recent_build_number(&execution.head_branch_tags, execution.pr);

        let max = version::max_live_or_reserved(mrlt.as_deref(), mrrt.as_deref());
        let nvt = version::next_valid_tag(execution.is_targeting_root, &max)?;

        let last_symbolic_tag = derive::last_symbolic_tag(
            mmrt.as_deref().unwrap_or(&nvt),
            execution.pr,
            mmrbn,
            execution.is_local,
            execution.is_dirty,
        );

        let calculation = Self {
            skip: derive::skip(&execution.head_commit_tags, mmrt.as_deref(), execution.pr),
            force_patch: derive::force_patch(&execution.head_branch_tags, mmrt.as_deref()),
            my_most_recent_tag: mmrt,
            most_recent_live_tag: mrlt,
            my_most_recent_build: mmrbn,
            last_symbolic_tag,
            pr: execution.pr,
            next_valid_tag: nvt,
            is_merge: execution.is_merge,
            is_dirty: execution.is_dirty,
        };
        debug!(
            mrlt = ?calculation.most_recent_live_tag,
            mrrt = ?mrrt,
            mmrt = ?calculation.my_most_recent_tag,
            mmrbn = calculation.my_most_recent_build,
            nvt = %calculation.next_valid_tag,
            skip = calculation.skip,
            force_patch = calculation.force_patch,
            "derived version facts"
        );
        Ok(calculation)
    }

    /// Decide which tags to create.
    ///
    /// # Errors
    /// Returns [`VersionError`] if the claimed version has to be patch-bumped
    /// and is malformed.
    pub fn new_tags(&self) -> Result<CalculationOutput, VersionError> {
        let mut out = CalculationOutput::default();

        if self.skip {
            debug!(calculation = ?self, "head commit already versioned, skipping");
            return Ok(out);
        }

        let mrlt = self.most_recent_live_tag.as_deref().unwrap_or(BASE_TAG);
        let mmrt = self.my_most_recent_tag.as_deref();
        let mut target = self.next_valid_tag.clone();

        // The claim stays usable only while it is ahead of every release.
        let mut valid = false;
        if let Some(claimed) = mmrt {
            match version::precedence(claimed, mrlt) {
                std::cmp::Ordering::Greater => valid = true,
                // Someone released our version already; move to its next patch.
                std::cmp::Ordering::Equal if self.my_most_recent_build != 0 => {
                    target = version::bump_patch(claimed)?;
                }
                _ => {}
            }
        }

        if !self.is_merge {
            if self.my_most_recent_build == 0 {
                // First build of a PR always reserves explicitly.
                valid = false;
            } else if self.force_patch {
                valid = false;
                if let Some(claimed) = mmrt {
                    target = version::bump_patch(claimed)?;
                }
            }
        }

        let version = match mmrt {
            Some(claimed) if valid => claimed.to_owned(),
            _ => {
                if self.pr != 0 && !self.is_merge {
                    out.root_tags.push(format!("{target}-reserved"));
                    out.base_tags.push(format!("{target}-pr{}+base", self.pr));
                }
                target
            }
        };

        if self.is_merge {
            out.merge_tags.push(version.clone());
        } else if self.pr == 0 {
            out.head_tags.push(version.clone());
        } else {
            let build = self.my_most_recent_build.checked_add(1).ok_or_else(|| {
                VersionError::Malformed {
                    version: format!("{version}-pr{}+{}", self.pr, self.my_most_recent_build),
                    reason: "build number overflows".to_owned(),
                }
            })?;
            out.head_tags.push(format!("{version}-pr{}+{build}", self.pr));
        }

        debug!(
            %version,
            mrlt,
            valid,
            pr = self.pr,
            is_merge = self.is_merge,
            force_patch = self.force_patch,
            output = ?out,
            "calculated new tags"
        );
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// CalculationOutput
// ---------------------------------------------------------------------------

/// Tag names to create, partitioned by the commit each list belongs on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationOutput {
    /// Bound to the base commit.
    pub base_tags: Vec<String>,
    /// Bound to the head commit.
    pub head_tags: Vec<String>,
    /// Bound to the root-branch commit.
    pub root_tags: Vec<String>,
    /// Bound to the merge commit.
    pub merge_tags: Vec<String>,
}

impl CalculationOutput {
    /// Whether no tags are to be created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.base_tags.is_empty()
            && self.head_tags.is_empty()
            && self.root_tags.is_empty()
            && self.merge_tags.is_empty()
    }

    /// The tag a downstream step should publish: the merge tag, else the
    /// head tag.
    #[must_use]
    pub fn published_tag(&self) -> Option<&str> {
        self.merge_tags
            .first()
            .or_else(|| self.head_tags.first())
            .map(String::as_str)
    }

    /// Flatten into `(name, commit)` pairs: base, head, root, then merge.
    pub fn apply_refs(&self, refs: &dyn RefProvider) -> Tags {
        let scoped = [
            (&self.base_tags, refs.base()),
            (&self.head_tags, refs.head()),
            (&self.root_tags, refs.root()),
            (&self.merge_tags, refs.merge()),
        ];
        scoped
            .into_iter()
            .flat_map(|(names, target)| names.iter().map(move |n| Tag::new(n.as_str(), target)))
            .collect()
    }
}

/// Compute the tags a snapshot calls for, bound to concrete commits.
///
/// # Errors
/// Returns [`VersionError`] on malformed version arithmetic.
pub fn new_tags(execution: &Execution, refs: &dyn RefProvider) -> Result<Tags, VersionError> {
    let output = Calculation::from_execution(execution)?.new_tags()?;
    Ok(output.apply_refs(refs))
}
