//! Reference snapshots.
//!
//! An [`Execution`] is the engine's only input: four tag scopes, the PR
//! number, a handful of flags, and the commits each scope's output binds to.
//! It is built once per attempt and never mutated; the reservation loop
//! throws it away and loads a new one after losing a race.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::calculate::Refs;
use crate::error::SimverError;
use crate::pr::PullRequestResolver;
use crate::store::{GitReferenceProvider, TagReader};
use crate::tags::Tags;

/// An immutable view of the tag namespace from one PR's point of view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Pull request number; 0 for a direct push or local run.
    pub pr: u64,
    /// The PR has been merged.
    pub is_merge: bool,
    /// The base branch is the root branch.
    pub is_targeting_root: bool,
    /// The working tree has uncommitted changes.
    pub is_dirty: bool,
    /// Running outside the hosting platform.
    pub is_local: bool,
    /// Tags reachable from the root branch.
    pub root_branch_tags: Tags,
    /// Tags reachable from the base branch.
    pub base_branch_tags: Tags,
    /// Tags that belong to this PR's branch only.
    pub head_branch_tags: Tags,
    /// Tags on the exact head (or merge) commit.
    pub head_commit_tags: Tags,
    /// Where each output scope gets written.
    pub refs: Refs,
}

impl Execution {
    /// Load a snapshot for the current pull request.
    ///
    /// Fetches tags first so the snapshot reflects every tag pushed so far.
    /// For an open PR the head-branch tags are those on the head branch that
    /// are not also on the base branch. For a merged PR they are the tags
    /// reachable from the PR head but not from the base commit, and the
    /// head-commit tags are read from the merge commit.
    ///
    /// # Errors
    /// Propagates tag-reading and PR-resolution failures unchanged.
    #[instrument(skip_all)]
    pub fn load(
        reader: &dyn TagReader,
        resolver: &dyn PullRequestResolver,
    ) -> Result<Self, SimverError> {
        reader.fetch_all()?;
        let pr = resolver.current_pr()?;
        debug!(
            number = pr.number,
            head_branch = %pr.head_branch,
            base_branch = %pr.base_branch,
            root_branch = %pr.root_branch,
            merged = pr.merged,
            head = %pr.head_commit,
            base = %pr.base_commit,
            root = %pr.root_commit,
            merge = %pr.merge_commit,
            "resolved pull request"
        );

        let root_branch_tags = reader.tags_reachable_from_branch(&pr.root_branch)?;
        let base_branch_tags = reader.tags_reachable_from_branch(&pr.base_branch)?;

        let is_merge = pr.is_merge();
        let (head_branch_tags, head_commit_tags) = if is_merge {
            let from_head = reader.tags_reachable_from_commit(&pr.head_commit)?;
            let from_base = reader.tags_reachable_from_commit(&pr.base_commit)?;
            (
                from_head.without_names_in(&from_base),
                reader.tags_on_commit(&pr.merge_commit)?,
            )
        } else {
            let from_head = reader.tags_reachable_from_branch(&pr.head_branch)?;
            (
                from_head.without_names_in(&base_branch_tags),
                reader.tags_on_commit(&pr.head_commit)?,
            )
        };

        let execution = Self {
            pr: pr.number,
            is_merge,
            is_targeting_root: pr.base_branch == pr.root_branch,
            is_dirty: false,
            is_local: false,
            root_branch_tags,
            base_branch_tags,
            head_branch_tags,
            head_commit_tags,
            refs: Refs {
                head: pr.head_commit,
                base: pr.base_commit,
                root: pr.root_commit,
                merge: pr.merge_commit,
            },
        };
        execution.log_loaded();
        Ok(execution)
    }

    /// Load a read-only snapshot of the local checkout.
    ///
    /// The current branch's tags serve as both base and head tags. There are
    /// no root-branch or head-commit tags, and every output scope binds to
    /// `HEAD`.
    ///
    /// # Errors
    /// Propagates git failures unchanged.
    #[instrument(skip_all, fields(root_branch = %root_branch))]
    pub fn load_local(
        git: &dyn GitReferenceProvider,
        reader: &dyn TagReader,
        root_branch: &str,
    ) -> Result<Self, SimverError> {
        let commit = git.resolve("HEAD")?;
        let branch = git.current_branch()?;
        let tags = reader.tags_reachable_from_commit(&commit)?;
        let is_dirty = git.is_dirty()?;
        debug!(%commit, branch = ?branch, is_dirty, "loaded local checkout");

        let execution = Self {
            pr: 0,
            is_merge: false,
            is_targeting_root: branch.as_deref() == Some(root_branch),
            is_dirty,
            is_local: true,
            root_branch_tags: Tags::new(),
            base_branch_tags: tags.clone(),
            head_branch_tags: tags,
            head_commit_tags: Tags::new(),
            refs: Refs::single(commit),
        };
        execution.log_loaded();
        Ok(execution)
    }

    /// The commits each output scope binds to.
    #[must_use]
    pub const fn refs(&self) -> &Refs {
        &self.refs
    }

    /// Pretty JSON for diagnostics.
    ///
    /// # Errors
    /// Returns [`SimverError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, SimverError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn log_loaded(&self) {
        debug!(
            pr = self.pr,
            is_merge = self.is_merge,
            is_targeting_root = self.is_targeting_root,
            is_local = self.is_local,
            root_branch_tags = %self.root_branch_tags,
            base_branch_tags = %self.base_branch_tags,
            head_branch_tags = %self.head_branch_tags,
            head_commit_tags = %self.head_commit_tags,
            "loaded tags"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::pr::{PrDetails, StaticResolver};
    use crate::tags::Tag;

    /// Tags keyed by the branch or commit they are reachable from.
    #[derive(Default)]
    struct FakeReader {
        reachable: HashMap<String, Vec<&'static str>>,
        on_commit: HashMap<String, Vec<&'static str>>,
        head: String,
        branch: Option<String>,
        dirty: bool,
    }

    fn to_tags(names: Option<&Vec<&'static str>>) -> Tags {
        names
            .map(|ns| ns.iter().map(|n| Tag::new(*n, "x")).collect())
            .unwrap_or_default()
    }

    impl TagReader for FakeReader {
        fn fetch_all(&self) -> Result<Tags, SimverError> {
            Ok(Tags::new())
        }

        fn tags_on_commit(&self, commit: &str) -> Result<Tags, SimverError> {
            Ok(to_tags(self.on_commit.get(commit)))
        }

        fn tags_reachable_from_branch(&self, branch: &str) -> Result<Tags, SimverError> {
            Ok(to_tags(self.reachable.get(branch)))
        }

        fn tags_reachable_from_commit(&self, commit: &str) -> Result<Tags, SimverError> {
            Ok(to_tags(self.reachable.get(commit)))
        }
    }

    impl GitReferenceProvider for FakeReader {
        fn resolve(&self, _spec: &str) -> Result<String, SimverError> {
            Ok(self.head.clone())
        }

        fn current_branch(&self) -> Result<Option<String>, SimverError> {
            Ok(self.branch.clone())
        }

        fn is_dirty(&self) -> Result<bool, SimverError> {
            Ok(self.dirty)
        }
    }

    fn open_pr() -> PrDetails {
        PrDetails {
            number: 4,
            head_branch: "feature".to_owned(),
            base_branch: "main".to_owned(),
            root_branch: "main".to_owned(),
            head_commit: "h".to_owned(),
            base_commit: "b".to_owned(),
            root_commit: "b".to_owned(),
            ..PrDetails::default()
        }
    }

    #[test]
    fn open_pr_prunes_base_tags_from_head() {
        let mut reader = FakeReader::default();
        reader
            .reachable
            .insert("main".to_owned(), vec!["v0.1.0", "v0.2.0-reserved"]);
        reader.reachable.insert(
            "feature".to_owned(),
            vec!["v0.1.0", "v0.2.0-reserved", "v0.2.0-pr4+1"],
        );
        reader.on_commit.insert("h".to_owned(), vec!["v0.2.0-pr4+1"]);

        let ex = Execution::load(&reader, &StaticResolver::new(open_pr())).unwrap();
        assert_eq!(ex.pr, 4);
        assert!(!ex.is_merge);
        assert!(ex.is_targeting_root);
        assert_eq!(ex.head_branch_tags.names(), ["v0.2.0-pr4+1"]);
        assert_eq!(ex.head_commit_tags.names(), ["v0.2.0-pr4+1"]);
        assert_eq!(ex.root_branch_tags.len(), 2);
        assert_eq!(ex.refs.head, "h");
        assert_eq!(ex.refs.base, "b");
    }

    #[test]
    fn merged_pr_reads_merge_commit() {
        let mut reader = FakeReader::default();
        reader
            .reachable
            .insert("main".to_owned(), vec!["v0.1.0", "v0.2.0-pr4+1"]);
        reader
            .reachable
            .insert("h".to_owned(), vec!["v0.1.0", "v0.2.0-pr4+1"]);
        reader.reachable.insert("b".to_owned(), vec!["v0.1.0"]);
        reader.on_commit.insert("m".to_owned(), vec![]);

        let pr = PrDetails {
            merged: true,
            merge_commit: "m".to_owned(),
            ..open_pr()
        };
        let ex = Execution::load(&reader, &StaticResolver::new(pr)).unwrap();
        assert!(ex.is_merge);
        assert_eq!(ex.head_branch_tags.names(), ["v0.2.0-pr4+1"]);
        assert!(ex.head_commit_tags.is_empty());
        assert_eq!(ex.refs.merge, "m");
    }

    #[test]
    fn simulated_push_is_never_a_merge() {
        let mut reader = FakeReader::default();
        reader.reachable.insert("main".to_owned(), vec!["v0.3.0"]);
        let pr = PrDetails::simulated_push("main", "h", "b", "main", "h");
        let ex = Execution::load(&reader, &StaticResolver::new(pr)).unwrap();
        assert_eq!(ex.pr, 0);
        assert!(!ex.is_merge);
        assert!(ex.head_branch_tags.is_empty());
    }

    #[test]
    fn local_uses_branch_tags_for_base_and_head() {
        let mut reader = FakeReader {
            head: "abc".to_owned(),
            branch: Some("main".to_owned()),
            dirty: true,
            ..FakeReader::default()
        };
        reader.reachable.insert("abc".to_owned(), vec!["v0.1.0"]);

        let ex = Execution::load_local(&reader, &reader, "main").unwrap();
        assert!(ex.is_local);
        assert!(ex.is_dirty);
        assert!(ex.is_targeting_root);
        assert_eq!(ex.base_branch_tags, ex.head_branch_tags);
        assert!(ex.root_branch_tags.is_empty());
        assert_eq!(ex.refs, Refs::single("abc"));
    }

    #[test]
    fn detached_local_is_not_targeting_root() {
        let reader = FakeReader {
            head: "abc".to_owned(),
            ..FakeReader::default()
        };
        let ex = Execution::load_local(&reader, &reader, "main").unwrap();
        assert!(!ex.is_targeting_root);
    }

    #[test]
    fn json_round_trip() {
        let ex = Execution {
            pr: 2,
            head_commit_tags: vec![Tag::new("v0.2.0-pr2+1", "h")].into(),
            ..Execution::default()
        };
        let json = ex.to_json().unwrap();
        assert!(json.contains(r#""ref": "h""#));
        let back: Execution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ex);
    }
}
