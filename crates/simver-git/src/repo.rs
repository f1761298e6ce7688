//! The [`GitRepo`] trait: the abstraction boundary between simver and git.
//!
//! The trait is object-safe so callers can hold `&dyn GitRepo` or
//! `Box<dyn GitRepo>`, and tests can substitute an in-memory double.
//!
//! | Group     | Methods                                                   | Backend |
//! |-----------|-----------------------------------------------------------|---------|
//! | Refs      | `read_ref`, `list_refs`, `rev_parse`                      | gix     |
//! | Tags      | `list_tags`, `tags_pointing_at`, `tags_reachable_from`    | gix     |
//! | Tag write | `create_tag`, `delete_tag`                                | git CLI |
//! | Transport | `fetch_tags`, `push_tags`                                 | git CLI |
//! | Worktree  | `current_branch`, `is_dirty`                              | gix     |

use crate::error::GitError;
use crate::types::{GitOid, RefName, TagRef};

/// The git abstraction trait used by simver.
pub trait GitRepo {
    // -----------------------------------------------------------------------
    // Refs
    // -----------------------------------------------------------------------

    /// Resolve a ref to the commit it peels to, returning `None` if the ref
    /// does not exist.
    fn read_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError>;

    /// List refs matching a prefix (e.g., `"refs/tags/"`), peeled to their
    /// target object. The prefix is matched literally.
    fn list_refs(&self, prefix: &str) -> Result<Vec<(RefName, GitOid)>, GitError>;

    /// Resolve a revision specification (`HEAD^`, `origin/main`, a hex id).
    ///
    /// Returns [`GitError::NotFound`] if the spec cannot be resolved.
    fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    /// Every tag in the local repository, sorted by name.
    fn list_tags(&self) -> Result<Vec<TagRef>, GitError> {
        Ok(self
            .list_refs(crate::types::TAG_PREFIX)?
            .into_iter()
            .filter_map(|(name, target)| {
                name.tag_name().map(|n| TagRef {
                    name: n.to_owned(),
                    target,
                })
            })
            .collect())
    }

    /// Tags whose peeled target is exactly `commit`.
    ///
    /// Replaces: `git tag --points-at <commit>`.
    fn tags_pointing_at(&self, commit: GitOid) -> Result<Vec<TagRef>, GitError> {
        Ok(self
            .list_tags()?
            .into_iter()
            .filter(|t| t.target == commit)
            .collect())
    }

    /// Tags whose target is `tip` or one of its ancestors.
    ///
    /// Replaces: `git tag --merged <tip>`.
    fn tags_reachable_from(&self, tip: GitOid) -> Result<Vec<TagRef>, GitError>;

    // -----------------------------------------------------------------------
    // Tag write
    // -----------------------------------------------------------------------

    /// Create a tag locally: annotated with `message` when given, otherwise
    /// lightweight.
    ///
    /// Two annotated tags with different messages are different objects even
    /// on the same commit, so a remote rejects the second push of the name.
    /// Two lightweight tags on the same commit look identical to the remote.
    ///
    /// Returns [`GitError::RefConflict`] if a tag with that name exists.
    fn create_tag(&self, name: &str, target: GitOid, message: Option<&str>)
    -> Result<(), GitError>;

    /// Delete a local tag. No-op if it does not exist.
    fn delete_tag(&self, name: &str) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    /// Fetch branches and tags from `remote`, letting remote tags replace
    /// local ones of the same name.
    fn fetch_tags(&self, remote: &str) -> Result<(), GitError>;

    /// Push the named tags to `remote` in a single atomic push: either every
    /// tag lands or none does.
    ///
    /// Returns [`GitError::RefConflict`] if the remote rejected a tag because
    /// the name is already taken.
    fn push_tags(&self, remote: &str, names: &[String]) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Worktree
    // -----------------------------------------------------------------------

    /// The short name of the checked-out branch, or `None` when HEAD is
    /// detached.
    fn current_branch(&self) -> Result<Option<String>, GitError>;

    /// Whether the working tree has uncommitted changes.
    fn is_dirty(&self) -> Result<bool, GitError>;
}
