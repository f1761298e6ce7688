//! Tag storage.
//!
//! simver talks to the tag store through three small traits so the engine
//! and the reservation loop can run against an in-memory double in tests.
//! [`GitTagStore`] implements all three over a [`GitRepo`].

use simver_git::{GitError, GitOid, GitRepo, RefName, TagRef};
use tracing::{debug, info, instrument, warn};

use crate::error::SimverError;
use crate::tags::{Tag, Tags};

/// Read access to the tag namespace.
pub trait TagReader {
    /// Sync local tags with the remote and return every tag.
    ///
    /// # Errors
    /// Transport failures.
    fn fetch_all(&self) -> Result<Tags, SimverError>;

    /// Tags that point exactly at `commit`.
    ///
    /// # Errors
    /// The commit cannot be resolved.
    fn tags_on_commit(&self, commit: &str) -> Result<Tags, SimverError>;

    /// Tags reachable from the tip of `branch`.
    ///
    /// # Errors
    /// The branch cannot be resolved.
    fn tags_reachable_from_branch(&self, branch: &str) -> Result<Tags, SimverError>;

    /// Tags reachable from `commit`.
    ///
    /// # Errors
    /// The commit cannot be resolved.
    fn tags_reachable_from_commit(&self, commit: &str) -> Result<Tags, SimverError>;
}

/// Write access to the tag namespace.
pub trait TagWriter {
    /// Publish `tags` atomically: either all of them land or none do.
    ///
    /// # Errors
    /// [`SimverError::TagExists`] if any name is already taken; transport
    /// errors otherwise.
    fn create_tags(&self, tags: &Tags) -> Result<(), SimverError>;
}

/// Facts about the local checkout.
pub trait GitReferenceProvider {
    /// Resolve a revision to a full commit id.
    ///
    /// # Errors
    /// The revision does not exist.
    fn resolve(&self, spec: &str) -> Result<String, SimverError>;

    /// The checked-out branch, or `None` when detached.
    ///
    /// # Errors
    /// Backend failures.
    fn current_branch(&self) -> Result<Option<String>, SimverError>;

    /// Whether the working tree has uncommitted changes.
    ///
    /// # Errors
    /// Backend failures.
    fn is_dirty(&self) -> Result<bool, SimverError>;
}

/// A tag store backed by a git repository and one remote.
pub struct GitTagStore<R: GitRepo> {
    repo: R,
    remote: String,
    read_only: bool,
}

impl<R: GitRepo> GitTagStore<R> {
    /// A store that fetches from and pushes to `remote`.
    pub fn new(repo: R, remote: impl Into<String>) -> Self {
        Self {
            repo,
            remote: remote.into(),
            read_only: false,
        }
    }

    /// When set, [`TagWriter::create_tags`] logs what it would do and returns.
    #[must_use]
    pub const fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// The underlying repository.
    pub const fn repo(&self) -> &R {
        &self.repo
    }

    /// The remote tags are exchanged with.
    #[must_use]
    pub fn remote(&self) -> &str {
        &self.remote
    }

    fn parse_commit(&self, commit: &str) -> Result<GitOid, SimverError> {
        if let Ok(oid) = commit.parse::<GitOid>() {
            return Ok(oid);
        }
        Ok(self.repo.rev_parse(commit)?)
    }

    /// Prefer the remote-tracking branch, which reflects what CI sees, then
    /// the local branch, then any revision spec.
    fn resolve_branch(&self, branch: &str) -> Result<GitOid, SimverError> {
        for candidate in [
            format!("refs/remotes/{}/{branch}", self.remote),
            format!("refs/heads/{branch}"),
        ] {
            let Ok(name) = RefName::new(&candidate) else {
                continue;
            };
            if let Some(oid) = self.repo.read_ref(&name)? {
                return Ok(oid);
            }
        }
        Ok(self.repo.rev_parse(branch)?)
    }

    fn rollback(&self, created: &[String]) {
        for name in created {
            if let Err(e) = self.repo.delete_tag(name) {
                warn!(tag = %name, error = %e, "failed to remove local tag after rejected push");
            }
        }
    }
}

fn to_tags(refs: Vec<TagRef>) -> Tags {
    refs.into_iter()
        .map(|t| Tag::new(t.name, t.target.to_string()))
        .collect()
}

fn batch_message(tags: &Tags) -> String {
    format!("simver: {}", tags.names().join(" "))
}

fn conflict_to_tag_exists(err: GitError) -> SimverError {
    match err {
        GitError::RefConflict { ref_name, .. } => SimverError::TagExists {
            name: ref_name
                .strip_prefix(simver_git::types::TAG_PREFIX)
                .unwrap_or(&ref_name)
                .to_owned(),
        },
        other => SimverError::Git(other),
    }
}

impl<R: GitRepo> TagReader for GitTagStore<R> {
    #[instrument(skip(self), fields(remote = %self.remote))]
    fn fetch_all(&self) -> Result<Tags, SimverError> {
        self.repo.fetch_tags(&self.remote)?;
        let tags = to_tags(self.repo.list_tags()?);
        debug!(count = tags.len(), "fetched tags");
        Ok(tags)
    }

    fn tags_on_commit(&self, commit: &str) -> Result<Tags, SimverError> {
        let oid = self.parse_commit(commit)?;
        Ok(to_tags(self.repo.tags_pointing_at(oid)?))
    }

    fn tags_reachable_from_branch(&self, branch: &str) -> Result<Tags, SimverError> {
        let oid = self.resolve_branch(branch)?;
        Ok(to_tags(self.repo.tags_reachable_from(oid)?))
    }

    fn tags_reachable_from_commit(&self, commit: &str) -> Result<Tags, SimverError> {
        let oid = self.parse_commit(commit)?;
        Ok(to_tags(self.repo.tags_reachable_from(oid)?))
    }
}

impl<R: GitRepo> TagWriter for GitTagStore<R> {
    #[instrument(skip_all, fields(remote = %self.remote, count = tags.len()))]
    fn create_tags(&self, tags: &Tags) -> Result<(), SimverError> {
        if tags.is_empty() {
            return Ok(());
        }
        if self.read_only {
            info!(tags = %tags, "read-only: not creating tags");
            return Ok(());
        }

        // Every tag in the batch carries the batch as its message, so a
        // competing batch for the same name is a different object.
        let message = batch_message(tags);
        let mut created = Vec::with_capacity(tags.len());
        for tag in tags {
            let target = match self.parse_commit(&tag.target) {
                Ok(oid) => oid,
                Err(e) => {
                    self.rollback(&created);
                    return Err(e);
                }
            };
            if let Err(e) = self.repo.create_tag(&tag.name, target, Some(&message)) {
                self.rollback(&created);
                return Err(conflict_to_tag_exists(e));
            }
            created.push(tag.name.clone());
        }

        if let Err(e) = self.repo.push_tags(&self.remote, &created) {
            self.rollback(&created);
            return Err(conflict_to_tag_exists(e));
        }
        info!(tags = %tags, "published tags");
        Ok(())
    }
}

impl<R: GitRepo> GitReferenceProvider for GitTagStore<R> {
    fn resolve(&self, spec: &str) -> Result<String, SimverError> {
        Ok(self.repo.rev_parse(spec)?.to_string())
    }

    fn current_branch(&self) -> Result<Option<String>, SimverError> {
        Ok(self.repo.current_branch()?)
    }

    fn is_dirty(&self) -> Result<bool, SimverError> {
        Ok(self.repo.is_dirty()?)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use super::*;

    const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    /// Just enough of a repository to exercise the write path.
    #[derive(Default)]
    struct MemRepo {
        local: RefCell<BTreeMap<String, GitOid>>,
        remote_taken: Vec<String>,
        pushed: RefCell<Vec<String>>,
    }

    impl GitRepo for MemRepo {
        fn read_ref(&self, _name: &RefName) -> Result<Option<GitOid>, GitError> {
            Ok(None)
        }

        fn list_refs(&self, _prefix: &str) -> Result<Vec<(RefName, GitOid)>, GitError> {
            Ok(self
                .local
                .borrow()
                .iter()
                .map(|(n, o)| (RefName::new(&format!("refs/tags/{n}")).unwrap(), *o))
                .collect())
        }

        fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError> {
            Err(GitError::NotFound {
                message: spec.to_owned(),
            })
        }

        fn tags_reachable_from(&self, _tip: GitOid) -> Result<Vec<TagRef>, GitError> {
            self.list_tags()
        }

        fn create_tag(
            &self,
            name: &str,
            target: GitOid,
            message: Option<&str>,
        ) -> Result<(), GitError> {
            assert!(message.is_some_and(|m| m.contains(name)));
            let mut local = self.local.borrow_mut();
            if local.contains_key(name) {
                return Err(GitError::RefConflict {
                    ref_name: format!("refs/tags/{name}"),
                    message: "already exists".to_owned(),
                });
            }
            local.insert(name.to_owned(), target);
            Ok(())
        }

        fn delete_tag(&self, name: &str) -> Result<(), GitError> {
            self.local.borrow_mut().remove(name);
            Ok(())
        }

        fn fetch_tags(&self, _remote: &str) -> Result<(), GitError> {
            Ok(())
        }

        fn push_tags(&self, _remote: &str, names: &[String]) -> Result<(), GitError> {
            if let Some(taken) = names.iter().find(|n| self.remote_taken.contains(n)) {
                return Err(GitError::RefConflict {
                    ref_name: format!("refs/tags/{taken}"),
                    message: "already exists".to_owned(),
                });
            }
            self.pushed.borrow_mut().extend(names.iter().cloned());
            Ok(())
        }

        fn current_branch(&self) -> Result<Option<String>, GitError> {
            Ok(Some("main".to_owned()))
        }

        fn is_dirty(&self) -> Result<bool, GitError> {
            Ok(false)
        }
    }

    fn batch(names: &[&str]) -> Tags {
        names.iter().map(|n| Tag::new(*n, A)).collect()
    }

    #[test]
    fn create_tags_pushes_every_tag() {
        let store = GitTagStore::new(MemRepo::default(), "origin");
        store
            .create_tags(&batch(&["v0.2.0-reserved", "v0.2.0-pr1+base"]))
            .unwrap();
        assert_eq!(
            *store.repo().pushed.borrow(),
            ["v0.2.0-reserved", "v0.2.0-pr1+base"]
        );
    }

    #[test]
    fn remote_conflict_rolls_back_local_tags() {
        let repo = MemRepo {
            remote_taken: vec!["v0.2.0-reserved".to_owned()],
            ..MemRepo::default()
        };
        let store = GitTagStore::new(repo, "origin");
        let err = store
            .create_tags(&batch(&["v0.2.0-reserved", "v0.2.0-pr1+base"]))
            .unwrap_err();

        assert!(matches!(&err, SimverError::TagExists { name } if name == "v0.2.0-reserved"));
        assert!(err.is_contention());
        assert!(store.repo().local.borrow().is_empty());
        assert!(store.repo().pushed.borrow().is_empty());
    }

    #[test]
    fn local_conflict_rolls_back_earlier_tags() {
        let repo = MemRepo::default();
        repo.local
            .borrow_mut()
            .insert("v0.2.0-pr1+base".to_owned(), GitOid::from_bytes([0; 20]));
        let store = GitTagStore::new(repo, "origin");
        let err = store
            .create_tags(&batch(&["v0.2.0-reserved", "v0.2.0-pr1+base"]))
            .unwrap_err();

        assert!(err.is_contention());
        let local = store.repo().local.borrow();
        assert!(!local.contains_key("v0.2.0-reserved"));
        assert!(local.contains_key("v0.2.0-pr1+base"));
    }

    #[test]
    fn batch_message_names_every_tag() {
        assert_eq!(
            batch_message(&batch(&["v0.2.0-pr1+base", "v0.2.0-reserved"])),
            "simver: v0.2.0-pr1+base v0.2.0-reserved"
        );
    }

    #[test]
    fn read_only_store_writes_nothing() {
        let store = GitTagStore::new(MemRepo::default(), "origin").read_only(true);
        store.create_tags(&batch(&["v0.2.0"])).unwrap();
        assert!(store.repo().local.borrow().is_empty());
        assert!(store.repo().pushed.borrow().is_empty());
    }

    #[test]
    fn unresolvable_target_is_an_error() {
        let store = GitTagStore::new(MemRepo::default(), "origin");
        let err = store
            .create_tags(&vec![Tag::new("v0.2.0", "nope")].into())
            .unwrap_err();
        assert!(matches!(err, SimverError::Git(GitError::NotFound { .. })));
    }

    #[test]
    fn reads_convert_oids_to_hex() {
        let repo = MemRepo::default();
        repo.local
            .borrow_mut()
            .insert("v0.1.0".to_owned(), A.parse().unwrap());
        let store = GitTagStore::new(repo, "origin");
        let all = store.fetch_all().unwrap();
        assert_eq!(all, Tags::from(vec![Tag::new("v0.1.0", A)]));
        assert_eq!(store.tags_on_commit(A).unwrap().len(), 1);
    }
}
