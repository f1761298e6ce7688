//! The gix-backed implementation of [`GitRepo`].

use std::path::{Path, PathBuf};

use crate::error::GitError;
use crate::repo::GitRepo;
use crate::types::{GitOid, RefName, TagRef};

/// A [`GitRepo`] implementation backed by [gix](https://github.com/GitoxideLabs/gitoxide)
/// for reads and the `git` executable for tag writes and transport.
///
/// Construct via [`GixRepo::open`] or [`GixRepo::open_at`].
pub struct GixRepo {
    pub(crate) repo: gix::Repository,
    pub(crate) workdir: PathBuf,
    pub(crate) git_executable: String,
}

impl GixRepo {
    /// Open the git repository at or above `path`.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = gix::discover(path).map_err(|e| GitError::BackendError {
            message: e.to_string(),
        })?;
        Ok(Self::from_repo(repo))
    }

    /// Open a git repository at exactly `path` (no parent discovery).
    pub fn open_at(path: &Path) -> Result<Self, GitError> {
        let repo = gix::open_opts(path, gix::open::Options::isolated()).map_err(|e| {
            GitError::BackendError {
                message: e.to_string(),
            }
        })?;
        Ok(Self::from_repo(repo))
    }

    fn from_repo(repo: gix::Repository) -> Self {
        let workdir = repo
            .workdir()
            .map_or_else(|| repo.git_dir().to_path_buf(), Path::to_path_buf);
        Self {
            repo,
            workdir,
            git_executable: "git".to_owned(),
        }
    }

    /// Use a different `git` binary for subprocess operations.
    #[must_use]
    pub fn with_git_executable(mut self, executable: impl Into<String>) -> Self {
        self.git_executable = executable.into();
        self
    }

    /// The directory git subprocesses run in.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

impl GitRepo for GixRepo {
    // === Refs ===
    fn read_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError> {
        crate::refs_impl::read_ref(self, name)
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(RefName, GitOid)>, GitError> {
        crate::refs_impl::list_refs(self, prefix)
    }

    fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError> {
        crate::refs_impl::rev_parse(self, spec)
    }

    // === Tags ===
    fn tags_reachable_from(&self, tip: GitOid) -> Result<Vec<TagRef>, GitError> {
        crate::refs_impl::tags_reachable_from(self, tip)
    }

    fn create_tag(
        &self,
        name: &str,
        target: GitOid,
        message: Option<&str>,
    ) -> Result<(), GitError> {
        crate::tag_impl::create_tag(self, name, target, message)
    }

    fn delete_tag(&self, name: &str) -> Result<(), GitError> {
        crate::tag_impl::delete_tag(self, name)
    }

    // === Transport ===
    fn fetch_tags(&self, remote: &str) -> Result<(), GitError> {
        crate::tag_impl::fetch_tags(self, remote)
    }

    fn push_tags(&self, remote: &str, names: &[String]) -> Result<(), GitError> {
        crate::tag_impl::push_tags(self, remote, names)
    }

    // === Worktree ===
    fn current_branch(&self) -> Result<Option<String>, GitError> {
        crate::refs_impl::current_branch(self)
    }

    fn is_dirty(&self) -> Result<bool, GitError> {
        crate::status_impl::is_dirty(self)
    }
}
