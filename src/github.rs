//! GitHub Actions integration.
//!
//! [`ActionsEvent`] classifies the triggering ref, [`GhCli`] looks PRs up
//! through the `gh` CLI, and [`ActionsResolver`] combines them into the
//! current PR. Parsing of `gh` output lives in free functions so it can be
//! tested without the CLI.

use std::path::PathBuf;
use std::process::Command;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::ActionsEnv;
use crate::error::SimverError;
use crate::pr::{PrDetails, PullRequestProvider, PullRequestResolver};
use crate::store::GitReferenceProvider;

/// Fields requested from `gh pr view/list --json`.
pub const PR_FIELDS: &str =
    "number,state,baseRefName,headRefName,mergeCommit,headRefOid,potentialMergeCommit";

// ---------------------------------------------------------------------------
// ActionsEvent
// ---------------------------------------------------------------------------

/// What triggered the workflow, judged from `GITHUB_REF`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionsEvent {
    /// `refs/pull/<n>/merge`.
    PullRequest {
        /// The PR number.
        number: u64,
    },
    /// `refs/heads/<branch>`.
    Push {
        /// The pushed branch.
        branch: String,
    },
    /// Anything else (tags, empty).
    Unsupported(String),
}

impl ActionsEvent {
    /// Classify a `GITHUB_REF` value.
    #[must_use]
    pub fn from_ref(git_ref: &str) -> Self {
        if let Some(rest) = git_ref.strip_prefix("refs/pull/") {
            let number = rest.strip_suffix("/merge").unwrap_or(rest);
            return number.parse().map_or_else(
                |_| Self::Unsupported(git_ref.to_owned()),
                |number| Self::PullRequest { number },
            );
        }
        if let Some(branch) = git_ref.strip_prefix("refs/heads/") {
            return Self::Push {
                branch: branch.to_owned(),
            };
        }
        Self::Unsupported(git_ref.to_owned())
    }
}

// ---------------------------------------------------------------------------
// gh JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GhCommit {
    oid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhPullRequest {
    number: u64,
    state: String,
    #[serde(default)]
    base_ref_name: String,
    #[serde(default)]
    head_ref_name: String,
    #[serde(default)]
    merge_commit: Option<GhCommit>,
    #[serde(default)]
    head_ref_oid: String,
    #[serde(default)]
    potential_merge_commit: Option<GhCommit>,
}

impl GhPullRequest {
    fn into_details(self, root_branch: &str) -> PrDetails {
        PrDetails {
            number: self.number,
            head_branch: self.head_ref_name,
            base_branch: self.base_ref_name,
            root_branch: root_branch.to_owned(),
            merged: self.state == "MERGED",
            merge_commit: self.merge_commit.map(|c| c.oid).unwrap_or_default(),
            head_commit: self.head_ref_oid,
            base_commit: String::new(),
            root_commit: String::new(),
            potential_merge_commit: self.potential_merge_commit.map(|c| c.oid).unwrap_or_default(),
        }
    }
}

/// Whether `pr` is the PR that produced `commit`: a merged PR whose merge
/// commit it is, or an open PR whose head it is.
#[must_use]
pub fn pr_matches_commit(pr: &PrDetails, commit: &str) -> bool {
    if pr.merged {
        pr.merge_commit == commit
    } else {
        pr.head_commit == commit
    }
}

/// Pick the relevant PR out of a `gh pr list --json` array: the first merged
/// one, else the first open one. With `commit`, only PRs that
/// [match it](pr_matches_commit) are considered; `gh pr list --search`
/// also returns PRs that merely contain the commit. Base and root commits
/// are left empty.
///
/// # Errors
/// Returns [`SimverError::Json`] on malformed output.
pub fn select_pull_request(
    json: &str,
    root_branch: &str,
    commit: Option<&str>,
) -> Result<Option<PrDetails>, SimverError> {
    let prs: Vec<GhPullRequest> = serde_json::from_str(json)?;
    let candidates: Vec<PrDetails> = prs
        .into_iter()
        .filter(|pr| pr.state == "MERGED" || pr.state == "OPEN")
        .map(|pr| pr.into_details(root_branch))
        .filter(|pr| commit.is_none_or(|c| pr_matches_commit(pr, c)))
        .collect();
    let index = candidates.iter().position(|pr| pr.merged).unwrap_or(0);
    Ok(candidates.into_iter().nth(index))
}

/// The first parent's sha from a `git/commits/<sha>` API response.
///
/// # Errors
/// Malformed JSON, or a commit without parents.
pub fn parse_first_parent(json: &str) -> Result<String, SimverError> {
    #[derive(Deserialize)]
    struct Parent {
        sha: String,
    }
    #[derive(Deserialize)]
    struct CommitResponse {
        #[serde(default)]
        parents: Vec<Parent>,
    }

    let commit: CommitResponse = serde_json::from_str(json)?;
    commit
        .parents
        .into_iter()
        .next()
        .map(|p| p.sha)
        .ok_or_else(|| SimverError::PullRequest("commit has no parents".to_owned()))
}

/// The object sha from a `git/ref/heads/<branch>` API response.
///
/// # Errors
/// Malformed JSON, or an empty sha.
pub fn parse_ref_sha(json: &str) -> Result<String, SimverError> {
    #[derive(Deserialize)]
    struct Object {
        #[serde(default)]
        sha: String,
    }
    #[derive(Deserialize)]
    struct RefResponse {
        object: Object,
    }

    let r: RefResponse = serde_json::from_str(json)?;
    if r.object.sha.is_empty() {
        return Err(SimverError::PullRequest("ref has no sha".to_owned()));
    }
    Ok(r.object.sha)
}

// ---------------------------------------------------------------------------
// GhCli
// ---------------------------------------------------------------------------

/// A [`PullRequestProvider`] that shells out to `gh`.
#[derive(Clone, Debug)]
pub struct GhCli {
    executable: String,
    token: Option<String>,
    workdir: PathBuf,
    owner: String,
    repo: String,
    root_branch: String,
}

impl GhCli {
    /// A provider for `owner/repo`, running `gh` inside `workdir`.
    pub fn new(
        executable: impl Into<String>,
        workdir: impl Into<PathBuf>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        root_branch: impl Into<String>,
    ) -> Self {
        Self {
            executable: executable.into(),
            token: None,
            workdir: workdir.into(),
            owner: owner.into(),
            repo: repo.into(),
            root_branch: root_branch.into(),
        }
    }

    /// Authenticate `gh` with this token (`GH_TOKEN`).
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn run(&self, args: &[&str]) -> Result<String, SimverError> {
        debug!(executable = %self.executable, ?args, "running gh");
        let mut cmd = Command::new(&self.executable);
        cmd.args(args).current_dir(&self.workdir);
        if let Some(token) = &self.token {
            cmd.env("GH_TOKEN", token);
        }
        let command = format!("{} {}", self.executable, args.join(" "));
        let output = cmd.output().map_err(|e| SimverError::Command {
            command: command.clone(),
            message: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(SimverError::Command {
                command,
                message: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn api(&self, path: &str) -> Result<String, SimverError> {
        self.run(&["api", "-H", "Accept: application/vnd.github+json", path])
    }

    /// Fill in the base commit (first parent of the trial merge, or of the
    /// merge commit) and the root-branch head.
    fn complete(&self, mut pr: PrDetails) -> Result<PrDetails, SimverError> {
        let merge = if pr.potential_merge_commit.is_empty() {
            &pr.merge_commit
        } else {
            &pr.potential_merge_commit
        };
        if merge.is_empty() {
            return Err(SimverError::PullRequest(format!(
                "PR #{} has neither a merge commit nor a potential merge commit",
                pr.number
            )));
        }
        let commit = self.api(&format!(
            "/repos/{}/{}/git/commits/{merge}",
            self.owner, self.repo
        ))?;
        pr.base_commit = parse_first_parent(&commit)?;

        let root = self.api(&format!(
            "/repos/{}/{}/git/ref/heads/{}",
            self.owner, self.repo, self.root_branch
        ))?;
        pr.root_commit = parse_ref_sha(&root)?;
        Ok(pr)
    }
}

impl PullRequestProvider for GhCli {
    #[instrument(skip(self))]
    fn by_number(&self, number: u64) -> Result<Option<PrDetails>, SimverError> {
        let out = self.run(&["pr", "view", &number.to_string(), "--json", PR_FIELDS])?;
        let list = format!("[{}]", out.trim());
        select_pull_request(&list, &self.root_branch, None)?
            .map(|pr| self.complete(pr))
            .transpose()
    }

    #[instrument(skip(self))]
    fn by_commit(&self, commit: &str) -> Result<Option<PrDetails>, SimverError> {
        let out = self.run(&[
            "pr", "list", "--search", commit, "--state", "all", "--json", PR_FIELDS,
        ])?;
        select_pull_request(&out, &self.root_branch, Some(commit))?
            .map(|pr| self.complete(pr))
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// ActionsResolver
// ---------------------------------------------------------------------------

/// Resolves the current PR from the Actions context.
///
/// - PR event: the PR with that number.
/// - Push event: the PR that produced `GITHUB_SHA` (its merge commit, or
///   the head of an open PR on the pushed branch) if there is one. Otherwise,
///   when the event really is a `push`, a simulated push based on `HEAD^`.
pub struct ActionsResolver<'a> {
    env: &'a ActionsEnv,
    provider: &'a dyn PullRequestProvider,
    git: &'a dyn GitReferenceProvider,
    root_branch: String,
}

impl<'a> ActionsResolver<'a> {
    /// Combine the captured environment with a PR provider and the checkout.
    pub fn new(
        env: &'a ActionsEnv,
        provider: &'a dyn PullRequestProvider,
        git: &'a dyn GitReferenceProvider,
        root_branch: impl Into<String>,
    ) -> Self {
        Self {
            env,
            provider,
            git,
            root_branch: root_branch.into(),
        }
    }
}

impl PullRequestResolver for ActionsResolver<'_> {
    #[instrument(skip(self), fields(git_ref = %self.env.git_ref, event = %self.env.event_name))]
    fn current_pr(&self) -> Result<PrDetails, SimverError> {
        match ActionsEvent::from_ref(&self.env.git_ref) {
            ActionsEvent::PullRequest { number } => {
                self.provider.by_number(number)?.ok_or_else(|| {
                    SimverError::PullRequest(format!("PR #{number} not found in a PR event"))
                })
            }
            ActionsEvent::Push { branch } => {
                // An open PR only owns pushes to its own branch; its head
                // fast-forwarded onto another branch is a plain push there.
                let pr = self
                    .provider
                    .by_commit(&self.env.sha)?
                    .filter(|pr| pr.merged || pr.head_branch == branch);
                if let Some(pr) = pr {
                    return Ok(pr);
                }
                if self.env.event_name != "push" {
                    return Err(SimverError::PullRequest(format!(
                        "`{}` event on {branch} is neither a PR nor a push",
                        self.env.event_name
                    )));
                }
                let parent = self.git.resolve("HEAD^")?;
                debug!(%branch, %parent, "no PR for commit, simulating push");
                Ok(PrDetails::simulated_push(
                    branch,
                    self.env.sha.clone(),
                    parent,
                    self.root_branch.clone(),
                    self.env.sha.clone(),
                ))
            }
            ActionsEvent::Unsupported(git_ref) => Err(SimverError::PullRequest(format!(
                "`{git_ref}` is neither a PR nor a branch ref"
            ))),
        }
    }
}
