//! simver configuration.
//!
//! Two sources, both read once at startup and passed down explicitly:
//!
//! - [`SimverConfig`]: the repository's `.simver.toml`.
//! - [`ActionsEnv`]: the GitHub Actions context, captured from environment
//!   variables. Library code never reads the environment itself.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::reserve::RetryPolicy;
use crate::wait::WaitOptions;

/// Name of the config file at the repository root.
pub const CONFIG_FILE: &str = ".simver.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level simver configuration.
///
/// Missing fields use defaults. Missing file → all defaults (no error).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimverConfig {
    /// Branch and remote settings.
    #[serde(default)]
    pub repo: RepoConfig,

    /// Reservation retry settings.
    #[serde(default)]
    pub reserve: ReserveConfig,

    /// `simver wait` settings.
    #[serde(default)]
    pub wait: WaitConfig,

    /// External executables.
    #[serde(default)]
    pub github: GithubConfig,
}

// ---------------------------------------------------------------------------
// RepoConfig
// ---------------------------------------------------------------------------

/// Repository-level settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    /// The trunk branch (default: `"main"`).
    #[serde(default = "default_root_branch")]
    pub root_branch: String,

    /// The remote tags are fetched from and pushed to (default: `"origin"`).
    #[serde(default = "default_remote")]
    pub remote: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            root_branch: default_root_branch(),
            remote: default_remote(),
        }
    }
}

fn default_root_branch() -> String {
    "main".to_owned()
}

fn default_remote() -> String {
    "origin".to_owned()
}

// ---------------------------------------------------------------------------
// ReserveConfig
// ---------------------------------------------------------------------------

/// Reservation retry bounds.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReserveConfig {
    /// Load/calculate/write cycles before giving up (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between attempts, in milliseconds (default: 1000).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ReserveConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl ReserveConfig {
    /// As a [`RetryPolicy`].
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

const fn default_max_attempts() -> u32 {
    5
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

// ---------------------------------------------------------------------------
// WaitConfig
// ---------------------------------------------------------------------------

/// Polling settings for `simver wait`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitConfig {
    /// Deadline in seconds (default: 120).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Poll interval in seconds (default: 5).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl WaitConfig {
    /// As [`WaitOptions`].
    #[must_use]
    pub const fn options(&self) -> WaitOptions {
        WaitOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            interval: Duration::from_secs(self.interval_secs),
        }
    }
}

const fn default_timeout_secs() -> u64 {
    120
}

const fn default_interval_secs() -> u64 {
    5
}

// ---------------------------------------------------------------------------
// GithubConfig
// ---------------------------------------------------------------------------

/// Executables simver shells out to.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GithubConfig {
    /// The GitHub CLI (default: `"gh"`).
    #[serde(default = "default_gh")]
    pub gh_executable: String,

    /// git, for tag writes and transport (default: `"git"`).
    #[serde(default = "default_git")]
    pub git_executable: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            gh_executable: default_gh(),
            git_executable: default_git(),
        }
    }
}

fn default_gh() -> String {
    "gh".to_owned()
}

fn default_git() -> String {
    "git".to_owned()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a simver configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl SimverConfig {
    /// Load `.simver.toml` from a repository root.
    ///
    /// # Errors
    /// See [`SimverConfig::load`].
    pub fn load_from_repo(root: &Path) -> Result<Self, ConfigError> {
        Self::load(&root.join(CONFIG_FILE))
    }

    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML or unknown fields,
    ///   returns a [`ConfigError`] with line-level detail.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// ActionsEnv
// ---------------------------------------------------------------------------

/// The GitHub Actions context for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionsEnv {
    /// `GITHUB_ACTIONS=true`.
    pub in_actions: bool,
    /// `GITHUB_REF`, e.g. `refs/pull/12/merge` or `refs/heads/main`.
    pub git_ref: String,
    /// `GITHUB_SHA`: the commit that triggered the workflow.
    pub sha: String,
    /// `GITHUB_EVENT_NAME`, e.g. `push` or `pull_request`.
    pub event_name: String,
    /// `GITHUB_HEAD_REF`: the PR source branch, for PR events.
    pub head_ref: String,
    /// Owner part of `GITHUB_REPOSITORY` (`GITHUB_REPOSITORY_OWNER`).
    pub owner: String,
    /// Name part of `GITHUB_REPOSITORY`, owner prefix stripped.
    pub repo: String,
    /// `GITHUB_WORKSPACE`: the checkout directory.
    pub workspace: Option<PathBuf>,
    /// `GITHUB_TOKEN`, handed to `gh` as `GH_TOKEN`.
    pub token: Option<String>,
    /// `SIMVER_READ_ONLY` is `true` or `1`.
    pub read_only: bool,
    /// `GITHUB_OUTPUT`: the step output file.
    pub output_file: Option<PathBuf>,
}

impl ActionsEnv {
    /// Capture the context through `lookup` (a variable name to value map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let owner = get("GITHUB_REPOSITORY_OWNER").unwrap_or_default();
        let full = get("GITHUB_REPOSITORY").unwrap_or_default();
        let repo = match full.split_once('/') {
            Some((o, name)) if owner.is_empty() || o == owner => name.to_owned(),
            _ => full.clone(),
        };
        let owner = if owner.is_empty() {
            full.split_once('/')
                .map(|(o, _)| o.to_owned())
                .unwrap_or_default()
        } else {
            owner
        };

        Self {
            in_actions: get("GITHUB_ACTIONS").as_deref() == Some("true"),
            git_ref: get("GITHUB_REF").unwrap_or_default(),
            sha: get("GITHUB_SHA").unwrap_or_default(),
            event_name: get("GITHUB_EVENT_NAME").unwrap_or_default(),
            head_ref: get("GITHUB_HEAD_REF").unwrap_or_default(),
            owner,
            repo,
            workspace: get("GITHUB_WORKSPACE").map(PathBuf::from),
            token: get("GITHUB_TOKEN"),
            read_only: matches!(get("SIMVER_READ_ONLY").as_deref(), Some("true" | "1")),
            output_file: get("GITHUB_OUTPUT").map(PathBuf::from),
        }
    }

    /// Capture the context from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_all_fields() {
        let cfg = SimverConfig::default();
        assert_eq!(cfg.repo.root_branch, "main");
        assert_eq!(cfg.repo.remote, "origin");
        assert_eq!(cfg.reserve.policy(), RetryPolicy::default());
        assert_eq!(cfg.wait.options(), WaitOptions::default());
        assert_eq!(cfg.github.gh_executable, "gh");
        assert_eq!(cfg.github.git_executable, "git");
    }

    #[test]
    fn parse_empty_string() {
        assert_eq!(SimverConfig::parse("").unwrap(), SimverConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[repo]
root_branch = "trunk"
remote = "upstream"

[reserve]
max_attempts = 8
retry_delay_ms = 250

[wait]
timeout_secs = 600
interval_secs = 10

[github]
gh_executable = "/opt/gh"
git_executable = "/usr/bin/git"
"#;
        let cfg = SimverConfig::parse(toml).unwrap();
        assert_eq!(cfg.repo.root_branch, "trunk");
        assert_eq!(cfg.repo.remote, "upstream");
        assert_eq!(
            cfg.reserve.policy(),
            RetryPolicy {
                max_attempts: 8,
                delay: Duration::from_millis(250),
            }
        );
        assert_eq!(cfg.wait.options().timeout, Duration::from_secs(600));
        assert_eq!(cfg.github.gh_executable, "/opt/gh");
    }

    #[test]
    fn parse_partial_config_uses_defaults() {
        let cfg = SimverConfig::parse("[reserve]\nmax_attempts = 2\n").unwrap();
        assert_eq!(cfg.reserve.max_attempts, 2);
        assert_eq!(cfg.reserve.retry_delay_ms, 1000);
        assert_eq!(cfg.repo, RepoConfig::default());
    }

    #[test]
    fn parse_rejects_unknown_nested_field() {
        let err = SimverConfig::parse("[repo]\nbranch = \"main\"\n").unwrap_err();
        assert!(err.message.contains("branch"), "{}", err.message);
    }

    #[test]
    fn parse_includes_line_number_on_error() {
        let toml = "[repo]\nremote = \"origin\"\nroot_branch = 42\n";
        let err = SimverConfig::parse(toml).unwrap_err();
        assert!(
            err.message.contains("line 3"),
            "error should include line number: {}",
            err.message
        );
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let cfg = SimverConfig::load(Path::new("/nonexistent/.simver.toml")).unwrap();
        assert_eq!(cfg, SimverConfig::default());
    }

    #[test]
    fn load_from_repo_reads_dotfile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[repo]\nroot_branch = \"develop\"\n")
            .unwrap();
        let cfg = SimverConfig::load_from_repo(dir.path()).unwrap();
        assert_eq!(cfg.repo.root_branch, "develop");
    }

    #[test]
    fn load_invalid_file_shows_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid [[[toml").unwrap();
        let err = SimverConfig::load(&path).unwrap_err();
        assert_eq!(err.path.as_deref(), Some(path.as_path()));
        assert!(err.to_string().starts_with(&path.display().to_string()));
    }

    #[test]
    fn config_error_display_without_path() {
        let err = ConfigError {
            path: None,
            message: "parse error".to_owned(),
        };
        assert_eq!(err.to_string(), "config error: parse error");
    }

    fn env(vars: &[(&str, &str)]) -> ActionsEnv {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ActionsEnv::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn actions_env_splits_repository() {
        let e = env(&[
            ("GITHUB_ACTIONS", "true"),
            ("GITHUB_REPOSITORY", "walteh/simver"),
            ("GITHUB_REPOSITORY_OWNER", "walteh"),
            ("GITHUB_REF", "refs/pull/9/merge"),
            ("GITHUB_TOKEN", "t0k"),
        ]);
        assert!(e.in_actions);
        assert_eq!(e.owner, "walteh");
        assert_eq!(e.repo, "simver");
        assert_eq!(e.git_ref, "refs/pull/9/merge");
        assert_eq!(e.token.as_deref(), Some("t0k"));
        assert!(!e.read_only);
    }

    #[test]
    fn actions_env_infers_owner_and_flags() {
        let e = env(&[
            ("GITHUB_REPOSITORY", "acme/widgets"),
            ("SIMVER_READ_ONLY", "1"),
            ("GITHUB_TOKEN", ""),
            ("GITHUB_OUTPUT", "/tmp/out"),
        ]);
        assert!(!e.in_actions);
        assert_eq!(e.owner, "acme");
        assert_eq!(e.repo, "widgets");
        assert!(e.read_only);
        assert_eq!(e.token, None);
        assert_eq!(e.output_file, Some(PathBuf::from("/tmp/out")));
    }
}
