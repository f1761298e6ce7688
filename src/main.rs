use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use simver::GitTagStore;
use simver::config::SimverConfig;
use simver::telemetry::{self, LogFormat};
use simver_git::GixRepo;

mod inspect_cmd;
mod local_cmd;
mod run_cmd;
mod wait_cmd;

/// Semantic versions from git tags, safe under concurrent CI runs.
///
/// Each pull request reserves the next free version with a
/// `vX.Y.Z-reserved` tag and stamps every build with `vX.Y.Z-pr<N>+<build>`.
/// Merging the PR tags the merge commit with the clean `vX.Y.Z`.
///
/// QUICK START (GitHub Actions):
///
///   simver run --output-file "$GITHUB_OUTPUT"
///
/// LOCALLY:
///
///   simver local
#[derive(Parser)]
#[command(name = "simver")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'simver <command> --help' for more information on a specific command.")]
struct Cli {
    /// Log at debug level (when RUST_LOG is unset).
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, env = "SIMVER_LOG_FORMAT", default_value_t)]
    log_format: LogFormat,

    /// Config file (default: <repo>/.simver.toml).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reserve and tag a version for the current CI run
    ///
    /// Resolves the pull request from the GitHub Actions environment (or
    /// --pr-file), computes the tags, and pushes them. Lost races are
    /// retried against a fresh view of the tags.
    Run(run_cmd::RunArgs),

    /// Show what simver would do for the local checkout (read-only)
    Local(local_cmd::LocalArgs),

    /// Wait until a commit carries a version tag
    Wait(wait_cmd::WaitArgs),

    /// Print the next valid version after MAX
    Next(inspect_cmd::NextArgs),

    /// Print VERSION with its patch component bumped
    BumpPatch(inspect_cmd::BumpPatchArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose, cli.log_format);
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Run(ref args) => run_cmd::run(args, config),
        Commands::Local(ref args) => local_cmd::run(args, config),
        Commands::Wait(ref args) => wait_cmd::run(args, config),
        Commands::Next(ref args) => inspect_cmd::next(args),
        Commands::BumpPatch(ref args) => inspect_cmd::bump_patch(args),
    }
}

/// Open the repository containing `path` and its configuration.
///
/// An explicit `config` path wins over `<repo>/.simver.toml`.
pub(crate) fn open_repo(path: &Path, config: Option<&Path>) -> Result<(GixRepo, SimverConfig)> {
    let repo = GixRepo::open(path)
        .with_context(|| format!("Failed to open git repository at {}", path.display()))?;
    let config = match config {
        Some(file) => SimverConfig::load(file),
        None => SimverConfig::load_from_repo(repo.workdir()),
    }
    .context("Failed to load simver config")?;
    let repo = repo.with_git_executable(config.github.git_executable.clone());
    Ok((repo, config))
}

/// A tag store over the repository at `path`.
pub(crate) fn open_store(
    path: &Path,
    config: Option<&Path>,
    read_only: bool,
) -> Result<(GitTagStore<GixRepo>, SimverConfig)> {
    let (repo, config) = open_repo(path, config)?;
    let store = GitTagStore::new(repo, config.repo.remote.clone()).read_only(read_only);
    Ok((store, config))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bump_patch_takes_a_positional_version() {
        let cli = Cli::try_parse_from(["simver", "bump-patch", "v1.2"]).unwrap();
        assert!(matches!(cli.command, Commands::BumpPatch(_)));
        assert!(Cli::try_parse_from(["simver", "bump-patch", "--version"]).is_err());
    }
}
