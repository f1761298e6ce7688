use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use simver::config::ActionsEnv;
use simver::export;
use simver::github::{ActionsResolver, GhCli};
use simver::reserve::{self, ReserveOptions};
use simver::{
    Calculation, Execution, PullRequestResolver, SimverError, StaticResolver, TagKind, Tags, version,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Repository path (default: $GITHUB_WORKSPACE, then the current directory).
    #[arg(long)]
    path: Option<PathBuf>,

    /// Compute and log tags but never create or push them.
    ///
    /// Also enabled by SIMVER_READ_ONLY=true.
    #[arg(long)]
    read_only: bool,

    /// Abandon this PR's claimed version and reserve its next patch.
    #[arg(long)]
    force_patch: bool,

    /// Read the pull request from a JSON file instead of GitHub.
    ///
    /// Field names match the `PrDetails` struct (number, head_branch,
    /// base_branch, root_branch, merged, head_commit, ...).
    #[arg(long, value_name = "FILE")]
    pr_file: Option<PathBuf>,

    /// Append `tag=` and `version=` lines here (default: $GITHUB_OUTPUT).
    #[arg(long, value_name = "FILE")]
    output_file: Option<PathBuf>,

    /// Print the tags that would be created and exit.
    #[arg(long)]
    dry_run: bool,

    /// Print the loaded tag snapshot as JSON before calculating.
    #[arg(long)]
    dump_snapshot: bool,
}

/// Load, calculate, reserve, export.
pub fn run(args: &RunArgs, config: Option<&Path>) -> Result<()> {
    let env = ActionsEnv::from_env();
    let path = args
        .path
        .clone()
        .or_else(|| env.workspace.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let read_only = args.read_only || env.read_only || args.dry_run;
    let (store, config) = crate::open_store(&path, config, read_only)?;

    let static_resolver = args
        .pr_file
        .as_deref()
        .map(StaticResolver::from_file)
        .transpose()
        .context("Failed to read --pr-file")?;
    if static_resolver.is_none() && !env.in_actions {
        bail!(
            "Not running in GitHub Actions.\n  \
             Pass --pr-file <FILE> to describe the pull request, or use `simver local`."
        );
    }

    let gh = GhCli::new(
        config.github.gh_executable.clone(),
        store.repo().workdir(),
        env.owner.clone(),
        env.repo.clone(),
        config.repo.root_branch.clone(),
    )
    .with_token(env.token.clone());
    let actions = ActionsResolver::new(&env, &gh, &store, config.repo.root_branch.clone());
    let resolver: &dyn PullRequestResolver = match &static_resolver {
        Some(r) => r,
        None => &actions,
    };

    let load = || -> Result<Execution, SimverError> {
        let execution = Execution::load(&store, resolver)?;
        if args.dump_snapshot {
            println!("{}", execution.to_json()?);
        }
        Ok(execution)
    };

    if args.dry_run {
        let execution = load().context("Failed to load tags")?;
        let mut calculation = Calculation::from_execution(&execution)?;
        calculation.force_patch |= args.force_patch && !execution.is_merge;
        let output = calculation.new_tags()?;
        let tags = output.apply_refs(execution.refs());
        print_plan(&calculation, &tags);
        return Ok(());
    }

    let options = ReserveOptions {
        policy: config.reserve.policy(),
        force_patch: args.force_patch,
    };
    let reservation = reserve::reserve(load, &store, &options).context("Failed to reserve a version")?;

    let tag = if reservation.skipped() {
        existing_tag(&reservation.execution.head_commit_tags)
    } else {
        reservation.output.published_tag().map(str::to_owned)
    };

    if reservation.skipped() {
        println!("Commit already versioned; nothing to do.");
    } else {
        println!("Created tags:");
        for t in &reservation.tags {
            println!("  {t}");
        }
        if reservation.attempts > 1 {
            println!("  (after {} attempts)", reservation.attempts);
        }
        if let Some(claim) = reservation.tags.reserved() {
            let reserved = version::canonical(&claim.name).unwrap_or_else(|| claim.name.clone());
            println!("Reserved {reserved} for PR #{}", reservation.execution.pr);
        }
    }

    let Some(tag) = tag else {
        return Ok(());
    };
    let clean = version::canonical(&tag).unwrap_or_else(|| tag.clone());
    println!("tag={tag}");
    println!("version={clean}");

    if let Some(out) = args.output_file.as_ref().or(env.output_file.as_ref()) {
        export::write_outputs(out, &[("tag", tag.as_str()), ("version", clean.as_str())])
            .with_context(|| format!("Failed to write outputs to {}", out.display()))?;
    }
    Ok(())
}

/// The version a skipped commit already carries: its highest release tag,
/// else its highest version tag of any shape.
fn existing_tag(head_commit_tags: &Tags) -> Option<String> {
    head_commit_tags
        .highest_matching(|n| TagKind::of(n) == TagKind::Release)
        .or_else(|| head_commit_tags.highest_matching(|_| true))
        .map(str::to_owned)
}

fn print_plan(calculation: &Calculation, tags: &Tags) {
    println!("pr:                {}", calculation.pr);
    println!("merge:             {}", calculation.is_merge);
    println!(
        "most recent live:  {}",
        calculation.most_recent_live_tag.as_deref().unwrap_or("-")
    );
    println!(
        "my most recent:    {}",
        calculation.my_most_recent_tag.as_deref().unwrap_or("-")
    );
    println!("my last build:     {}", calculation.my_most_recent_build);
    println!("next valid:        {}", calculation.next_valid_tag);
    if calculation.skip {
        println!("skip:              true");
    }
    if tags.is_empty() {
        println!("Would create no tags.");
        return;
    }
    println!("Would create:");
    for tag in tags {
        println!("  {tag}");
    }
}
