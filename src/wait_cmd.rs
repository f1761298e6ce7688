use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use simver::GitReferenceProvider;
use simver::wait::wait_for_tag;

#[derive(Args, Debug)]
pub struct WaitArgs {
    /// Repository path.
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// The commit to watch.
    #[arg(long, default_value = "HEAD")]
    commit: String,

    /// Give up after this many seconds (default: wait.timeout_secs).
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Seconds between polls (default: wait.interval_secs).
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,
}

/// Poll until the commit carries a version tag, then print it.
pub fn run(args: &WaitArgs, config: Option<&Path>) -> Result<()> {
    let (store, config) = crate::open_store(&args.path, config, true)?;
    let mut options = config.wait.options();
    if let Some(secs) = args.timeout {
        options.timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = args.interval {
        options.interval = Duration::from_secs(secs);
    }

    let commit = store
        .resolve(&args.commit)
        .with_context(|| format!("Failed to resolve {}", args.commit))?;
    let tag = wait_for_tag(&store, &commit, &options)?;
    println!("{}", tag.name);
    Ok(())
}
