use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use simver::{Calculation, Execution};

#[derive(Args, Debug)]
pub struct LocalArgs {
    /// Repository path.
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Print the snapshot and calculation as JSON.
    #[arg(long)]
    json: bool,
}

/// Read-only: report derived versions for the checked-out commit.
pub fn run(args: &LocalArgs, config: Option<&Path>) -> Result<()> {
    let (store, config) = crate::open_store(&args.path, config, true)?;
    let execution = Execution::load_local(&store, &store, &config.repo.root_branch)
        .context("Failed to read local tags")?;
    let calculation = Calculation::from_execution(&execution)?;
    let output = calculation.new_tags()?;
    let tags = output.apply_refs(execution.refs());

    if args.json {
        let doc = serde_json::json!({
            "execution": execution,
            "calculation": calculation,
            "output": output,
            "tags": tags,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!(
        "most recent live:  {}",
        calculation.most_recent_live_tag.as_deref().unwrap_or("-")
    );
    println!(
        "my most recent:    {}",
        calculation.my_most_recent_tag.as_deref().unwrap_or("-")
    );
    println!("next valid:        {}", calculation.next_valid_tag);
    println!("symbolic:          {}", calculation.last_symbolic_tag);
    if tags.is_empty() {
        println!("A CI run would create no tags.");
    } else {
        println!("A CI run would create:");
        for tag in &tags {
            println!("  {tag}");
        }
    }
    Ok(())
}
