use anyhow::Result;
use clap::Args;
use simver::version::{self, BASE_TAG};

#[derive(Args, Debug)]
pub struct NextArgs {
    /// The highest live or reserved version.
    #[arg(default_value = BASE_TAG)]
    max: String,

    /// Bump the minor version, as for a PR that targets the root branch.
    #[arg(long)]
    minor: bool,
}

#[derive(Args, Debug)]
pub struct BumpPatchArgs {
    /// A version like v1.2.3 (suffixes are dropped).
    #[arg(value_name = "VERSION")]
    input: String,
}

pub fn next(args: &NextArgs) -> Result<()> {
    println!("{}", version::next_valid_tag(args.minor, &args.max)?);
    Ok(())
}

pub fn bump_patch(args: &BumpPatchArgs) -> Result<()> {
    println!("{}", version::bump_patch(&args.input)?);
    Ok(())
}
