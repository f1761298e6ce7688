//! Tag writes and tag transport via the `git` executable.
//!
//! gix can write refs, but the push path has to go through git anyway so the
//! user's credentials and transport config apply. Local tag creation uses the
//! same binary so both halves see identical ref semantics.

use std::process::{Command, Output};

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::{GitOid, TAG_PREFIX};

fn run_git(repo: &GixRepo, args: &[&str]) -> Result<Output, GitError> {
    tracing::trace!(git = %repo.git_executable, ?args, "running git");
    Ok(Command::new(&repo.git_executable)
        .args(args)
        .current_dir(&repo.workdir)
        .output()?)
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_owned()
}

fn command_failed(args: &[&str], output: &Output) -> GitError {
    GitError::CommandFailed {
        command: args.join(" "),
        stderr: stderr_of(output),
    }
}

/// Identity used for annotated tags when git has none configured (common on
/// fresh CI runners).
const FALLBACK_IDENTITY: [&str; 4] = [
    "-c",
    "user.name=simver",
    "-c",
    "user.email=simver@users.noreply.github.com",
];

fn has_identity(repo: &GixRepo) -> Result<bool, GitError> {
    Ok(run_git(repo, &["var", "GIT_COMMITTER_IDENT"])?
        .status
        .success())
}

pub fn create_tag(
    repo: &GixRepo,
    name: &str,
    target: GitOid,
    message: Option<&str>,
) -> Result<(), GitError> {
    let target = target.to_string();
    let mut args: Vec<&str> = Vec::with_capacity(10);
    if let Some(message) = message {
        if !has_identity(repo)? {
            args.extend(FALLBACK_IDENTITY);
        }
        args.extend(["tag", "-a", "-m", message]);
    } else {
        args.push("tag");
    }
    args.extend([name, target.as_str()]);

    let output = run_git(repo, &args)?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = stderr_of(&output);
    if stderr.contains("already exists") {
        return Err(GitError::RefConflict {
            ref_name: format!("{TAG_PREFIX}{name}"),
            message: stderr,
        });
    }
    Err(command_failed(&args, &output))
}

pub fn delete_tag(repo: &GixRepo, name: &str) -> Result<(), GitError> {
    let args = ["tag", "-d", name];
    let output = run_git(repo, &args)?;
    if output.status.success() || stderr_of(&output).contains("not found") {
        return Ok(());
    }
    Err(command_failed(&args, &output))
}

pub fn fetch_tags(repo: &GixRepo, remote: &str) -> Result<(), GitError> {
    let args = ["fetch", "--tags", "--force", "--quiet", remote];
    let output = run_git(repo, &args)?;
    if output.status.success() {
        Ok(())
    } else {
        Err(command_failed(&args, &output))
    }
}

pub fn push_tags(repo: &GixRepo, remote: &str, names: &[String]) -> Result<(), GitError> {
    if names.is_empty() {
        return Ok(());
    }

    let refspecs: Vec<String> = names.iter().map(|n| format!("{TAG_PREFIX}{n}")).collect();
    let mut args = vec!["push", "--atomic", "--porcelain", remote];
    args.extend(refspecs.iter().map(String::as_str));

    let output = run_git(repo, &args)?;
    if output.status.success() {
        return Ok(());
    }

    // --porcelain puts per-ref status on stdout; the human summary goes to
    // stderr. Look at both for the "name taken" signal.
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = stderr_of(&output);
    if let Some(ref_name) = rejected_ref(&stdout, &stderr, &refspecs) {
        return Err(GitError::RefConflict {
            ref_name,
            message: stderr,
        });
    }
    Err(GitError::PushFailed {
        remote: remote.to_owned(),
        message: if stderr.is_empty() {
            stdout.trim().to_owned()
        } else {
            stderr
        },
    })
}

/// Find the ref the remote refused because the name already exists.
///
/// An atomic push marks the colliding ref `[rejected] (already exists)` and
/// every other ref `atomic push failed`, so the first "already exists" line
/// names the culprit. Names are compared whole: `v0.2.0` must not claim a
/// line about `v0.2.0-reserved`.
fn rejected_ref(stdout: &str, stderr: &str, refspecs: &[String]) -> Option<String> {
    let mut conflicts = stdout
        .lines()
        .chain(stderr.lines())
        .filter(|line| line.contains("already exists"))
        .peekable();
    conflicts.peek()?;

    conflicts
        .filter_map(pushed_ref_name)
        .find_map(|name| {
            refspecs
                .iter()
                .find(|r| r.as_str() == name || r.strip_prefix(TAG_PREFIX) == Some(name))
                .cloned()
        })
        .or_else(|| refspecs.first().cloned())
}

/// The destination ref of one push status line.
///
/// Porcelain: `!\t<src>:<dst>\t[rejected] (already exists)`.
/// Human: ` ! [rejected]  <src> -> <dst> (already exists)`.
fn pushed_ref_name(line: &str) -> Option<&str> {
    if let Some(spec) = line.split('\t').nth(1) {
        return spec.rsplit(':').next();
    }
    let mut words = line.split_whitespace();
    words.find(|w| *w == "->")?;
    words.next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| format!("{TAG_PREFIX}{n}")).collect()
    }

    #[test]
    fn rejected_ref_names_the_colliding_tag() {
        let stdout = "To /tmp/origin.git\n\
            !\trefs/tags/v0.2.0-reserved:refs/tags/v0.2.0-reserved\t[rejected] (already exists)\n\
            !\trefs/tags/v0.2.0-pr1+base:refs/tags/v0.2.0-pr1+base\t[remote failure] (atomic push failed)\n\
            Done";
        let refspecs = specs(&["v0.2.0-pr1+base", "v0.2.0-reserved"]);
        assert_eq!(
            rejected_ref(stdout, "", &refspecs).as_deref(),
            Some("refs/tags/v0.2.0-reserved")
        );
    }

    #[test]
    fn rejected_ref_matches_whole_names() {
        let stdout = "To /tmp/origin.git\n\
            !\trefs/tags/v0.2.0-pr1+10:refs/tags/v0.2.0-pr1+10\t[rejected] (already exists)\n\
            Done";
        let refspecs = specs(&["v0.2.0-pr1+1", "v0.2.0-pr1+10"]);
        assert_eq!(
            rejected_ref(stdout, "", &refspecs).as_deref(),
            Some("refs/tags/v0.2.0-pr1+10")
        );

        let stdout = "!\trefs/tags/v0.2.0-reserved:refs/tags/v0.2.0-reserved\t[rejected] (already exists)";
        let refspecs = specs(&["v0.2.0", "v0.2.0-reserved"]);
        assert_eq!(
            rejected_ref(stdout, "", &refspecs).as_deref(),
            Some("refs/tags/v0.2.0-reserved")
        );
    }

    #[test]
    fn rejected_ref_reads_human_output() {
        let stderr = " ! [rejected]        v0.2.0-reserved -> v0.2.0-reserved (already exists)";
        let refspecs = specs(&["v0.2.0", "v0.2.0-reserved"]);
        assert_eq!(
            rejected_ref("", stderr, &refspecs).as_deref(),
            Some("refs/tags/v0.2.0-reserved")
        );
    }

    #[test]
    fn rejected_ref_ignores_unrelated_failures() {
        let refspecs = specs(&["v0.2.0"]);
        assert_eq!(
            rejected_ref("", "fatal: unable to access remote: 403", &refspecs),
            None
        );
    }

    #[test]
    fn rejected_ref_falls_back_to_first_ref() {
        let refspecs = specs(&["v0.2.0", "v0.2.0-reserved"]);
        assert_eq!(
            rejected_ref("", "error: tag already exists in the remote", &refspecs).as_deref(),
            Some("refs/tags/v0.2.0")
        );
    }
}
