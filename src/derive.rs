//! Derived version facts.
//!
//! Each function reads one tag collection and returns a scalar. A missing
//! match is `None` (or `0` for build numbers), never an error.
//!
//! | Name  | Meaning                        | Source              |
//! |-------|--------------------------------|---------------------|
//! | MRLT  | most recent live tag           | base-branch tags    |
//! | MRRT  | most recent reserved tag       | root-branch tags    |
//! | MMRT  | my most recent tag             | head-branch tags    |
//! | MMRBN | my most recent build number    | head-branch tags    |

use crate::tags::{TagKind, Tags};
use crate::version;

/// Highest clean `vX.Y.Z` tag visible on the base branch.
#[must_use]
pub fn most_recent_live_tag(base_branch_tags: &Tags) -> Option<String> {
    base_branch_tags
        .highest_matching(|name| TagKind::of(name) == TagKind::Release)
        .and_then(version::canonical)
}

/// Highest `vX.Y.Z-reserved` tag visible on the root branch, as `vX.Y.Z`.
#[must_use]
pub fn most_recent_reserved_tag(root_branch_tags: &Tags) -> Option<String> {
    root_branch_tags
        .highest_matching(|name| TagKind::of(name) == TagKind::Reservation)
        .and_then(version::canonical)
}

/// Highest version on the head branch that is neither a reservation nor an
/// ownership claim, as `vX.Y.Z`. This is the version the PR last claimed.
#[must_use]
pub fn my_most_recent_tag(head_branch_tags: &Tags) -> Option<String> {
    head_branch_tags
        .highest_matching(|name| {
            !name.contains("-reserved")
                && !matches!(
                    TagKind::of(name),
                    TagKind::Reservation | TagKind::OwnershipClaim { .. }
                )
        })
        .and_then(version::canonical)
}

/// Highest build number among `*-pr<pr>+<n>` tags on the head branch, or 0.
#[must_use]
pub fn my_most_recent_build_number(head_branch_tags: &Tags, pr: u64) -> u64 {
    head_branch_tags
        .iter()
        .filter_map(|t| match t.kind() {
            TagKind::Build { pr: p, build } if p == pr => Some(build),
            _ => None,
        })
        .max()
        .unwrap_or(0)
}

/// Whether this commit is already versioned, making the run a no-op.
///
/// True when the head commit carries exactly the claimed version. For a
/// direct push (PR 0) any clean release tag on the head commit counts.
#[must_use]
pub fn skip(head_commit_tags: &Tags, mmrt: Option<&str>, pr: u64) -> bool {
    if mmrt.is_some_and(|m| head_commit_tags.contains_name(m)) {
        return true;
    }
    pr == 0
        && head_commit_tags
            .iter()
            .any(|t| t.kind() == TagKind::Release)
}

/// Whether the claimed version was already released on the head branch
/// itself, so the PR must move to the next patch.
#[must_use]
pub fn force_patch(head_branch_tags: &Tags, mmrt: Option<&str>) -> bool {
    mmrt.is_some_and(|m| head_branch_tags.contains_name(m))
}

/// A display-only decorated version: `<base>-pr<N>+<build>.ahead`, or
/// `-local+<build>` outside CI, with `.dirty` for an unclean working tree.
#[must_use]
pub fn last_symbolic_tag(base: &str, pr: u64, build: u64, is_local: bool, is_dirty: bool) -> String {
    let base = version::canonical(base).unwrap_or_else(|| base.to_owned());
    let scope = if is_local {
        "local".to_owned()
    } else {
        format!("pr{pr}")
    };
    let state = if is_dirty { "dirty" } else { "ahead" };
    format!("{base}-{scope}+{build}.{state}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::Tag;

    const C: &str = "cccccccccccccccccccccccccccccccccccccccc";

    fn tags(names: &[&str]) -> Tags {
        names.iter().map(|n| Tag::new(*n, C)).collect()
    }

    #[test]
    fn live_tag_ignores_prereleases() {
        let t = tags(&["v0.1.0", "v0.3.0-reserved", "v0.2.0", "v0.4.0-pr2+1", "nightly"]);
        assert_eq!(most_recent_live_tag(&t).as_deref(), Some("v0.2.0"));
        assert_eq!(most_recent_live_tag(&tags(&["v0.9.0-pr1+1"])), None);
    }

    #[test]
    fn reserved_tag_is_stripped() {
        let t = tags(&["v0.2.0-reserved", "v0.10.0-reserved", "v0.11.0"]);
        assert_eq!(most_recent_reserved_tag(&t).as_deref(), Some("v0.10.0"));
        assert_eq!(most_recent_reserved_tag(&Tags::new()), None);
    }

    #[test]
    fn my_tag_skips_reservations_and_claims() {
        let t = tags(&["v0.5.0-reserved", "v0.5.0-pr3+base", "v0.4.1-pr3+2", "v0.4.1-pr3+1"]);
        assert_eq!(my_most_recent_tag(&t).as_deref(), Some("v0.4.1"));
        assert_eq!(my_most_recent_tag(&tags(&["v0.5.0-pr3+base"])), None);
    }

    #[test]
    fn build_number_is_numeric_max_for_this_pr() {
        let t = tags(&["v0.2.0-pr1+9", "v0.2.0-pr1+10", "v0.2.0-pr2+50", "v0.2.0-pr1+base"]);
        assert_eq!(my_most_recent_build_number(&t, 1), 10);
        assert_eq!(my_most_recent_build_number(&t, 2), 50);
        assert_eq!(my_most_recent_build_number(&t, 3), 0);
    }

    #[test]
    fn skip_needs_exact_claimed_version_on_head_commit() {
        let head = tags(&["v0.2.0-pr1+3"]);
        assert!(!skip(&head, Some("v0.2.0"), 1));
        assert!(skip(&tags(&["v0.2.0"]), Some("v0.2.0"), 1));
        assert!(!skip(&tags(&["v0.2.0"]), None, 1));
    }

    #[test]
    fn skip_push_that_is_already_released() {
        assert!(skip(&tags(&["v0.3.0"]), None, 0));
        assert!(!skip(&tags(&["v0.3.0-pr1+1"]), None, 0));
    }

    #[test]
    fn force_patch_when_claim_released_on_branch() {
        assert!(force_patch(&tags(&["v0.4.1", "v0.4.1-pr3+1"]), Some("v0.4.1")));
        assert!(!force_patch(&tags(&["v0.4.1-pr3+1"]), Some("v0.4.1")));
        assert!(!force_patch(&tags(&["v0.4.1"]), None));
    }

    #[test]
    fn symbolic_tag_shapes() {
        assert_eq!(last_symbolic_tag("v0.2.0", 4, 3, false, false), "v0.2.0-pr4+3.ahead");
        assert_eq!(last_symbolic_tag("v0.2.0", 0, 0, true, true), "v0.2.0-local+0.dirty");
    }
}
