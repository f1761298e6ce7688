//! Version arithmetic on tag names.
//!
//! Tag names carry a leading `v` (`v1.2.3-pr4+5`). Ordering always goes
//! through semantic-version precedence via the `semver` crate, never lexical
//! string order. Arithmetic ([`bump_patch`], [`next_valid_tag`]) refuses to
//! coerce a non-numeric component and reports a [`VersionError`] instead.

use std::cmp::Ordering;

use semver::Version;

use crate::error::VersionError;

/// The floor version used when no live or reserved tag exists yet.
pub const BASE_TAG: &str = "v0.1.0";

/// Parse a tag name of the form `v<major>.<minor>.<patch>[-pre][+build]`.
#[must_use]
pub fn parse(name: &str) -> Option<Version> {
    name.strip_prefix('v')
        .and_then(|rest| Version::parse(rest).ok())
}

/// Whether `name` is a syntactically valid version tag.
#[must_use]
pub fn is_valid(name: &str) -> bool {
    parse(name).is_some()
}

/// The `vX.Y.Z` core of a version tag, dropping prerelease and build parts.
#[must_use]
pub fn canonical(name: &str) -> Option<String> {
    parse(name).map(|v| format!("v{}.{}.{}", v.major, v.minor, v.patch))
}

/// Semantic-version precedence of two tag names.
///
/// Build metadata is ignored. A release outranks any prerelease of the same
/// core version. Invalid names rank below every valid one and equal to each
/// other.
#[must_use]
pub fn precedence(a: &str, b: &str) -> Ordering {
    match (parse(a), parse(b)) {
        (Some(x), Some(y)) => {
            (x.major, x.minor, x.patch, &x.pre).cmp(&(y.major, y.minor, y.patch, &y.pre))
        }
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Total order for sorting tag names: [`precedence`], then the raw string.
#[must_use]
pub fn compare(a: &str, b: &str) -> Ordering {
    precedence(a, b).then_with(|| a.cmp(b))
}

/// The higher of the most recent live and reserved tags, or [`BASE_TAG`] when
/// both are absent.
#[must_use]
pub fn max_live_or_reserved(mrlt: Option<&str>, mrrt: Option<&str>) -> String {
    match (mrlt, mrrt) {
        (None, None) => BASE_TAG.to_owned(),
        (Some(live), None) => live.to_owned(),
        (None, Some(reserved)) => reserved.to_owned(),
        (Some(live), Some(reserved)) => {
            if precedence(reserved, live) == Ordering::Greater {
                reserved.to_owned()
            } else {
                live.to_owned()
            }
        }
    }
}

/// One version step past `max` (or past [`BASE_TAG`] when `max` is empty).
///
/// Targeting the root branch bumps the minor version and zeroes the patch;
/// anything else bumps the patch.
///
/// # Errors
/// Returns [`VersionError`] if `max` lacks a numeric minor or patch.
pub fn next_valid_tag(targeting_root: bool, max: &str) -> Result<String, VersionError> {
    let max = if max.is_empty() { BASE_TAG } else { max };
    let (major, minor, patch) = components(max, true)?;
    let (minor, patch) = if targeting_root {
        (increment(max, "minor", minor)?, 0)
    } else {
        (minor, increment(max, "patch", patch)?)
    };
    Ok(format!("v{major}.{minor}.{patch}"))
}

/// Increment only the patch of `version`, dropping any prerelease or build
/// suffix. An absent minor or patch counts as 0 (`v1.2` becomes `v1.2.1`).
///
/// # Errors
/// Returns [`VersionError`] on a non-numeric component.
pub fn bump_patch(version: &str) -> Result<String, VersionError> {
    let (major, minor, patch) = components(version, false)?;
    let patch = increment(version, "patch", patch)?;
    Ok(format!("v{major}.{minor}.{patch}"))
}

fn increment(version: &str, component: &'static str, n: u64) -> Result<u64, VersionError> {
    n.checked_add(1).ok_or_else(|| VersionError::Malformed {
        version: version.to_owned(),
        reason: format!("{component} overflows"),
    })
}

/// Split `v<major>[.<minor>[.<patch>]][-pre][+build]` into integers.
fn components(version: &str, require_patch: bool) -> Result<(u64, u64, u64), VersionError> {
    let malformed = |reason: &str| VersionError::Malformed {
        version: version.to_owned(),
        reason: reason.to_owned(),
    };

    let body = version
        .strip_prefix('v')
        .ok_or_else(|| malformed("missing leading `v`"))?;
    let core = body.split(['-', '+']).next().unwrap_or_default();
    let mut parts = core.split('.');

    let major = numeric(version, "major", parts.next().unwrap_or_default())?;
    let mut optional = |component: &'static str| match parts.next() {
        Some(value) => numeric(version, component, value),
        None if require_patch => Err(malformed(&format!("missing {component}"))),
        None => Ok(0),
    };
    let minor = optional("minor")?;
    let patch = optional("patch")?;

    if parts.next().is_some() {
        return Err(malformed("more than three components"));
    }
    Ok((major, minor, patch))
}

fn numeric(version: &str, component: &'static str, value: &str) -> Result<u64, VersionError> {
    let non_numeric = || VersionError::NonNumeric {
        version: version.to_owned(),
        component,
        value: value.to_owned(),
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(non_numeric());
    }
    value.parse().map_err(|_| non_numeric())
}
