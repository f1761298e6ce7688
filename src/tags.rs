//! Tags and tag collections.
//!
//! A [`Tag`] is a name plus the commit it points at. [`Tags`] is an ordered
//! collection with version-aware filtering: any name that is not a valid
//! version tag is silently excluded from version comparisons.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version;

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// A named, immutable pointer to a commit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name without `refs/tags/`, e.g. `v1.2.3-pr4+5`.
    pub name: String,
    /// The commit the tag points at (40-char hex for real commits).
    #[serde(rename = "ref")]
    pub target: String,
}

impl Tag {
    /// Create a tag.
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
        }
    }

    /// Classify this tag's name.
    #[must_use]
    pub fn kind(&self) -> TagKind {
        TagKind::of(&self.name)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", short_ref(&self.target), self.name)
    }
}

/// Abbreviate a commit id for display: `abcd...wxyz`.
#[must_use]
pub fn short_ref(target: &str) -> String {
    if target.len() <= 11 || !target.is_ascii() {
        return target.to_owned();
    }
    format!("{}...{}", &target[..4], &target[target.len() - 4..])
}

// ---------------------------------------------------------------------------
// TagKind
// ---------------------------------------------------------------------------

/// The four tag shapes simver writes, plus everything else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagKind {
    /// `vX.Y.Z`: a released version.
    Release,
    /// `vX.Y.Z-reserved`: a global claim on a version number.
    Reservation,
    /// `vX.Y.Z-pr<N>+base`: proof that PR `N` made the reservation.
    OwnershipClaim {
        /// The pull request number.
        pr: u64,
    },
    /// `vX.Y.Z-pr<N>+<build>`: one CI build's provisional version.
    Build {
        /// The pull request number.
        pr: u64,
        /// The build number.
        build: u64,
    },
    /// Any other name, valid version or not.
    Other,
}

impl TagKind {
    /// Classify a tag name.
    #[must_use]
    pub fn of(name: &str) -> Self {
        let Some(v) = version::parse(name) else {
            return Self::Other;
        };
        let pre = v.pre.as_str();
        let build = v.build.as_str();

        match (pre, build) {
            ("", "") => Self::Release,
            ("reserved", "") => Self::Reservation,
            _ => {
                let Some(pr) = pre.strip_prefix("pr").and_then(parse_digits) else {
                    return Self::Other;
                };
                if build == "base" {
                    Self::OwnershipClaim { pr }
                } else if let Some(build) = parse_digits(build) {
                    Self::Build { pr, build }
                } else {
                    Self::Other
                }
            }
        }
    }
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// An ordered collection of tags.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<Tag>);

impl Tags {
    /// An empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of tags.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the collection has no tags.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a tag.
    pub fn push(&mut self, tag: Tag) {
        self.0.push(tag);
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.0.iter()
    }

    /// Tag names in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|t| t.name.as_str()).collect()
    }

    /// Whether a tag with exactly this name exists.
    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.0.iter().any(|t| t.name == name)
    }

    /// Names accepted by `matcher` that are valid versions, sorted ascending
    /// by version precedence.
    pub fn semvers_matching(&self, matcher: impl Fn(&str) -> bool) -> Vec<&str> {
        let mut versions: Vec<&str> = self
            .0
            .iter()
            .map(|t| t.name.as_str())
            .filter(|name| matcher(name) && version::is_valid(name))
            .collect();
        versions.sort_by(|a, b| version::compare(a, b));
        versions
    }

    /// The highest-precedence valid version accepted by `matcher`.
    pub fn highest_matching(&self, matcher: impl Fn(&str) -> bool) -> Option<&str> {
        self.semvers_matching(matcher).last().copied()
    }

    /// The first tag whose name carries a reservation marker.
    #[must_use]
    pub fn reserved(&self) -> Option<&Tag> {
        self.0.iter().find(|t| t.name.contains("-reserved"))
    }

    /// The tags whose names do not appear in `other`.
    #[must_use]
    pub fn without_names_in(&self, other: &Self) -> Self {
        let drop: HashSet<&str> = other.0.iter().map(|t| t.name.as_str()).collect();
        self.0
            .iter()
            .filter(|t| !drop.contains(t.name.as_str()))
            .cloned()
            .collect()
    }

    /// A copy sorted by version precedence (invalid names first).
    #[must_use]
    pub fn sorted(&self) -> Self {
        let mut tags = self.0.clone();
        tags.sort_by(|a, b| match version::compare(&a.name, &b.name) {
            Ordering::Equal => a.target.cmp(&b.target),
            other => other,
        });
        Self(tags)
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sorted = self.sorted();
        let mut first = true;
        for tag in sorted.iter() {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{tag}")?;
        }
        Ok(())
    }
}

impl From<Vec<Tag>> for Tags {
    fn from(tags: Vec<Tag>) -> Self {
        Self(tags)
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Tags {
    type Item = Tag;
    type IntoIter = std::vec::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
