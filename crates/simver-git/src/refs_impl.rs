//! gix-backed ref, rev-parse, and tag reachability operations.

use std::collections::HashSet;
use std::fmt::Display;

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::repo::GitRepo;
use crate::types::{GitOid, RefName, TagRef};

/// Convert a `GitOid` to a `gix::ObjectId`.
fn to_gix_oid(oid: &GitOid) -> gix::ObjectId {
    gix::ObjectId::from_bytes_or_panic(oid.as_bytes())
}

/// Convert a `gix::ObjectId` (or `&gix::oid`) to a `GitOid`.
fn from_gix_oid(oid: &gix::oid) -> GitOid {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(oid.as_bytes());
    GitOid::from_bytes(bytes)
}

fn backend(e: impl Display) -> GitError {
    GitError::BackendError {
        message: e.to_string(),
    }
}

pub fn read_ref(repo: &GixRepo, name: &RefName) -> Result<Option<GitOid>, GitError> {
    match repo.repo.try_find_reference(name.as_str()) {
        Ok(Some(mut r)) => {
            let id = r.peel_to_id_in_place().map_err(backend)?;
            Ok(Some(from_gix_oid(id.as_ref())))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(backend(e)),
    }
}

pub fn list_refs(repo: &GixRepo, prefix: &str) -> Result<Vec<(RefName, GitOid)>, GitError> {
    let platform = repo.repo.references().map_err(backend)?;
    let refs_iter = platform.prefixed(prefix).map_err(backend)?;

    let mut result = Vec::new();
    for r in refs_iter {
        let mut r = r.map_err(backend)?;
        let name_str = r.name().as_bstr().to_string();
        // Tags pointing at trees or blobs cannot be peeled to a commit; they
        // never carry a version, so skip them instead of failing the listing.
        let Ok(id) = r.peel_to_id_in_place() else {
            tracing::debug!(name = %name_str, "skipping ref that cannot be peeled");
            continue;
        };
        let oid = from_gix_oid(id.as_ref());
        if let Ok(ref_name) = RefName::new(&name_str) {
            result.push((ref_name, oid));
        }
    }
    result.sort();
    Ok(result)
}

pub fn rev_parse(repo: &GixRepo, spec: &str) -> Result<GitOid, GitError> {
    let id = repo
        .repo
        .rev_parse_single(spec)
        .map_err(|e| GitError::NotFound {
            message: format!("rev-parse '{spec}': {e}"),
        })?;
    Ok(from_gix_oid(id.as_ref()))
}

pub fn tags_reachable_from(repo: &GixRepo, tip: GitOid) -> Result<Vec<TagRef>, GitError> {
    let walk = repo
        .repo
        .rev_walk([to_gix_oid(&tip)])
        .all()
        .map_err(backend)?;

    let mut reachable = HashSet::new();
    for info in walk {
        let info = info.map_err(backend)?;
        reachable.insert(from_gix_oid(&info.id));
    }

    let tags: Vec<TagRef> = repo
        .list_tags()?
        .into_iter()
        .filter(|t| reachable.contains(&t.target))
        .collect();
    tracing::trace!(%tip, commits = reachable.len(), tags = tags.len(), "walked history for tags");
    Ok(tags)
}

pub fn current_branch(repo: &GixRepo) -> Result<Option<String>, GitError> {
    let head = repo.repo.head_name().map_err(backend)?;
    Ok(head.map(|name| name.shorten().to_string()))
}
