//! Git abstraction layer for simver.
//!
//! This crate defines the [`GitRepo`] trait, the single interface through
//! which simver reads and writes version tags. Nothing else in simver imports
//! gix or shells out to git directly; it depends on `simver-git` and programs
//! against the trait.
//!
//! # Crate layout
//!
//! - [`repo`]: the [`GitRepo`] trait definition.
//! - [`types`]: value types used in trait signatures ([`GitOid`], [`RefName`],
//!   [`TagRef`]).
//! - [`error`]: the [`GitError`] enum returned by all trait methods.

pub mod error;
pub mod repo;
pub mod types;

// gix-backed reads
mod gix_repo;
mod refs_impl;
mod status_impl;

// git CLI-backed writes and transport
mod tag_impl;

pub use gix_repo::GixRepo;

pub use error::GitError;
pub use repo::GitRepo;
pub use types::{GitOid, OidParseError, RefName, RefNameError, TagRef};
