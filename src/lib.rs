//! simver library crate.
//!
//! Version tags are computed from the tag namespace alone. Every PR reserves
//! a version with a `vX.Y.Z-reserved` tag, each CI build stamps a
//! `vX.Y.Z-pr<N>+<build>` tag, and a merge gets the clean `vX.Y.Z`.
//!
//! The pieces, bottom-up:
//!
//! - [`version`], [`tags`]: version arithmetic and tag collections.
//! - [`derive`]: the scalars (MRLT, MRRT, MMRT, MMRBN) read off tag sets.
//! - [`calculate`]: the pure engine turning a snapshot into tags to create.
//! - [`execution`]: loading a snapshot through [`store`] and [`pr`] traits.
//! - [`reserve`], [`wait`]: the retry loop and the tag poller.
//! - [`github`], [`config`], [`export`], [`telemetry`]: the CI surface.

pub mod calculate;
pub mod config;
pub mod derive;
pub mod error;
pub mod execution;
pub mod export;
pub mod github;
pub mod pr;
pub mod reserve;
pub mod store;
pub mod tags;
pub mod telemetry;
pub mod version;
pub mod wait;

pub use calculate::{Calculation, CalculationOutput, RefProvider, Refs, new_tags};
pub use error::{SimverError, VersionError};
pub use execution::Execution;
pub use pr::{PrDetails, PullRequestProvider, PullRequestResolver, StaticResolver};
pub use store::{GitReferenceProvider, GitTagStore, TagReader, TagWriter};
pub use tags::{Tag, TagKind, Tags};
