//! Block until a commit carries a version tag.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use crate::error::SimverError;
use crate::store::TagReader;
use crate::tags::Tag;

/// Poll cadence and deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitOptions {
    /// Give up after this long.
    pub timeout: Duration,
    /// Pause between polls.
    pub interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            interval: Duration::from_secs(5),
        }
    }
}

/// Poll `reader` until `commit` carries a valid version tag and return the
/// highest one.
///
/// Each poll fetches from the remote and then lists the tags on the commit.
/// At least one poll runs even with a zero timeout.
///
/// # Errors
/// [`SimverError::WaitTimeout`] once the deadline passes; read failures are
/// returned immediately.
#[instrument(skip(reader, options), fields(timeout = ?options.timeout))]
pub fn wait_for_tag(
    reader: &dyn TagReader,
    commit: &str,
    options: &WaitOptions,
) -> Result<Tag, SimverError> {
    let started = Instant::now();
    loop {
        reader.fetch_all()?;
        let tags = reader.tags_on_commit(commit)?;
        let best = tags
            .highest_matching(|_| true)
            .and_then(|name| tags.iter().find(|t| t.name == name));
        if let Some(tag) = best {
            info!(tag = %tag.name, elapsed = ?started.elapsed(), "version tag found");
            return Ok(tag.clone());
        }

        let elapsed = started.elapsed();
        if elapsed >= options.timeout {
            return Err(SimverError::WaitTimeout {
                commit: commit.to_owned(),
                waited: elapsed,
            });
        }
        debug!(?elapsed, non_version = tags.len(), "no version tag yet");
        thread::sleep(options.interval.min(options.timeout - elapsed));
    }
}
