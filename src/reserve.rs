//! Optimistic version reservation.
//!
//! The `-reserved` root tag is a compare-and-swap cell: the first run whose
//! push lands owns the version. A run that loses throws its snapshot away,
//! loads a fresh one, and recomputes. The loop is bounded; a fresh
//! [`Execution`] is built on every attempt and never patched.

use std::thread;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::calculate::{Calculation, CalculationOutput};
use crate::error::SimverError;
use crate::execution::Execution;
use crate::store::TagWriter;
use crate::tags::Tags;

/// How many times to retry a lost race, and how long to wait in between.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total load/calculate/write cycles, including the first.
    pub max_attempts: u32,
    /// Pause before reloading after a conflict.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Knobs for [`reserve`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ReserveOptions {
    /// Retry bounds.
    pub policy: RetryPolicy,
    /// Force a patch bump of the claimed version on non-merge runs.
    pub force_patch: bool,
}

/// The outcome of a successful reservation.
#[derive(Clone, Debug)]
pub struct Reservation {
    /// The snapshot the winning attempt was computed from.
    pub execution: Execution,
    /// Derived scalars of the winning attempt.
    pub calculation: Calculation,
    /// Tag names per scope.
    pub output: CalculationOutput,
    /// The tags that were written, bound to commits.
    pub tags: Tags,
    /// How many attempts it took (1 means no contention).
    pub attempts: u32,
}

impl Reservation {
    /// Whether the run was a no-op because the commit is already versioned.
    #[must_use]
    pub const fn skipped(&self) -> bool {
        self.calculation.skip
    }
}

/// Load, calculate and write until the write sticks.
///
/// `load` is called once per attempt and must return a fresh snapshot.
///
/// # Errors
/// - [`SimverError::ReservationExhausted`] when every attempt lost a race.
/// - [`SimverError::Version`] on a malformed version; never retried.
/// - Any load or transport failure, unchanged.
#[instrument(skip_all, fields(max_attempts = options.policy.max_attempts))]
pub fn reserve<F>(
    mut load: F,
    writer: &dyn TagWriter,
    options: &ReserveOptions,
) -> Result<Reservation, SimverError>
where
    F: FnMut() -> Result<Execution, SimverError>,
{
    let max_attempts = options.policy.max_attempts.max(1);
    let mut last_conflict = String::new();

    for attempt in 1..=max_attempts {
        let execution = load()?;
        let mut calculation = Calculation::from_execution(&execution)?;
        if options.force_patch && !execution.is_merge {
            calculation.force_patch = true;
        }
        let output = calculation.new_tags()?;
        let tags = output.apply_refs(execution.refs());

        match writer.create_tags(&tags) {
            Ok(()) => {
                info!(attempt, tags = %tags, "reservation complete");
                return Ok(Reservation {
                    execution,
                    calculation,
                    output,
                    tags,
                    attempts: attempt,
                });
            }
            Err(e) if e.is_contention() => {
                last_conflict = conflict_name(&e);
                warn!(attempt, max_attempts, conflict = %last_conflict, "lost reservation race, retrying");
                if attempt < max_attempts {
                    thread::sleep(options.policy.delay);
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(SimverError::ReservationExhausted {
        attempts: max_attempts,
        last_conflict,
    })
}

fn conflict_name(err: &SimverError) -> String {
    match err {
        SimverError::TagExists { name } => name.clone(),
        SimverError::Git(simver_git::GitError::RefConflict { ref_name, .. }) => ref_name.clone(),
        other => other.to_string(),
    }
}
