//! Bounded condition-wait primitives.
//!
//! Integration tests against a real cloud spend most of their time waiting
//! for eventual consistency: an instance becomes ACTIVE, an agent comes back
//! alive, a volume disappears from listings. This library keeps the
//! retry/timeout/logging logic for all of those waits in exactly one place:
//!
//! - **Predicate**: an async check returning "ready with a payload" or
//!   "not ready yet", re-evaluated from scratch on every poll.
//! - **Tolerated errors**: a narrow, caller-supplied allow-list of error
//!   kinds that mean "not ready yet" instead of "broken".
//! - **Timeout**: a wall-clock budget; exhausting it is a distinct error
//!   carrying the human-readable label of what was awaited.
//!
//! # Invariants
//!
//! - A wait never swallows a failed outcome: it returns the predicate's own
//!   ready value, or fails with a timeout or the predicate's error.
//! - A predicate that is ready on the first poll returns without sleeping.
//! - The deadline is checked after each poll, so a slow remote call can
//!   overshoot the nominal timeout by up to one call duration.
//! - Fixed-interval polling; no retry-count cap, no backoff, no jitter.
//!   The final interval is clamped so the waiter never sleeps past its
//!   own deadline.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

/// Default delay between polls.
pub const DEFAULT_SLEEP: Duration = Duration::from_secs(1);

/// Configuration for a single wait call.
///
/// Constructed per call, used once, and discarded; no state persists
/// across waits.
#[derive(Debug, Clone)]
pub struct WaitSpec {
    /// Total wall-clock budget for the wait.
    pub timeout: Duration,

    /// Delay between polls. Zero is legal (busy-poll) but discouraged.
    pub sleep: Duration,

    /// Human-readable label of the awaited condition, used in the timeout
    /// error and progress logs.
    pub waiting_for: String,

    /// Whether to emit periodic progress events while polling.
    pub log: bool,
}

impl WaitSpec {
    /// Create a spec with the default poll interval.
    pub fn new(waiting_for: impl Into<String>, timeout: Duration) -> Self {
        Self {
            timeout,
            sleep: DEFAULT_SLEEP,
            waiting_for: waiting_for.into(),
            log: true,
        }
    }

    /// Override the delay between polls.
    pub fn with_sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    /// Suppress progress logging for this wait.
    pub fn quiet(mut self) -> Self {
        self.log = false;
        self
    }
}

/// Outcome of an exhausted or aborted wait.
#[derive(Debug, Error)]
pub enum WaitError<E: std::error::Error> {
    /// The time budget ran out while the condition stayed unmet.
    #[error("timed out after {elapsed:?} waiting for {waiting_for}")]
    Timeout {
        waiting_for: String,
        elapsed: Duration,
    },

    /// The predicate failed with an error outside the tolerated set.
    #[error(transparent)]
    Fatal(E),
}

impl<E: std::error::Error> WaitError<E> {
    /// Returns true if the wait ended by exhausting its time budget.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Poll `poll` until it yields a value, treating every error as fatal.
///
/// The ready value is returned unchanged: predicates that produce a useful
/// payload (a list of ready nodes, a refreshed record) hand it straight to
/// the caller.
pub async fn wait_until<T, E, F, Fut>(spec: &WaitSpec, poll: F) -> Result<T, WaitError<E>>
where
    E: std::error::Error,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    wait_until_tolerating(spec, |_| false, poll).await
}

/// Poll `poll` until it yields a value, a non-tolerated error occurs, or the
/// time budget runs out.
///
/// `tolerate` is the expected-error allow-list: an error it matches means
/// "not ready yet" (e.g. listing agents for a network that is still being
/// provisioned) and polling continues. Any other error aborts the wait
/// immediately without consuming the remaining budget. Keep the closure
/// narrow; a catch-all here masks real failures.
pub async fn wait_until_tolerating<T, E, F, Fut>(
    spec: &WaitSpec,
    tolerate: impl Fn(&E) -> bool,
    mut poll: F,
) -> Result<T, WaitError<E>>
where
    E: std::error::Error,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let mut polls = 0u32;

    loop {
        polls += 1;
        match poll().await {
            Ok(Some(value)) => {
                if spec.log {
                    debug!(
                        waiting_for = %spec.waiting_for,
                        polls,
                        elapsed = ?started.elapsed(),
                        "condition met"
                    );
                }
                return Ok(value);
            }
            Ok(None) => {}
            Err(err) if tolerate(&err) => {
                if spec.log {
                    debug!(
                        waiting_for = %spec.waiting_for,
                        error = %err,
                        "tolerated error while polling"
                    );
                }
            }
            Err(err) => return Err(WaitError::Fatal(err)),
        }

        let elapsed = started.elapsed();
        if elapsed >= spec.timeout {
            return Err(WaitError::Timeout {
                waiting_for: spec.waiting_for.clone(),
                elapsed,
            });
        }

        if spec.log {
            debug!(
                waiting_for = %spec.waiting_for,
                polls,
                elapsed = ?elapsed,
                "condition not met yet"
            );
        }
        // Never sleep past the deadline; the last interval is clamped to
        // whatever budget remains.
        let remaining = spec.timeout - elapsed;
        tokio::time::sleep(spec.sleep.min(remaining)).await;
    }
}

/// Boolean-predicate convenience over [`wait_until`].
pub async fn wait_true<E, F, Fut>(spec: &WaitSpec, mut poll: F) -> Result<(), WaitError<E>>
where
    E: std::error::Error,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    wait_until(spec, || {
        let check = poll();
        async move { Ok(check.await?.then_some(())) }
    })
    .await
}
