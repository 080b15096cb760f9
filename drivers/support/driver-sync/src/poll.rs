//! # Bounded polling
//!
//! Sleep-and-recheck loops with a hard deadline, shared by register waits
//! (reset complete, operation in progress, mailbox busy).

use std::convert::Infallible;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PollConfig {
    /// Sleep before the first check.
    pub initial_delay: Duration,
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            interval,
            timeout,
        }
    }

    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("condition not met within {timeout:?} after {attempts} checks")]
pub struct PollTimeout {
    pub timeout: Duration,
    pub attempts: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    #[error(transparent)]
    Timeout(#[from] PollTimeout),
    #[error("condition check failed")]
    Check(#[source] E),
}

/// Re-check `condition` every `config.interval` until it holds.
///
/// Returns the number of checks it took.
///
/// # Errors
/// [`PollTimeout`] once `config.timeout` has elapsed without success.
pub fn poll_until(
    config: &PollConfig,
    mut condition: impl FnMut() -> bool,
) -> Result<u32, PollTimeout> {
    try_poll_until::<Infallible>(config, || Ok(condition())).map_err(|e| match e {
        PollError::Timeout(t) => t,
        PollError::Check(never) => match never {},
    })
}

/// Like [`poll_until`] for fallible checks; a failing check ends the poll.
///
/// # Errors
/// - [`PollError::Check`] as soon as `condition` fails.
/// - [`PollError::Timeout`] once `config.timeout` has elapsed.
pub fn try_poll_until<E>(
    config: &PollConfig,
    mut condition: impl FnMut() -> Result<bool, E>,
) -> Result<u32, PollError<E>> {
    if !config.initial_delay.is_zero() {
        thread::sleep(config.initial_delay);
    }

    let start = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        if condition().map_err(PollError::Check)? {
            return Ok(attempts);
        }
        if start.elapsed() >= config.timeout {
            log::debug!("poll gave up after {attempts} checks");
            return Err(PollTimeout {
                timeout: config.timeout,
                attempts,
            }
            .into());
        }
        thread::sleep(config.interval);
    }
}
