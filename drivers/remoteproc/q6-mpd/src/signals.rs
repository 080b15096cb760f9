//! # Interrupt Rendezvous
//!
//! The Q6 talks back through four inbound interrupt lines and listens on two
//! outbound SMEM doorbells:
//!
//! | line        | event      | releases        |
//! |-------------|------------|-----------------|
//! | `fatal`     | `Fatal`    | aborts all waits|
//! | `ready`     | `Ready`    | start wait      |
//! | `stop-ack`  | `StopAck`  | stop wait       |
//! | `spawn-ack` | `SpawnAck` | spawn wait      |
//!
//! Interrupt handlers only [`Rendezvous::post`] an [`Event`]; every blocking
//! wait happens on the thread driving the lifecycle operation.

use crate::error::{DoorbellError, WaitError};
use crate::platform::SmemState;
use driver_sync::{Completion, WaitOutcome};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Time the remote needs to flush its crash dump after a panic handoff.
pub const PANIC_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Event {
    Fatal,
    Ready,
    StopAck,
    SpawnAck,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InboundLine {
    Fatal,
    Ready,
    StopAck,
    SpawnAck,
}

impl InboundLine {
    pub const ALL: [Self; 4] = [Self::Fatal, Self::Ready, Self::StopAck, Self::SpawnAck];

    /// Name of the line in the node's `interrupt-names`.
    #[must_use]
    pub const fn resource_name(self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::Ready => "ready",
            Self::StopAck => "stop-ack",
            Self::SpawnAck => "spawn-ack",
        }
    }

    /// Name the handler is registered under.
    #[must_use]
    pub fn irq_name(self, pd_asid: i8) -> String {
        let suffix = match self {
            Self::Fatal => "fatal",
            Self::Ready => "ready",
            Self::StopAck => "stop_ack",
            Self::SpawnAck => "spawn_ack",
        };
        format!("q6v5_wcss_userpd{pd_asid}_{suffix}")
    }

    #[must_use]
    pub const fn event(self) -> Event {
        match self {
            Self::Fatal => Event::Fatal,
            Self::Ready => Event::Ready,
            Self::StopAck => Event::StopAck,
            Self::SpawnAck => Event::SpawnAck,
        }
    }
}

/// Outbound doorbell names in the node's `qcom,smem-state-names`.
pub const STOP_DOORBELL: &str = "stop";
pub const SPAWN_DOORBELL: &str = "spawn";

/// One bit in an outbound SMEM state.
#[derive(Clone)]
pub struct Doorbell {
    name: &'static str,
    state: Arc<dyn SmemState>,
    bit: u32,
}

impl Doorbell {
    pub fn new(name: &'static str, state: Arc<dyn SmemState>, bit: u32) -> Self {
        Self { name, state, bit }
    }

    fn mask(&self) -> u32 {
        1 << self.bit
    }

    /// # Errors
    /// The SMEM state could not be updated.
    pub fn raise(&self) -> Result<(), DoorbellError> {
        self.state.update_bits(self.mask(), self.mask())
    }

    /// # Errors
    /// The SMEM state could not be updated.
    pub fn lower(&self) -> Result<(), DoorbellError> {
        self.state.update_bits(self.mask(), 0)
    }
}

impl fmt::Debug for Doorbell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.bit)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Doorbell(#[from] DoorbellError),
    #[error(transparent)]
    Wait(#[from] WaitError),
}

/// Per-domain completions and doorbells.
#[derive(Debug)]
pub struct Rendezvous {
    start_done: Completion,
    stop_done: Completion,
    spawn_done: Completion,
    running: AtomicBool,
    crashed: AtomicBool,
    stop: Option<Doorbell>,
    spawn: Option<Doorbell>,
}

impl Rendezvous {
    #[must_use]
    pub fn new(stop: Option<Doorbell>, spawn: Option<Doorbell>) -> Self {
        Self {
            start_done: Completion::new(),
            stop_done: Completion::new(),
            spawn_done: Completion::new(),
            running: AtomicBool::new(false),
            crashed: AtomicBool::new(false),
            stop,
            spawn,
        }
    }

    /// Re-arm every completion for a new start cycle.
    pub fn prepare(&self) {
        self.start_done.reinit();
        self.stop_done.reinit();
        self.spawn_done.reinit();
        self.crashed.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);
    }

    pub fn unprepare(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Deliver an event from interrupt context. Never blocks.
    pub fn post(&self, event: Event) {
        match event {
            Event::Ready => self.start_done.complete(),
            Event::StopAck => self.stop_done.complete(),
            Event::SpawnAck => self.spawn_done.complete(),
            Event::Fatal => {
                self.running.store(false, Ordering::Release);
                self.crashed.store(true, Ordering::Release);
                self.start_done.abort();
                self.stop_done.abort();
                self.spawn_done.abort();
            }
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    #[must_use]
    pub fn is_crashed(&self) -> bool {
        self.crashed.load(Ordering::Acquire)
    }

    #[must_use]
    pub const fn has_stop_doorbell(&self) -> bool {
        self.stop.is_some()
    }

    #[must_use]
    pub const fn has_spawn_doorbell(&self) -> bool {
        self.spawn.is_some()
    }

    /// # Errors
    /// [`WaitError`] if the remote did not report ready in time or crashed.
    pub fn wait_for_start(&self, timeout: Duration) -> Result<(), WaitError> {
        wait(&self.start_done, timeout)
    }

    /// Ask the remote to stop and wait for its acknowledgement.
    ///
    /// Without a stop doorbell this succeeds immediately.
    ///
    /// # Errors
    /// Doorbell failures or a failed wait.
    pub fn request_stop(&self, timeout: Duration) -> Result<(), RequestError> {
        self.running.store(false, Ordering::Release);
        match &self.stop {
            Some(doorbell) => handshake(doorbell, &self.stop_done, timeout),
            None => Ok(()),
        }
    }

    /// Ask a dependent to start executing and wait for its acknowledgement.
    ///
    /// Without a spawn doorbell this succeeds immediately.
    ///
    /// # Errors
    /// Doorbell failures or a failed wait.
    pub fn request_spawn(&self, timeout: Duration) -> Result<(), RequestError> {
        match &self.spawn {
            Some(doorbell) => handshake(doorbell, &self.spawn_done, timeout),
            None => Ok(()),
        }
    }

    /// Tell a panicking host's remote to stop, without waiting.
    ///
    /// Returns how long the caller should give the remote to dump its state.
    pub fn panic(&self) -> Option<Duration> {
        let doorbell = self.stop.as_ref()?;
        if let Err(e) = doorbell.raise() {
            log::error!("panic handoff failed: {e}");
        }
        Some(PANIC_DELAY)
    }
}

fn wait(completion: &Completion, timeout: Duration) -> Result<(), WaitError> {
    match completion.wait_timeout(timeout) {
        WaitOutcome::Completed => Ok(()),
        WaitOutcome::TimedOut => Err(WaitError::TimedOut(timeout)),
        WaitOutcome::Aborted => Err(WaitError::Crashed),
    }
}

/// Raise the doorbell, wait for the paired completion, lower the doorbell.
fn handshake(
    doorbell: &Doorbell,
    completion: &Completion,
    timeout: Duration,
) -> Result<(), RequestError> {
    doorbell.raise()?;
    let waited = wait(completion, timeout);
    let lowered = doorbell.lower();
    waited?;
    lowered?;
    Ok(())
}
