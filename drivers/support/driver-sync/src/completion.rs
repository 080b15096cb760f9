use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// How a [`Completion::wait_timeout`] ended.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WaitOutcome {
    Completed,
    TimedOut,
    /// The completion was aborted (e.g. the remote side crashed).
    Aborted,
}

#[derive(Debug, Default)]
struct State {
    done: bool,
    aborted: bool,
}

/// One-shot rendezvous between a requester and an interrupt handler.
///
/// `complete` releases at most one pending (or the next) wait and never
/// blocks beyond a short internal lock. `abort` releases every waiter until
/// the completion is re-armed with `reinit`.
#[derive(Debug, Default)]
pub struct Completion {
    state: Mutex<State>,
    cond: Condvar,
}

impl Completion {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                done: false,
                aborted: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Re-arm for the next request cycle.
    pub fn reinit(&self) {
        let mut state = self.state.lock();
        state.done = false;
        state.aborted = false;
    }

    pub fn complete(&self) {
        self.state.lock().done = true;
        self.cond.notify_one();
    }

    pub fn abort(&self) {
        self.state.lock().aborted = true;
        self.cond.notify_all();
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state.lock().done
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }

    /// Block until completed, aborted, or `timeout` elapsed.
    ///
    /// A successful wait consumes the completion.
    pub fn wait_timeout(&self, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        loop {
            if state.aborted {
                return WaitOutcome::Aborted;
            }
            if state.done {
                state.done = false;
                return WaitOutcome::Completed;
            }
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut state, deadline).timed_out() {
                        return if state.aborted {
                            WaitOutcome::Aborted
                        } else if std::mem::take(&mut state.done) {
                            WaitOutcome::Completed
                        } else {
                            WaitOutcome::TimedOut
                        };
                    }
                }
                None => self.cond.wait(&mut state),
            }
        }
    }
}
