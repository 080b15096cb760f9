//! # Driver synchronization primitives
//!
//! Building blocks shared by the PHY and remoteproc cores:
//!
//! - [`TicketMutex`]: FIFO lock serializing bus transactions per device.
//! - [`SpinLock`]: short critical sections touched from interrupt context.
//! - [`SyncOnceCell`]: one-time global initialization.
//! - [`Completion`]: a one-shot rendezvous that can be aborted.
//! - [`poll`]: bounded polling of a hardware condition.

#![allow(unsafe_code)]

mod completion;
mod mutex;
pub mod poll;
mod raw_ticket;
mod spin_lock;
mod sync_once_cell;

pub use completion::{Completion, WaitOutcome};
pub use mutex::{Mutex, MutexGuard};
pub use raw_ticket::RawTicket;
pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;

pub type TicketMutex<T> = Mutex<T, RawTicket>;

impl<T> TicketMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawTicket::new(), value)
    }
}

pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;
}

pub trait RawUnlock {
    /// # Safety
    /// The caller must currently hold the lock.
    unsafe fn raw_unlock(&self);
}
