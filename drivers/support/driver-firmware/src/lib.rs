//! # Firmware acquisition
//!
//! Drivers ask for firmware by name. Where the bytes come from is decided by
//! the platform: a firmware directory on disk, an in-memory table (tests,
//! initramfs-style bundles), or an NVMEM cell holding a board-specific blob.
//! [`FirmwareChain`] tries a list of such sources in order and reports every
//! one it tried when all of them fail.

mod chain;
mod directory;
mod memory;

pub use chain::{Attempt, Firmware, FirmwareChain, FirmwareSource, FirmwareUnavailable};
pub use directory::DirectoryStore;
pub use memory::{MemoryCell, MemoryStore};

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{name}: not found")]
    NotFound { name: String },
    #[error("{name}: rejected firmware name")]
    InvalidName { name: String },
    #[error("{name}: I/O error")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("{name}: short read ({read} of {expected} bytes)")]
    ShortRead {
        name: String,
        read: usize,
        expected: usize,
    },
}

impl FetchError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Named firmware files.
pub trait FirmwareStore: Send + Sync {
    /// Human-readable location, e.g. `directory /lib/firmware`.
    fn describe(&self) -> String;

    /// Fetch the complete contents of `name`.
    ///
    /// # Errors
    /// [`FetchError::NotFound`] if the store has no such file, other variants
    /// for access failures.
    fn request(&self, name: &str) -> Result<Vec<u8>, FetchError>;
}

/// A non-volatile memory cell holding a firmware blob.
pub trait NvmemCell: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    /// Any failure reading the cell.
    fn read(&self) -> Result<Vec<u8>, FetchError>;
}
