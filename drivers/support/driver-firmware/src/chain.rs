use crate::{FetchError, FirmwareStore, NvmemCell};
use std::fmt;

/// One place a firmware blob may come from.
pub enum FirmwareSource<'a> {
    Nvmem(&'a dyn NvmemCell),
    File {
        store: &'a dyn FirmwareStore,
        name: &'a str,
    },
}

impl fmt::Display for FirmwareSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nvmem(cell) => write!(f, "nvmem cell '{}'", cell.name()),
            Self::File { store, name } => write!(f, "file '{name}' from {}", store.describe()),
        }
    }
}

impl FirmwareSource<'_> {
    fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        match self {
            Self::Nvmem(cell) => cell.read(),
            Self::File { store, name } => store.request(name),
        }
    }
}

/// A blob together with where it came from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Firmware {
    pub source: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Attempt {
    pub source: String,
    pub reason: String,
}

fn describe(tried: &[Attempt]) -> String {
    if tried.is_empty() {
        return String::from("no sources configured");
    }
    tried
        .iter()
        .map(|a| format!("{} ({})", a.source, a.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("firmware unavailable: {}", describe(.tried))]
pub struct FirmwareUnavailable {
    pub tried: Vec<Attempt>,
}

/// Ordered fallback list of firmware sources.
#[derive(Default)]
pub struct FirmwareChain<'a> {
    sources: Vec<FirmwareSource<'a>>,
}

impl<'a> FirmwareChain<'a> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    #[must_use]
    pub fn nvmem(mut self, cell: &'a dyn NvmemCell) -> Self {
        self.sources.push(FirmwareSource::Nvmem(cell));
        self
    }

    #[must_use]
    pub fn file(mut self, store: &'a dyn FirmwareStore, name: &'a str) -> Self {
        self.sources.push(FirmwareSource::File { store, name });
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Return the first blob any source yields.
    ///
    /// # Errors
    /// [`FirmwareUnavailable`] listing every source and why it failed.
    pub fn fetch(&self) -> Result<Firmware, FirmwareUnavailable> {
        let mut tried = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.fetch() {
                Ok(data) => {
                    log::debug!("firmware from {source}: {} bytes", data.len());
                    return Ok(Firmware {
                        source: source.to_string(),
                        data,
                    });
                }
                Err(e) => {
                    log::debug!("firmware from {source} failed: {e}");
                    tried.push(Attempt {
                        source: source.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Err(FirmwareUnavailable { tried })
    }
}
