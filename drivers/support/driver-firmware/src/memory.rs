use crate::{FetchError, FirmwareStore, NvmemCell};
use driver_sync::SpinLock;
use std::collections::BTreeMap;

/// In-memory firmware table. Also records every request it served.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: SpinLock<BTreeMap<String, Vec<u8>>>,
    requests: SpinLock<Vec<String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, data);
        self
    }

    pub fn insert(&self, name: &str, data: impl Into<Vec<u8>>) {
        self.files.with_lock(|f| f.insert(name.to_string(), data.into()));
    }

    pub fn remove(&self, name: &str) -> Option<Vec<u8>> {
        self.files.with_lock(|f| f.remove(name))
    }

    /// Names requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.with_lock(|r| r.clone())
    }
}

impl FirmwareStore for MemoryStore {
    fn describe(&self) -> String {
        String::from("built-in firmware")
    }

    fn request(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        self.requests.with_lock(|r| r.push(name.to_string()));
        self.files
            .with_lock(|f| f.get(name).cloned())
            .ok_or_else(|| FetchError::NotFound {
                name: name.to_string(),
            })
    }
}

/// An NVMEM cell backed by a byte buffer; empty cells read as not found.
#[derive(Debug, Clone)]
pub struct MemoryCell {
    name: String,
    data: Vec<u8>,
}

impl MemoryCell {
    pub fn new(name: &str, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            data: data.into(),
        }
    }
}

impl NvmemCell for MemoryCell {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<Vec<u8>, FetchError> {
        if self.data.is_empty() {
            return Err(FetchError::NotFound {
                name: self.name.clone(),
            });
        }
        Ok(self.data.clone())
    }
}
