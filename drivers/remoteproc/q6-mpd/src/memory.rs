//! # Reserved Memory
//!
//! The root domain owns a physically contiguous carve-out that the Q6 runs
//! from. Dependents share the root's window; they take a copy of the root's
//! view at probe time.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Host access to the bytes of a carve-out.
///
/// Offsets passed in are always inside `0..len()`.
pub trait MemoryRegion: Send + Sync {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn write(&self, offset: usize, data: &[u8]);
    fn fill(&self, offset: usize, len: usize, value: u8);
    fn read(&self, offset: usize, buf: &mut [u8]);
}

/// A carve-out backed by host memory.
pub struct HeapRegion {
    bytes: Mutex<Vec<u8>>,
}

impl HeapRegion {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            bytes: Mutex::new(vec![0; size]),
        }
    }
}

impl MemoryRegion for HeapRegion {
    fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    fn write(&self, offset: usize, data: &[u8]) {
        self.bytes.lock()[offset..offset + data.len()].copy_from_slice(data);
    }

    fn fill(&self, offset: usize, len: usize, value: u8) {
        self.bytes.lock()[offset..offset + len].fill(value);
    }

    fn read(&self, offset: usize, buf: &mut [u8]) {
        let len = buf.len();
        buf.copy_from_slice(&self.bytes.lock()[offset..offset + len]);
    }
}

/// A `memory-region` reference from the root's node.
#[derive(Clone)]
pub struct ReservedMemory {
    pub base: u64,
    pub region: Arc<dyn MemoryRegion>,
}

impl ReservedMemory {
    pub fn new(base: u64, region: Arc<dyn MemoryRegion>) -> Self {
        Self { base, region }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.region.len()
    }
}

impl fmt::Debug for ReservedMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}+{:#x}", self.base, self.size())
    }
}

/// A domain's view of the carve-out.
#[derive(Clone)]
pub struct MemoryWindow {
    /// Physical address of the carve-out.
    pub phys_base: u64,
    /// Device address that maps to the first byte; set by the last load.
    pub reloc_base: u64,
    pub size: usize,
    region: Arc<dyn MemoryRegion>,
}

impl MemoryWindow {
    #[must_use]
    pub fn new(memory: &ReservedMemory) -> Self {
        Self {
            phys_base: memory.base,
            reloc_base: memory.base,
            size: memory.size(),
            region: Arc::clone(&memory.region),
        }
    }

    /// Window offset of the device address range `da..da + len`, if it lies
    /// inside the window.
    #[must_use]
    pub fn translate(&self, da: u64, len: usize) -> Option<usize> {
        let offset = usize::try_from(da.checked_sub(self.reloc_base)?).ok()?;
        let end = offset.checked_add(len)?;
        (end <= self.size).then_some(offset)
    }

    /// Copy `data` to window offset `offset`. Returns `false` if it does not fit.
    pub fn write(&self, offset: usize, data: &[u8]) -> bool {
        if !self.contains(offset, data.len()) {
            return false;
        }
        self.region.write(offset, data);
        true
    }

    pub fn zero(&self, offset: usize, len: usize) -> bool {
        if !self.contains(offset, len) {
            return false;
        }
        self.region.fill(offset, len, 0);
        true
    }

    /// Bytes at device address `da`.
    #[must_use]
    pub fn read(&self, da: u64, len: usize) -> Option<Vec<u8>> {
        let offset = self.translate(da, len)?;
        let mut buf = vec![0; len];
        self.region.read(offset, &mut buf);
        Some(buf)
    }

    fn contains(&self, offset: usize, len: usize) -> bool {
        offset.checked_add(len).is_some_and(|end| end <= self.size)
    }
}

impl fmt::Debug for MemoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryWindow")
            .field("phys_base", &format_args!("{:#x}", self.phys_base))
            .field("reloc_base", &format_args!("{:#x}", self.reloc_base))
            .field("size", &format_args!("{:#x}", self.size))
            .finish()
    }
}
