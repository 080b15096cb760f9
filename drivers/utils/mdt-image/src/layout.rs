//! # Segment Placement
//!
//! Resolves where each loadable segment lands inside a reserved memory window.
//! Relocatable images are placed relative to their lowest segment address;
//! all others relative to the physical base of the window.

use crate::{MdtError, MdtHeader};
use alloc::vec::Vec;

/// A loadable segment resolved to a window offset.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Placement {
    /// Program header index; also the split file suffix.
    pub index: usize,
    pub window_offset: usize,
    pub filesz: usize,
    pub memsz: usize,
    pub pd_asid: u8,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Layout {
    pub relocatable: bool,
    /// Lowest physical segment address.
    pub min_addr: u64,
    /// End of the highest physical segment.
    pub max_addr: u64,
    /// Device address that maps to offset zero of the window.
    pub mem_reloc: u64,
    pub segments: Vec<Placement>,
}

impl Layout {
    /// Span covered by the loadable segments.
    #[must_use]
    pub const fn span(&self) -> u64 {
        self.max_addr.saturating_sub(self.min_addr)
    }
}

impl MdtHeader {
    /// Place every loadable segment in a window of `window_size` bytes that
    /// starts at physical address `phys_base`.
    ///
    /// # Errors
    /// - [`MdtError::SegmentSize`] if a segment has more file than memory bytes.
    /// - [`MdtError::SegmentOutOfWindow`] if a segment does not fit the window.
    pub fn layout(&self, phys_base: u64, window_size: usize) -> Result<Layout, MdtError> {
        let relocatable = self.is_relocatable();

        let mut min_addr = u64::MAX;
        let mut max_addr = 0u64;
        for (_, ph) in self.loadable() {
            min_addr = min_addr.min(u64::from(ph.paddr));
            max_addr = max_addr.max(u64::from(ph.paddr) + u64::from(ph.memsz));
        }
        if min_addr == u64::MAX {
            min_addr = phys_base;
            max_addr = phys_base;
        }

        let mem_reloc = if relocatable { min_addr } else { phys_base };

        let mut segments = Vec::new();
        for (index, ph) in self.loadable() {
            if ph.filesz > ph.memsz {
                return Err(MdtError::SegmentSize {
                    index,
                    filesz: ph.filesz,
                    memsz: ph.memsz,
                });
            }

            let start = u64::from(ph.paddr);
            let end = start + u64::from(ph.memsz);
            let out_of_window = MdtError::SegmentOutOfWindow {
                index,
                start,
                end,
                window: window_size,
            };
            let offset = start.checked_sub(mem_reloc).ok_or_else(|| out_of_window.clone())?;
            if offset + u64::from(ph.memsz) > window_size as u64 {
                return Err(out_of_window);
            }

            log::debug!(
                "segment {index}: paddr 0x{start:x} -> window offset 0x{offset:x}, filesz 0x{:x} memsz 0x{:x}",
                ph.filesz,
                ph.memsz
            );

            segments.push(Placement {
                index,
                window_offset: offset as usize,
                filesz: ph.filesz as usize,
                memsz: ph.memsz as usize,
                pd_asid: ph.flags.pd_asid(),
            });
        }

        Ok(Layout {
            relocatable,
            min_addr,
            max_addr,
            mem_reloc,
            segments,
        })
    }
}
