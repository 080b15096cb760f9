//! # MDT Loader
//!
//! Places a PIL image into a domain's memory window:
//!
//! - [`MdtLoader::load`] hands the metadata to the secure loader, sets up
//!   relocation, then copies every loadable segment.
//! - [`MdtLoader::load_no_init`] copies segments of an additional image
//!   without touching the secure loader.
//! - [`MdtLoader::load_pd_segments`] passes only the segments of one user PD
//!   to the secure PD segment loader.
//!
//! Segment bytes come from the `.mdt` file itself or from its split files.

use crate::error::RprocError;
use crate::memory::MemoryWindow;
use crate::platform::{PdSegment, SecureMonitor};
use driver_firmware::FirmwareStore;
use mdt_image::{Layout, MdtError, MdtHeader, Placement, split_file_name};
use std::borrow::Cow;

pub struct MdtLoader<'a> {
    pub secure: &'a dyn SecureMonitor,
    pub firmware: &'a dyn FirmwareStore,
}

impl MdtLoader<'_> {
    /// Authenticate and load `mdt` (named `name`) for PAS `pas`.
    ///
    /// On success `window.reloc_base` is the device address of the first
    /// window byte.
    ///
    /// # Errors
    /// Malformed images, failed secure calls and missing split files.
    pub fn load(
        &self,
        mdt: &[u8],
        name: &str,
        pas: u32,
        window: &mut MemoryWindow,
    ) -> Result<(), RprocError> {
        self.load_segments(mdt, name, Some(pas), window)
    }

    /// Load `mdt` without secure initialization.
    ///
    /// # Errors
    /// Malformed images and missing split files.
    pub fn load_no_init(
        &self,
        mdt: &[u8],
        name: &str,
        window: &mut MemoryWindow,
    ) -> Result<(), RprocError> {
        self.load_segments(mdt, name, None, window)
    }

    /// Hand the segments tagged with `pd_asid` to the secure PD loader.
    ///
    /// Returns the number of segments loaded.
    ///
    /// # Errors
    /// Malformed images, failed secure calls and missing split files.
    pub fn load_pd_segments(
        &self,
        mdt: &[u8],
        name: &str,
        pas: u32,
        pd_asid: u8,
        window: &mut MemoryWindow,
    ) -> Result<usize, RprocError> {
        let header = parse(mdt, name)?;
        let layout = place(&header, name, window)?;

        let mut loaded = 0;
        for p in layout.segments.iter().filter(|p| p.pd_asid == pd_asid) {
            let mut data = self.segment_bytes(&header, p, mdt, name)?.into_owned();
            data.resize(p.memsz, 0);

            let paddr = layout.mem_reloc + p.window_offset as u64;
            log::debug!("{name}: PD{pd_asid} segment {} to 0x{paddr:x}", p.index);
            self.secure.pd_segment_load(
                pas,
                PdSegment {
                    pd_asid,
                    index: p.index,
                    paddr,
                    data: &data,
                },
            )?;
            loaded += 1;
        }

        if loaded == 0 {
            log::warn!("{name}: no segments for PD{pd_asid}");
        }
        window.reloc_base = layout.mem_reloc;
        Ok(loaded)
    }

    fn load_segments(
        &self,
        mdt: &[u8],
        name: &str,
        init_pas: Option<u32>,
        window: &mut MemoryWindow,
    ) -> Result<(), RprocError> {
        let header = parse(mdt, name)?;
        let layout = place(&header, name, window)?;

        if let Some(pas) = init_pas {
            let hash = self.hash_bytes(&header, mdt, name)?;
            let metadata = header.metadata(mdt, &hash).map_err(|source| image(name, source))?;
            self.secure.pas_init_image(pas, &metadata)?;

            if layout.relocatable {
                self.secure
                    .pas_mem_setup(pas, window.phys_base, layout.span())?;
            }
        }

        for p in &layout.segments {
            if p.filesz > 0 {
                let data = self.segment_bytes(&header, p, mdt, name)?;
                if !window.write(p.window_offset, &data) {
                    return Err(out_of_window(name, &layout, p, window));
                }
            }
            if p.memsz > p.filesz
                && !window.zero(p.window_offset + p.filesz, p.memsz - p.filesz)
            {
                return Err(out_of_window(name, &layout, p, window));
            }
        }

        window.reloc_base = layout.mem_reloc;
        log::debug!(
            "{name}: {} segments loaded, relocated to 0x{:x}",
            layout.segments.len(),
            layout.mem_reloc
        );
        Ok(())
    }

    fn hash_bytes<'m>(
        &self,
        header: &MdtHeader,
        mdt: &'m [u8],
        name: &str,
    ) -> Result<Cow<'m, [u8]>, RprocError> {
        let (index, ph) = header
            .hash_segment()
            .ok_or_else(|| image(name, MdtError::MissingHashSegment))?;
        if let Some(bytes) = header.segment_in_file(index, mdt) {
            return Ok(Cow::Borrowed(bytes));
        }
        self.split_segment(name, index, ph.filesz as usize)
            .map(Cow::Owned)
    }

    fn segment_bytes<'m>(
        &self,
        header: &MdtHeader,
        placement: &Placement,
        mdt: &'m [u8],
        name: &str,
    ) -> Result<Cow<'m, [u8]>, RprocError> {
        if let Some(bytes) = header.segment_in_file(placement.index, mdt) {
            return Ok(Cow::Borrowed(bytes));
        }
        self.split_segment(name, placement.index, placement.filesz)
            .map(Cow::Owned)
    }

    fn split_segment(&self, name: &str, index: usize, expected: usize) -> Result<Vec<u8>, RprocError> {
        let split = split_file_name(name, index);
        let bytes = self.firmware.request(&split)?;
        if bytes.len() != expected {
            log::error!("failed to load segment {index} from truncated file {split}");
            return Err(RprocError::SegmentFileSize {
                name: split,
                index,
                expected,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }
}

fn image(name: &str, source: MdtError) -> RprocError {
    RprocError::Image {
        name: name.to_string(),
        source,
    }
}

fn parse(mdt: &[u8], name: &str) -> Result<MdtHeader, RprocError> {
    MdtHeader::parse(mdt).map_err(|source| image(name, source))
}

fn place(header: &MdtHeader, name: &str, window: &MemoryWindow) -> Result<Layout, RprocError> {
    header
        .layout(window.phys_base, window.size)
        .map_err(|source| image(name, source))
}

fn out_of_window(name: &str, layout: &Layout, p: &Placement, window: &MemoryWindow) -> RprocError {
    let start = layout.mem_reloc + p.window_offset as u64;
    image(
        name,
        MdtError::SegmentOutOfWindow {
            index: p.index,
            start,
            end: start + p.memsz as u64,
            window: window.size,
        },
    )
}
