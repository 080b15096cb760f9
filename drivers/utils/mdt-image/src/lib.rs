//! # PIL/MDT Firmware Images
//!
//! Qualcomm peripheral images ship as an ELF32 container whose program
//! headers carry loader-specific bits in `p_flags`. The `.mdt` file holds the
//! ELF header, the program header table and the hash segment; segment data is
//! either inside the same file or in split files named after the segment
//! index (`wcss.mdt` → `wcss.b02`).
//!
//! This crate only describes the image. Copying segments into a memory window
//! and talking to the secure loader is left to the remoteproc driver.

#![no_std]

extern crate alloc;

#[cfg(any(test, feature = "build"))]
pub mod build;
mod layout;
mod parser;

pub use layout::{Layout, Placement};
pub use parser::{
    ELF32_EHDR_SIZE, ELF32_PHDR_SIZE, MdtHeader, PT_LOAD, PT_NULL, ProgramHeader, SegmentFlags,
    SegmentType,
};

use alloc::format;
use alloc::string::String;

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MdtError {
    #[error("image too short for the {what}: need {needed} bytes, have {available}")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("not an ELF image")]
    BadMagic,
    #[error("not a 32-bit little-endian ELF image")]
    UnsupportedClass,
    #[error("unexpected program header entry size {0}")]
    ProgramHeaderSize(u16),
    #[error("image has no hash segment")]
    MissingHashSegment,
    #[error("segment {index}: file size 0x{filesz:x} exceeds memory size 0x{memsz:x}")]
    SegmentSize { index: usize, filesz: u32, memsz: u32 },
    #[error(
        "segment {index} at 0x{start:x}..0x{end:x} lies outside the 0x{window:x} byte memory window"
    )]
    SegmentOutOfWindow {
        index: usize,
        start: u64,
        end: u64,
        window: usize,
    },
}

/// Name of the split file holding segment `index` of the image `mdt_name`.
///
/// The last three characters of the name (the `mdt` extension) are replaced
/// by `bNN`.
#[must_use]
pub fn split_file_name(mdt_name: &str, index: usize) -> String {
    let stem = mdt_name
        .len()
        .checked_sub(3)
        .and_then(|n| mdt_name.get(..n))
        .unwrap_or("");
    format!("{stem}b{index:02}")
}
