//! # Image Builder
//!
//! Lays out a well-formed `.cld` image from raw IRAM and DRAM contents. The
//! layout mirrors what the vendor tooling produces closely enough for the
//! parser and the PHY boot mailbox:
//!
//! 1. the primary offset field at byte 8,
//! 2. the segment header at `primary + 0x300`,
//! 3. DRAM directly after the header (with the version string patched in at
//!    `+0x200`), IRAM after DRAM, 4-byte aligned,
//! 4. the big-endian CRC16 trailer.

use crate::{
    CRC_SIZE, HEADER_OFFSET, HEADER_SIZE, PRIMARY_OFFSET_FIELD, PRIMARY_OFFSET_SHIFT,
    VERSION_STRING_OFFSET, VERSION_STRING_SIZE,
};
use alloc::string::String;
use alloc::vec::Vec;
use crc16_ccitt::crc16_ccitt;

/// Offset of the DRAM segment relative to the primary offset.
const DRAM_RELATIVE: usize = HEADER_OFFSET + 0x100;

/// Largest value a packed 24-bit field can carry.
const U24_MAX: usize = 0x00ff_ffff;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("primary offset of {0} units does not fit the 12-bit field")]
    PrimaryOffsetTooLarge(u16),
    #[error("segment layout exceeds the 24-bit header fields")]
    SegmentTooLarge,
}

#[derive(Debug, Clone, Default)]
pub struct ImageBuilder {
    primary_units: u16,
    iram: Vec<u8>,
    dram: Vec<u8>,
    version: String,
}

const fn align4(x: usize) -> usize {
    (x + 3) & !3
}

fn pack_u24(v: usize) -> [u8; 3] {
    let b = v.to_le_bytes();
    [b[0], b[1], b[2]]
}

impl ImageBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Primary offset in 4 KiB units (12 bits).
    #[must_use]
    pub const fn primary_units(mut self, units: u16) -> Self {
        self.primary_units = units;
        self
    }

    #[must_use]
    pub fn iram(mut self, bytes: &[u8]) -> Self {
        self.iram = bytes.to_vec();
        self
    }

    /// DRAM contents. Grown to cover the version string if shorter.
    #[must_use]
    pub fn dram(mut self, bytes: &[u8]) -> Self {
        self.dram = bytes.to_vec();
        self
    }

    /// Version string; truncated to 63 bytes.
    #[must_use]
    pub fn version(mut self, version: &str) -> Self {
        self.version = String::from(version);
        self
    }

    /// Produce the image bytes, checksum included.
    ///
    /// # Errors
    /// Fails if the requested layout cannot be expressed in the header fields.
    pub fn build(&self) -> Result<Vec<u8>, BuildError> {
        if self.primary_units > 0x0fff {
            return Err(BuildError::PrimaryOffsetTooLarge(self.primary_units));
        }

        let mut dram = self.dram.clone();
        let version_end = VERSION_STRING_OFFSET + VERSION_STRING_SIZE;
        if dram.len() < version_end {
            dram.resize(version_end, 0);
        }
        let version = self.version.as_bytes();
        let n = version.len().min(VERSION_STRING_SIZE - 1);
        let slot = &mut dram[VERSION_STRING_OFFSET..version_end];
        slot.fill(0);
        slot[..n].copy_from_slice(&version[..n]);

        let primary = usize::from(self.primary_units) << PRIMARY_OFFSET_SHIFT;
        let dram_rel = DRAM_RELATIVE;
        let iram_rel = align4(dram_rel + dram.len());
        if iram_rel + self.iram.len() > U24_MAX || dram.len() > U24_MAX {
            return Err(BuildError::SegmentTooLarge);
        }

        let payload_len = primary + iram_rel + self.iram.len();
        let mut out = Vec::with_capacity(payload_len + CRC_SIZE);
        out.resize(payload_len, 0);

        let [lo, hi] = self.primary_units.to_le_bytes();
        out[PRIMARY_OFFSET_FIELD] = lo;
        out[PRIMARY_OFFSET_FIELD + 1] = hi;

        let h = primary + HEADER_OFFSET;
        let header = &mut out[h..h + HEADER_SIZE];
        header[4..7].copy_from_slice(&pack_u24(iram_rel));
        header[7..10].copy_from_slice(&pack_u24(self.iram.len()));
        header[10..13].copy_from_slice(&pack_u24(dram_rel));
        header[13..16].copy_from_slice(&pack_u24(dram.len()));

        out[primary + dram_rel..primary + dram_rel + dram.len()].copy_from_slice(&dram);
        out[primary + iram_rel..].copy_from_slice(&self.iram);

        let crc = crc16_ccitt(0, &out);
        out.extend_from_slice(&crc.to_be_bytes());
        Ok(out)
    }
}
