//! # Aquantia `.cld` Firmware Images
//!
//! A `.cld` image carries the program memory (IRAM) and data memory (DRAM)
//! contents of the PHY's embedded processor, wrapped in a small container:
//!
//! ```text
//!  0x0000  ┌──────────────────────────────┐
//!          │ ...                          │
//!  0x0008  │ primary offset (12 bit, LE)  │  × 4096 → primary
//!          │ ...                          │
//! primary  ├──────────────────────────────┤
//!  +0x300  │ header: pad[4]               │
//!          │         iram_offset  (u24 LE)│
//!          │         iram_size    (u24 LE)│
//!          │         dram_offset  (u24 LE)│
//!          │         dram_size    (u24 LE)│
//!          ├──────────────────────────────┤
//!          │ DRAM ... +0x200: version str │
//!          │ IRAM ...                     │
//!  len-2   ├──────────────────────────────┤
//!          │ CRC16-CCITT (big endian)     │
//!          └──────────────────────────────┘
//! ```
//!
//! Segment offsets are relative to the primary offset. The trailing checksum
//! covers every byte before it and is validated before any layout field is
//! trusted.

#![no_std]

extern crate alloc;

#[cfg(any(test, feature = "build"))]
pub mod build;

use alloc::string::{String, ToString};
use core::fmt;
use crc16_ccitt::crc16_ccitt;

/// Byte offset of the 12-bit primary offset field.
pub const PRIMARY_OFFSET_FIELD: usize = 8;

/// The primary offset field counts 4 KiB units.
pub const PRIMARY_OFFSET_SHIFT: u32 = 12;

/// Location of the segment header, relative to the primary offset.
pub const HEADER_OFFSET: usize = 0x300;

/// Packed size of the segment header.
pub const HEADER_SIZE: usize = 16;

/// Location of the version string, relative to the DRAM segment.
pub const VERSION_STRING_OFFSET: usize = 0x200;

/// Size of the version string buffer, including the terminating NUL.
pub const VERSION_STRING_SIZE: usize = 0x40;

/// Trailing checksum size.
pub const CRC_SIZE: usize = 2;

/// Load address of the DRAM segment in the PHY processor's address space.
pub const DRAM_BASE_ADDR: u32 = 0x3FFE_0000;

/// Load address of the IRAM segment in the PHY processor's address space.
pub const IRAM_BASE_ADDR: u32 = 0x4000_0000;

/// Part of the image a bounds failure refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Region {
    Preamble,
    Header,
    Iram,
    Dram,
    Version,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Preamble => "preamble",
            Self::Header => "segment header",
            Self::Iram => "IRAM segment",
            Self::Dram => "DRAM segment",
            Self::Version => "version string",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("bad firmware CRC: file 0x{expected:04x} calculated 0x{computed:04x}")]
    CrcMismatch { computed: u16, expected: u16 },
    #[error("{region} at 0x{start:x}..0x{end:x} lies outside the {available} byte image payload")]
    OutOfBounds {
        region: Region,
        start: usize,
        end: usize,
        available: usize,
    },
}

/// Raw header values. IRAM/DRAM offsets are relative to `primary_offset`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FirmwareHeader {
    pub primary_offset: u32,
    pub iram_offset: u32,
    pub iram_size: u32,
    pub dram_offset: u32,
    pub dram_size: u32,
}

/// A segment as an absolute byte range within the image.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Segment {
    pub offset: usize,
    pub size: usize,
}

impl Segment {
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Validated view over a `.cld` blob.
#[derive(Debug, Clone)]
pub struct FirmwareImage<'a> {
    blob: &'a [u8],
    header: FirmwareHeader,
    version: String,
    iram: Segment,
    dram: Segment,
}

#[inline]
const fn unpack_u24(b: [u8; 3]) -> u32 {
    ((b[2] as u32) << 16) | ((b[1] as u32) << 8) | b[0] as u32
}

fn window(
    payload: &[u8],
    region: Region,
    start: usize,
    len: usize,
) -> Result<&[u8], ParseError> {
    let out_of_bounds = |end| ParseError::OutOfBounds {
        region,
        start,
        end,
        available: payload.len(),
    };
    let end = start.checked_add(len).ok_or_else(|| out_of_bounds(usize::MAX))?;
    payload.get(start..end).ok_or_else(|| out_of_bounds(end))
}

fn read_u24(bytes: &[u8], at: usize) -> u32 {
    unpack_u24([bytes[at], bytes[at + 1], bytes[at + 2]])
}

/// Reads the primary offset field and scales it to a byte offset.
fn primary_offset(blob: &[u8]) -> Result<u32, ParseError> {
    let field = window(blob, Region::Preamble, PRIMARY_OFFSET_FIELD, 2)?;
    let units = (u32::from(field[1] & 0x0f) << 8) | u32::from(field[0]);
    Ok(units << PRIMARY_OFFSET_SHIFT)
}

impl<'a> FirmwareImage<'a> {
    /// Validate the checksum and resolve the segment layout of `blob`.
    ///
    /// # Errors
    /// - [`ParseError::CrcMismatch`] if the trailing checksum does not match.
    /// - [`ParseError::OutOfBounds`] if the image is too small for its own layout.
    pub fn parse(blob: &'a [u8]) -> Result<Self, ParseError> {
        if blob.len() < PRIMARY_OFFSET_FIELD + 2 + CRC_SIZE {
            return Err(ParseError::OutOfBounds {
                region: Region::Preamble,
                start: 0,
                end: PRIMARY_OFFSET_FIELD + 2 + CRC_SIZE,
                available: blob.len(),
            });
        }

        let (payload, trailer) = blob.split_at(blob.len() - CRC_SIZE);
        let expected = u16::from_be_bytes([trailer[0], trailer[1]]);
        let computed = crc16_ccitt(0, payload);
        if computed != expected {
            return Err(ParseError::CrcMismatch { computed, expected });
        }

        let primary = primary_offset(payload)?;
        let base = primary as usize;
        let raw = window(
            payload,
            Region::Header,
            base.saturating_add(HEADER_OFFSET),
            HEADER_SIZE,
        )?;

        let header = FirmwareHeader {
            primary_offset: primary,
            iram_offset: read_u24(raw, 4),
            iram_size: read_u24(raw, 7),
            dram_offset: read_u24(raw, 10),
            dram_size: read_u24(raw, 13),
        };

        let iram = Segment {
            offset: base + header.iram_offset as usize,
            size: header.iram_size as usize,
        };
        let dram = Segment {
            offset: base + header.dram_offset as usize,
            size: header.dram_size as usize,
        };
        window(payload, Region::Iram, iram.offset, iram.size)?;
        window(payload, Region::Dram, dram.offset, dram.size)?;

        let version = read_version(payload, dram.offset + VERSION_STRING_OFFSET)?;

        log::debug!(
            "primary {primary} IRAM offset={} size={} DRAM offset={} size={}",
            iram.offset,
            iram.size,
            dram.offset,
            dram.size
        );

        Ok(Self {
            blob,
            header,
            version,
            iram,
            dram,
        })
    }

    #[must_use]
    pub const fn header(&self) -> &FirmwareHeader {
        &self.header
    }

    /// Version string embedded in the DRAM segment.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub const fn iram(&self) -> Segment {
        self.iram
    }

    #[must_use]
    pub const fn dram(&self) -> Segment {
        self.dram
    }

    #[must_use]
    pub fn iram_bytes(&self) -> &'a [u8] {
        &self.blob[self.iram.offset..self.iram.end()]
    }

    #[must_use]
    pub fn dram_bytes(&self) -> &'a [u8] {
        &self.blob[self.dram.offset..self.dram.end()]
    }

    /// The checksum stored in (and verified against) the image trailer.
    #[must_use]
    pub fn crc(&self) -> u16 {
        let n = self.blob.len();
        u16::from_be_bytes([self.blob[n - 2], self.blob[n - 1]])
    }
}

/// `strlcpy` semantics: stop at the first NUL, never take the last byte of
/// the slot. Only the bytes up to the NUL need to lie inside the payload.
fn read_version(payload: &[u8], start: usize) -> Result<String, ParseError> {
    let end = start.saturating_add(VERSION_STRING_SIZE).min(payload.len());
    let raw = window(payload, Region::Version, start, end.saturating_sub(start))?;
    let bounded = &raw[..raw.len().min(VERSION_STRING_SIZE - 1)];
    let len = match bounded.iter().position(|&b| b == 0) {
        Some(nul) => nul,
        None if raw.len() == VERSION_STRING_SIZE => bounded.len(),
        None => {
            return Err(ParseError::OutOfBounds {
                region: Region::Version,
                start,
                end: start.saturating_add(VERSION_STRING_SIZE),
                available: payload.len(),
            });
        }
    };
    Ok(String::from_utf8_lossy(&bounded[..len]).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_version(raw: &[u8]) -> String {
        read_version(raw, 0).unwrap()
    }

    #[test]
    fn unpack_u24_is_little_endian() {
        assert_eq!(unpack_u24([0x56, 0x34, 0x12]), 0x12_3456);
        assert_eq!(unpack_u24([0xff, 0xff, 0xff]), 0xff_ffff);
    }

    #[test]
    fn primary_offset_uses_low_nibble_of_high_byte() {
        let mut blob = [0u8; 16];
        blob[8] = 0x00;
        blob[9] = 0x01;
        assert_eq!(primary_offset(&blob).unwrap(), 0x10_0000);

        blob[8] = 0x02;
        blob[9] = 0xf0;
        assert_eq!(primary_offset(&blob).unwrap(), 0x2000);
    }

    #[test]
    fn version_is_bounded_and_nul_truncated() {
        let mut raw = [b'x'; VERSION_STRING_SIZE];
        assert_eq!(decode_version(&raw).len(), VERSION_STRING_SIZE - 1);

        raw[..6].copy_from_slice(b"v1.2\0z");
        assert_eq!(decode_version(&raw), "v1.2");
    }
}
