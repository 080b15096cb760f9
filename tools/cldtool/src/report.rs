//! Human-readable summaries of firmware images.

use cld_image::{DRAM_BASE_ADDR, FirmwareImage, IRAM_BASE_ADDR};
use mdt_image::{MdtHeader, PT_LOAD, PT_NULL};
use std::fmt::Write as _;

#[must_use]
pub fn describe_cld(image: &FirmwareImage<'_>) -> String {
    let header = image.header();
    let (iram, dram) = (image.iram(), image.dram());
    let mut out = String::new();
    let _ = writeln!(out, "version:        {}", image.version());
    let _ = writeln!(out, "crc:            0x{:04x}", image.crc());
    let _ = writeln!(out, "primary offset: 0x{:x}", header.primary_offset);
    let _ = writeln!(
        out,
        "dram:           file 0x{:06x}..0x{:06x} -> 0x{DRAM_BASE_ADDR:08x} ({} bytes)",
        dram.offset,
        dram.end(),
        dram.size
    );
    let _ = writeln!(
        out,
        "iram:           file 0x{:06x}..0x{:06x} -> 0x{IRAM_BASE_ADDR:08x} ({} bytes)",
        iram.offset,
        iram.end(),
        iram.size
    );
    out
}

#[must_use]
pub fn describe_mdt(header: &MdtHeader) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "machine 0x{:x}, entry 0x{:08x}, {} program headers{}",
        header.machine,
        header.entry,
        header.program_headers.len(),
        if header.is_relocatable() {
            ", relocatable"
        } else {
            ""
        }
    );
    let _ = writeln!(out, "idx  type  paddr       filesz    memsz     pd  kind");
    for (index, ph) in header.program_headers.iter().enumerate() {
        let kind = if ph.is_hash() {
            "hash"
        } else if ph.is_loadable() {
            "load"
        } else {
            "-"
        };
        let p_type = match ph.p_type {
            PT_NULL => "NULL",
            PT_LOAD => "LOAD",
            _ => "?",
        };
        let _ = writeln!(
            out,
            "{index:>3}  {p_type:<4}  0x{:08x}  0x{:06x}  0x{:06x}  {:>2}  {kind}",
            ph.paddr,
            ph.filesz,
            ph.memsz,
            ph.flags.pd_asid()
        );
    }
    out
}
