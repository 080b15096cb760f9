//! # Image Builder
//!
//! Produces `.mdt` images (and optionally their split segment files) laid out
//! the way the signing tools emit them:
//!
//! ```text
//! [ELF header][program headers][hash segment][segment 2][segment 3]...
//! ```
//!
//! Program header 0 describes the headers themselves, header 1 is the hash
//! segment, and every following header is a `PT_LOAD` segment. In split mode
//! the `.mdt` ends after the hash segment and each loadable segment is
//! returned separately, keyed by its program header index.

use crate::{ELF32_EHDR_SIZE, ELF32_PHDR_SIZE, PT_LOAD, PT_NULL, SegmentFlags, SegmentType};
use alloc::vec;
use alloc::vec::Vec;

/// `EM_QDSP6`
const MACHINE_HEXAGON: u16 = 164;

#[derive(Debug, Clone)]
struct SegmentSpec {
    paddr: u32,
    memsz: u32,
    data: Vec<u8>,
    pd_asid: u8,
}

#[derive(Debug, Clone, Default)]
pub struct MdtFiles {
    pub mdt: Vec<u8>,
    /// `(program header index, bytes)` of segments not contained in `mdt`.
    pub split_segments: Vec<(usize, Vec<u8>)>,
}

#[derive(Debug, Clone)]
pub struct MdtBuilder {
    entry: u32,
    relocatable: bool,
    split: bool,
    hash: Vec<u8>,
    segments: Vec<SegmentSpec>,
}

impl Default for MdtBuilder {
    fn default() -> Self {
        Self {
            entry: 0,
            relocatable: false,
            split: false,
            hash: vec![0xA5; 32],
            segments: Vec::new(),
        }
    }
}

const fn align4(x: usize) -> usize {
    (x + 3) & !3
}

struct Phdr {
    p_type: u32,
    offset: usize,
    paddr: u32,
    filesz: usize,
    memsz: usize,
    flags: SegmentFlags,
}

impl Phdr {
    #[allow(clippy::cast_possible_truncation)]
    fn write(&self, out: &mut Vec<u8>) {
        let fields = [
            self.p_type,
            self.offset as u32,
            self.paddr,
            self.paddr,
            self.filesz as u32,
            self.memsz as u32,
            self.flags.into_bits(),
            4,
        ];
        for f in fields {
            out.extend_from_slice(&f.to_le_bytes());
        }
    }
}

impl MdtBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn entry(mut self, entry: u32) -> Self {
        self.entry = entry;
        self
    }

    #[must_use]
    pub const fn relocatable(mut self, relocatable: bool) -> Self {
        self.relocatable = relocatable;
        self
    }

    /// Emit loadable segments as separate files.
    #[must_use]
    pub const fn split(mut self, split: bool) -> Self {
        self.split = split;
        self
    }

    #[must_use]
    pub fn hash(mut self, hash: &[u8]) -> Self {
        self.hash = hash.to_vec();
        self
    }

    /// Add a loadable segment of `memsz` bytes (at least `data.len()`) at `paddr`.
    #[must_use]
    pub fn segment(self, paddr: u32, data: &[u8], memsz: u32) -> Self {
        self.pd_segment(0, paddr, data, memsz)
    }

    /// Add a loadable segment owned by protection domain `asid`.
    #[must_use]
    pub fn pd_segment(mut self, asid: u8, paddr: u32, data: &[u8], memsz: u32) -> Self {
        self.segments.push(SegmentSpec {
            paddr,
            memsz,
            data: data.to_vec(),
            pd_asid: asid,
        });
        self
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn build(&self) -> MdtFiles {
        let phnum = 2 + self.segments.len();
        let headers_len = ELF32_EHDR_SIZE + phnum * ELF32_PHDR_SIZE;
        let hash_offset = align4(headers_len);

        let mut phdrs = vec![
            Phdr {
                p_type: PT_NULL,
                offset: 0,
                paddr: 0,
                filesz: headers_len,
                memsz: 0,
                flags: SegmentFlags::new().with_segment_type(SegmentType::Layout),
            },
            Phdr {
                p_type: PT_NULL,
                offset: hash_offset,
                paddr: 0,
                filesz: self.hash.len(),
                memsz: 0,
                flags: SegmentFlags::new().with_segment_type(SegmentType::Hash),
            },
        ];

        let mut cursor = align4(hash_offset + self.hash.len());
        for seg in &self.segments {
            phdrs.push(Phdr {
                p_type: PT_LOAD,
                offset: cursor,
                paddr: seg.paddr,
                filesz: seg.data.len(),
                memsz: (seg.memsz as usize).max(seg.data.len()),
                flags: SegmentFlags::new()
                    .with_read(true)
                    .with_execute(true)
                    .with_pd_asid(seg.pd_asid)
                    .with_relocatable(self.relocatable),
            });
            cursor = align4(cursor + seg.data.len());
        }

        let mut mdt = Vec::with_capacity(cursor);
        mdt.extend_from_slice(&[0x7F, b'E', b'L', b'F', 1, 1, 1]);
        mdt.resize(16, 0);
        mdt.extend_from_slice(&2u16.to_le_bytes()); // e_type: EXEC
        mdt.extend_from_slice(&MACHINE_HEXAGON.to_le_bytes());
        mdt.extend_from_slice(&1u32.to_le_bytes()); // e_version
        mdt.extend_from_slice(&self.entry.to_le_bytes());
        mdt.extend_from_slice(&(ELF32_EHDR_SIZE as u32).to_le_bytes()); // e_phoff
        mdt.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
        mdt.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        mdt.extend_from_slice(&(ELF32_EHDR_SIZE as u16).to_le_bytes());
        mdt.extend_from_slice(&(ELF32_PHDR_SIZE as u16).to_le_bytes());
        mdt.extend_from_slice(&(phnum as u16).to_le_bytes());
        mdt.extend_from_slice(&[0; 6]); // no section headers
        for ph in &phdrs {
            ph.write(&mut mdt);
        }

        mdt.resize(hash_offset, 0);
        mdt.extend_from_slice(&self.hash);

        let mut split_segments = Vec::new();
        for (i, seg) in self.segments.iter().enumerate() {
            let index = i + 2;
            if self.split {
                split_segments.push((index, seg.data.clone()));
            } else {
                mdt.resize(phdrs[index].offset, 0);
                mdt.extend_from_slice(&seg.data);
            }
        }

        MdtFiles {
            mdt,
            split_segments,
        }
    }
}
