//! # ELF32 Program Header Parsing

use crate::MdtError;
use alloc::vec::Vec;

pub const PT_NULL: u32 = 0;
pub const PT_LOAD: u32 = 1;

pub const ELF32_EHDR_SIZE: usize = 52;
pub const ELF32_PHDR_SIZE: usize = 32;

const EI_MAGIC_BYTES: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const ELFCLASS32: u8 = 1;
const ELFDATA2LSB: u8 = 1;
const EV_CURRENT: u8 = 1;

/// Loader-defined segment kind in `p_flags` bits 24..27.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SegmentType {
    Data,
    Hash,
    Layout,
    Reserved(u8),
}

impl SegmentType {
    #[inline]
    pub const fn into_bits(self) -> u8 {
        match self {
            Self::Data => 0,
            Self::Hash => 2,
            Self::Layout => 7,
            Self::Reserved(v) => v,
        }
    }

    #[inline]
    pub const fn from_bits(v: u8) -> Self {
        match v & 0b111 {
            0 => Self::Data,
            2 => Self::Hash,
            7 => Self::Layout,
            v => Self::Reserved(v),
        }
    }
}

/// Bitfield wrapper for `Elf32_Phdr.p_flags` as used by PIL images.
///
/// Layout (LSB→MSB):
/// - bit 0: execute
/// - bit 1: write
/// - bit 2: read
/// - bits 16..20: protection domain ASID for PD-scoped segments
/// - bits 24..=26: segment type (hash, layout, data)
/// - bit 27: the image may be placed anywhere in the memory window
#[bitfield_struct::bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct SegmentFlags {
    #[bits(1)]
    pub execute: bool,
    #[bits(1)]
    pub write: bool,
    #[bits(1)]
    pub read: bool,
    #[bits(13)]
    __: u16,
    #[bits(4)]
    pub pd_asid: u8,
    #[bits(4)]
    __: u8,
    #[bits(3)]
    pub segment_type: SegmentType,
    #[bits(1)]
    pub relocatable: bool,
    #[bits(4)]
    __: u8,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub offset: u32,
    pub vaddr: u32,
    pub paddr: u32,
    pub filesz: u32,
    pub memsz: u32,
    pub flags: SegmentFlags,
    pub align: u32,
}

impl ProgramHeader {
    /// `PT_LOAD`, non-empty in memory, and not the hash segment.
    #[must_use]
    pub fn is_loadable(&self) -> bool {
        self.p_type == PT_LOAD && self.memsz != 0 && !self.is_hash()
    }

    #[must_use]
    pub fn is_hash(&self) -> bool {
        self.flags.segment_type() == SegmentType::Hash
    }

    /// End of the segment's bytes in the image file.
    #[must_use]
    pub fn file_end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.filesz)
    }

    fn decode(raw: &[u8]) -> Self {
        Self {
            p_type: le32(raw, 0),
            offset: le32(raw, 4),
            vaddr: le32(raw, 8),
            paddr: le32(raw, 12),
            filesz: le32(raw, 16),
            memsz: le32(raw, 20),
            flags: SegmentFlags::from_bits(le32(raw, 24)),
            align: le32(raw, 28),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MdtHeader {
    pub machine: u16,
    pub entry: u32,
    pub phoff: u32,
    pub program_headers: Vec<ProgramHeader>,
}

#[inline]
fn le16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

#[inline]
fn le32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

impl MdtHeader {
    /// Parse the ELF32 header and program header table of an `.mdt` file.
    ///
    /// # Errors
    /// Any validation or bounds failure of the header or the table.
    pub fn parse(bytes: &[u8]) -> Result<Self, MdtError> {
        if bytes.len() < ELF32_EHDR_SIZE {
            return Err(MdtError::Truncated {
                what: "ELF header",
                needed: ELF32_EHDR_SIZE,
                available: bytes.len(),
            });
        }

        if bytes[0..4] != EI_MAGIC_BYTES {
            return Err(MdtError::BadMagic);
        }
        if bytes[4] != ELFCLASS32 || bytes[5] != ELFDATA2LSB || bytes[6] != EV_CURRENT {
            return Err(MdtError::UnsupportedClass);
        }

        let machine = le16(bytes, 18);
        let entry = le32(bytes, 24);
        let phoff = le32(bytes, 28);
        let phentsize = le16(bytes, 42);
        let phnum = usize::from(le16(bytes, 44));

        if usize::from(phentsize) != ELF32_PHDR_SIZE {
            return Err(MdtError::ProgramHeaderSize(phentsize));
        }

        let table_start = phoff as usize;
        let table_end = table_start + phnum * ELF32_PHDR_SIZE;
        if table_end > bytes.len() {
            return Err(MdtError::Truncated {
                what: "program header table",
                needed: table_end,
                available: bytes.len(),
            });
        }

        let program_headers = bytes[table_start..table_end]
            .chunks_exact(ELF32_PHDR_SIZE)
            .map(ProgramHeader::decode)
            .collect();

        Ok(Self {
            machine,
            entry,
            phoff,
            program_headers,
        })
    }

    /// Size of the ELF header plus the program header table.
    #[must_use]
    pub fn headers_len(&self) -> usize {
        let table_end = self.phoff as usize + self.program_headers.len() * ELF32_PHDR_SIZE;
        table_end.max(ELF32_EHDR_SIZE)
    }

    /// Index and header of the hash segment.
    #[must_use]
    pub fn hash_segment(&self) -> Option<(usize, &ProgramHeader)> {
        self.program_headers
            .iter()
            .enumerate()
            .find(|(_, ph)| ph.is_hash())
    }

    pub fn loadable(&self) -> impl Iterator<Item = (usize, &ProgramHeader)> {
        self.program_headers
            .iter()
            .enumerate()
            .filter(|(_, ph)| ph.is_loadable())
    }

    /// Whether any loadable segment allows relocation.
    #[must_use]
    pub fn is_relocatable(&self) -> bool {
        self.loadable().any(|(_, ph)| ph.flags.relocatable())
    }

    /// Bytes of segment `index` when they are contained in the `.mdt` file itself.
    #[must_use]
    pub fn segment_in_file<'a>(&self, index: usize, mdt: &'a [u8]) -> Option<&'a [u8]> {
        let ph = self.program_headers.get(index)?;
        let start = ph.offset as usize;
        let end = usize::try_from(ph.file_end()).ok()?;
        mdt.get(start..end)
    }

    /// Metadata handed to the secure loader: the headers followed by the hash segment.
    ///
    /// # Errors
    /// [`MdtError::Truncated`] if either part is shorter than declared.
    pub fn metadata(&self, mdt: &[u8], hash: &[u8]) -> Result<Vec<u8>, MdtError> {
        let headers_len = self.headers_len();
        let headers = mdt.get(..headers_len).ok_or(MdtError::Truncated {
            what: "metadata headers",
            needed: headers_len,
            available: mdt.len(),
        })?;

        let (_, ph) = self.hash_segment().ok_or(MdtError::MissingHashSegment)?;
        let hash_len = ph.filesz as usize;
        let hash = hash.get(..hash_len).ok_or(MdtError::Truncated {
            what: "hash segment",
            needed: hash_len,
            available: hash.len(),
        })?;

        let mut out = Vec::with_capacity(headers_len + hash_len);
        out.extend_from_slice(headers);
        out.extend_from_slice(hash);
        Ok(out)
    }
}
