//! # CRC16-CCITT
//!
//! Table-driven CRC with polynomial `0x1021`, MSB-first, no reflection and no
//! final xor. With a zero seed this is the checksum the Aquantia firmware
//! tooling appends to `.cld` images and the one the PHY's boot mailbox
//! computes over the words it receives.
//!
//! ```rust
//! use crc16_ccitt::crc16_ccitt;
//!
//! assert_eq!(crc16_ccitt(0, b"123456789"), 0x31C3);
//! ```

#![no_std]

/// Generator polynomial (x^16 + x^12 + x^5 + 1).
pub const POLYNOMIAL: u16 = 0x1021;

/// Lookup table, one entry per leading byte.
pub const CRC16_TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        #[allow(clippy::cast_possible_truncation)]
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Continue a CRC over `data`, starting from `seed`.
#[must_use]
pub const fn crc16_ccitt(seed: u16, data: &[u8]) -> u16 {
    let mut crc = seed;
    let mut i = 0;
    while i < data.len() {
        let idx = ((crc >> 8) ^ data[i] as u16) & 0xff;
        crc = CRC16_TABLE[idx as usize] ^ (crc << 8);
        i += 1;
    }
    crc
}

/// Incremental accumulator for data that arrives in pieces.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Crc16 {
    value: u16,
}

impl Crc16 {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_seed(0)
    }

    #[must_use]
    pub const fn with_seed(seed: u16) -> Self {
        Self { value: seed }
    }

    #[inline]
    pub const fn update(&mut self, data: &[u8]) {
        self.value = crc16_ccitt(self.value, data);
    }

    #[inline]
    #[must_use]
    pub const fn value(&self) -> u16 {
        self.value
    }
}
