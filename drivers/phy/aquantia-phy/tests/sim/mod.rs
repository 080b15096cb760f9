//! A register-level PHY model that emulates the boot mailbox.
#![allow(dead_code)]

use aquantia_phy::regs::{
    GLOBAL_CONTROL2, GLOBAL_FW_ID, GLOBAL_GEN_STAT2, MAILBOX_INTERFACE1, MAILBOX_INTERFACE2,
    MAILBOX_INTERFACE3, MAILBOX_INTERFACE4, MAILBOX_INTERFACE5, MAILBOX_INTERFACE6,
};
use aquantia_phy::{BusError, MdioBus, Mmd};
use crc16_ccitt::crc16_ccitt;
use std::collections::BTreeMap;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Access {
    Read(Mmd, u16),
    Write(Mmd, u16, u16),
}

#[derive(Debug, Default)]
pub struct SimPhy {
    regs: BTreeMap<(Mmd, u16), u16>,
    pub log: Vec<Access>,
    crc: u16,
    addr: u32,
    /// Words written through the mailbox, by target address.
    pub memory: BTreeMap<u32, u32>,
    /// Report a CRC that is off by one bit.
    pub corrupt_crc: bool,
    /// `FW_ID` value the processor reports once released from reset.
    pub firmware_on_release: Option<u16>,
    /// `GEN_STAT2` reads that still report an operation in progress.
    pub busy_stat_reads: u32,
    /// `IF1` reads that still report the mailbox busy.
    pub busy_mailbox_reads: u32,
    in_reset: bool,
}

impl SimPhy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_register(mut self, mmd: Mmd, reg: u16, value: u16) -> Self {
        self.regs.insert((mmd, reg), value);
        self
    }

    pub fn register(&self, mmd: Mmd, reg: u16) -> u16 {
        self.regs.get(&(mmd, reg)).copied().unwrap_or(0)
    }

    pub fn writes(&self) -> Vec<(Mmd, u16, u16)> {
        self.log
            .iter()
            .filter_map(|a| match *a {
                Access::Write(m, r, v) => Some((m, r, v)),
                Access::Read(..) => None,
            })
            .collect()
    }

    pub fn writes_to(&self, reg: u16) -> Vec<u16> {
        self.writes()
            .into_iter()
            .filter(|&(m, r, _)| m == Mmd::Vend1 && r == reg)
            .map(|(_, _, v)| v)
            .collect()
    }

    pub fn reads_of(&self, reg: u16) -> usize {
        self.log
            .iter()
            .filter(|a| matches!(a, Access::Read(Mmd::Vend1, r) if *r == reg))
            .count()
    }

    /// Bytes stored from `addr` on, little endian per word.
    pub fn bytes_at(&self, addr: u32, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        let mut a = addr;
        while out.len() < len {
            let word = self.memory.get(&a).copied().unwrap_or(0);
            out.extend_from_slice(&word.to_le_bytes());
            a += 4;
        }
        out.truncate(len);
        out
    }

    fn mailbox_command(&mut self, value: u16) {
        if value & 0x1000 != 0 {
            self.crc = 0;
        }
        if value & 0xC000 == 0xC000 {
            let hi = u32::from(self.register(Mmd::Vend1, MAILBOX_INTERFACE5));
            let lo = u32::from(self.register(Mmd::Vend1, MAILBOX_INTERFACE6));
            let word = (hi << 16) | lo;
            self.crc = crc16_ccitt(self.crc, &word.to_be_bytes());
            self.memory.insert(self.addr, word);
            self.addr += 4;
        }
    }
}

impl MdioBus for SimPhy {
    fn read(&mut self, mmd: Mmd, reg: u16) -> Result<u16, BusError> {
        self.log.push(Access::Read(mmd, reg));
        if mmd != Mmd::Vend1 {
            return Ok(self.register(mmd, reg));
        }
        let value = match reg {
            MAILBOX_INTERFACE2 => {
                if self.corrupt_crc {
                    self.crc ^ 0x0001
                } else {
                    self.crc
                }
            }
            MAILBOX_INTERFACE1 if self.busy_mailbox_reads > 0 => {
                self.busy_mailbox_reads -= 1;
                0x0100
            }
            GLOBAL_GEN_STAT2 if self.busy_stat_reads > 0 => {
                self.busy_stat_reads -= 1;
                0x8000
            }
            _ => self.register(mmd, reg),
        };
        Ok(value)
    }

    fn write(&mut self, mmd: Mmd, reg: u16, value: u16) -> Result<(), BusError> {
        self.log.push(Access::Write(mmd, reg, value));
        if mmd == Mmd::Vend1 {
            match reg {
                MAILBOX_INTERFACE1 => {
                    self.mailbox_command(value);
                    return Ok(());
                }
                MAILBOX_INTERFACE3 => {
                    self.addr = (u32::from(value) << 16) | (self.addr & 0xffff);
                }
                MAILBOX_INTERFACE4 => {
                    self.addr = (self.addr & 0xffff_0000) | u32::from(value);
                }
                GLOBAL_CONTROL2 => {
                    if value & 0x8000 != 0 {
                        self.in_reset = true;
                    } else if self.in_reset && value & 0x0001 == 0 {
                        self.in_reset = false;
                        if let Some(fw) = self.firmware_on_release {
                            self.regs.insert((Mmd::Vend1, GLOBAL_FW_ID), fw);
                        }
                    }
                }
                _ => {}
            }
        }
        self.regs.insert((mmd, reg), value);
        Ok(())
    }
}

/// A bus that answers nothing.
#[derive(Debug, Default)]
pub struct DeadBus;

impl MdioBus for DeadBus {
    fn read(&mut self, mmd: Mmd, reg: u16) -> Result<u16, BusError> {
        Err(BusError::NoResponse { mmd, reg })
    }

    fn write(&mut self, mmd: Mmd, reg: u16, _value: u16) -> Result<(), BusError> {
        Err(BusError::WriteRejected { mmd, reg })
    }
}
