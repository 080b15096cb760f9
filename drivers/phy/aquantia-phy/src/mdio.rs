//! Clause-45 MDIO access, as provided by the host's bus driver.

use core::fmt;

/// MDIO manageable device.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum Mmd {
    Pma = 1,
    Pcs = 3,
    PhyXs = 4,
    An = 7,
    Vend1 = 30,
}

impl fmt::Display for Mmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pma => "PMA",
            Self::Pcs => "PCS",
            Self::PhyXs => "PHYXS",
            Self::An => "AN",
            Self::Vend1 => "VEND1",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum BusError {
    #[error("no response reading {mmd} register 0x{reg:04x}")]
    NoResponse { mmd: Mmd, reg: u16 },
    #[error("write to {mmd} register 0x{reg:04x} was not acknowledged")]
    WriteRejected { mmd: Mmd, reg: u16 },
    #[error("MDIO bus fault: {0}")]
    Fault(String),
}

/// 16-bit register access to one PHY.
pub trait MdioBus: Send {
    /// # Errors
    /// Any bus-level failure.
    fn read(&mut self, mmd: Mmd, reg: u16) -> Result<u16, BusError>;

    /// # Errors
    /// Any bus-level failure.
    fn write(&mut self, mmd: Mmd, reg: u16, value: u16) -> Result<(), BusError>;

    /// Read-modify-write: clear `mask`, then set `set`.
    ///
    /// # Errors
    /// Any bus-level failure.
    fn modify(&mut self, mmd: Mmd, reg: u16, mask: u16, set: u16) -> Result<(), BusError> {
        let old = self.read(mmd, reg)?;
        let new = (old & !mask) | set;
        if new != old {
            self.write(mmd, reg, new)?;
        }
        Ok(())
    }

    /// # Errors
    /// Any bus-level failure.
    fn set_bits(&mut self, mmd: Mmd, reg: u16, bits: u16) -> Result<(), BusError> {
        self.modify(mmd, reg, 0, bits)
    }

    /// # Errors
    /// Any bus-level failure.
    fn clear_bits(&mut self, mmd: Mmd, reg: u16, bits: u16) -> Result<(), BusError> {
        self.modify(mmd, reg, bits, 0)
    }
}

impl<B: MdioBus + ?Sized> MdioBus for &mut B {
    fn read(&mut self, mmd: Mmd, reg: u16) -> Result<u16, BusError> {
        (**self).read(mmd, reg)
    }

    fn write(&mut self, mmd: Mmd, reg: u16, value: u16) -> Result<(), BusError> {
        (**self).write(mmd, reg, value)
    }
}
