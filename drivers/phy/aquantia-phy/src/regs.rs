//! # Typed VEND1 Registers
//!
//! The global vendor registers used for firmware download, boot control and
//! power management. Registers that carry fields are modelled as bitfields
//! with load/store through an [`MdioBus`]; the plain 16-bit mailbox data
//! registers are addressed by constant.

use crate::mdio::{BusError, MdioBus, Mmd};
use bitfield_struct::bitfield;

/// Mailbox command/status (`IF1`).
pub const MAILBOX_INTERFACE1: u16 = 0x0200;
/// Running CRC reported by the PHY processor (`IF2`).
pub const MAILBOX_INTERFACE2: u16 = 0x0201;
/// Target address, high half (`IF3`).
pub const MAILBOX_INTERFACE3: u16 = 0x0202;
/// Target address, low half, word aligned (`IF4`).
pub const MAILBOX_INTERFACE4: u16 = 0x0203;
/// Data word, high half (`IF5`).
pub const MAILBOX_INTERFACE5: u16 = 0x0204;
/// Data word, low half (`IF6`).
pub const MAILBOX_INTERFACE6: u16 = 0x0205;

pub const GLOBAL_SYSTEM_CONTROL: u16 = 0x0000;
pub const GLOBAL_FW_ID: u16 = 0x0020;
pub const GLOBAL_CONTROL2: u16 = 0xc001;
pub const GLOBAL_GEN_STAT2: u16 = 0xc831;
pub const GLOBAL_RSVD_STAT1: u16 = 0xc885;

/// A register in the VEND1 MMD with a typed representation.
pub trait VendorRegister: Sized {
    const ADDR: u16;

    fn from_raw(raw: u16) -> Self;
    fn into_raw(self) -> u16;
}

pub trait LoadRegister: Sized {
    /// # Errors
    /// Any bus-level failure.
    fn load<B: MdioBus + ?Sized>(bus: &mut B) -> Result<Self, BusError>;
}

pub trait StoreRegister {
    /// # Errors
    /// Any bus-level failure.
    fn store<B: MdioBus + ?Sized>(self, bus: &mut B) -> Result<(), BusError>;
}

impl<T> LoadRegister for T
where
    T: VendorRegister,
{
    #[inline]
    fn load<B: MdioBus + ?Sized>(bus: &mut B) -> Result<Self, BusError> {
        bus.read(Mmd::Vend1, T::ADDR).map(T::from_raw)
    }
}

impl<T> StoreRegister for T
where
    T: VendorRegister,
{
    #[inline]
    fn store<B: MdioBus + ?Sized>(self, bus: &mut B) -> Result<(), BusError> {
        bus.write(Mmd::Vend1, T::ADDR, self.into_raw())
    }
}

macro_rules! vendor_register {
    ($ty:ty, $addr:expr) => {
        impl VendorRegister for $ty {
            const ADDR: u16 = $addr;

            #[inline]
            fn from_raw(raw: u16) -> Self {
                Self::from_bits(raw)
            }

            #[inline]
            fn into_raw(self) -> u16 {
                self.into_bits()
            }
        }
    };
}

/// Mailbox interface 1: command and status.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct MailboxCommand {
    #[bits(8)]
    __: u8,
    /// Bit 8 — a transfer is still being processed.
    pub busy: bool,
    #[bits(3)]
    __: u8,
    /// Bit 12 — restart the PHY's running CRC.
    pub crc_reset: bool,
    #[bits(1)]
    __: u8,
    /// Bit 14 — the command is a write.
    pub write: bool,
    /// Bit 15 — execute the command.
    pub execute: bool,
}
vendor_register!(MailboxCommand, MAILBOX_INTERFACE1);

/// Processor run control.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct GlobalControl2 {
    /// Bit 0 — stall the embedded processor.
    pub up_run_stall: bool,
    #[bits(5)]
    __: u8,
    /// Bit 6 — the stall bit overrides the boot strap.
    pub up_run_stall_override: bool,
    #[bits(8)]
    __: u8,
    /// Bit 15 — hold the processor in reset.
    pub up_run_stall_reset: bool,
}
vendor_register!(GlobalControl2, GLOBAL_CONTROL2);

impl GlobalControl2 {
    /// Stalled, with the override in effect.
    #[must_use]
    pub const fn stalled() -> Self {
        Self::new()
            .with_up_run_stall(true)
            .with_up_run_stall_override(true)
    }

    /// Stalled and held in reset.
    #[must_use]
    pub const fn stalled_in_reset() -> Self {
        Self::stalled().with_up_run_stall_reset(true)
    }

    /// Running: only the override remains set.
    #[must_use]
    pub const fn released() -> Self {
        Self::new().with_up_run_stall_override(true)
    }
}

/// Global system control (aliases `MDIO_CTRL1` of the VEND1 MMD).
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct GlobalSystemControl {
    #[bits(11)]
    __: u16,
    /// Bit 11 — low power mode.
    pub low_power: bool,
    #[bits(3)]
    __: u8,
    /// Bit 15 — soft reset.
    pub soft_reset: bool,
}
vendor_register!(GlobalSystemControl, GLOBAL_SYSTEM_CONTROL);

/// Version of the running firmware; zero while no firmware runs.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct FirmwareId {
    pub minor: u8,
    pub major: u8,
}
vendor_register!(FirmwareId, GLOBAL_FW_ID);

impl FirmwareId {
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.into_bits() != 0
    }
}

#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct ReservedStatus1 {
    #[bits(4)]
    pub provisioning_id: u8,
    #[bits(4)]
    pub build_id: u8,
    #[bits(8)]
    __: u8,
}
vendor_register!(ReservedStatus1, GLOBAL_RSVD_STAT1);

#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct GeneralStatus2 {
    #[bits(15)]
    __: u16,
    /// Bit 15 — a processor-intensive operation is in progress.
    pub op_in_progress: bool,
}
vendor_register!(GeneralStatus2, GLOBAL_GEN_STAT2);
