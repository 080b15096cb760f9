//! # Boot Mailbox
//!
//! Pushes a memory segment into the PHY processor one 32-bit word at a time:
//!
//! 1. `IF1 ← CRC_RESET`, `IF3 ← addr >> 16`, `IF4 ← addr & 0xfffc`
//! 2. per word: `IF5 ← hi`, `IF6 ← lo`, `IF1 ← EXECUTE | WRITE`
//! 3. `IF2` must match the CRC16 of all transferred words (big endian).
//!
//! The PHY auto-increments the target address after every word.

use crate::mdio::{BusError, MdioBus, Mmd};
use crate::regs::{
    MAILBOX_INTERFACE2, MAILBOX_INTERFACE3, MAILBOX_INTERFACE4, MAILBOX_INTERFACE5,
    MAILBOX_INTERFACE6, MailboxCommand, StoreRegister, VendorRegister,
};
use crc16_ccitt::Crc16;
use driver_sync::poll::{PollConfig, PollError, PollTimeout, try_poll_until};

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct MailboxConfig {
    /// Wait for `IF1.BUSY` to clear after every word. Off by default; the
    /// PHY accepts words back to back.
    pub busy_poll: Option<PollConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("CRC mismatch: calculated 0x{computed:04x} PHY 0x{reported:04x}")]
    CrcMismatch { computed: u16, reported: u16 },
    #[error("mailbox register access failed")]
    Bus(#[from] BusError),
    #[error("mailbox stayed busy")]
    Busy(#[source] PollTimeout),
}

impl From<PollError<BusError>> for TransferError {
    fn from(value: PollError<BusError>) -> Self {
        match value {
            PollError::Timeout(t) => Self::Busy(t),
            PollError::Check(e) => Self::Bus(e),
        }
    }
}

/// Exclusive handle on a PHY's boot mailbox for the duration of a transfer.
pub struct Mailbox<'a, B: MdioBus + ?Sized> {
    bus: &'a mut B,
    config: MailboxConfig,
}

impl<'a, B: MdioBus + ?Sized> Mailbox<'a, B> {
    pub const fn new(bus: &'a mut B, config: MailboxConfig) -> Self {
        Self { bus, config }
    }

    fn write(&mut self, reg: u16, value: u16) -> Result<(), BusError> {
        self.bus.write(Mmd::Vend1, reg, value)
    }

    fn wait_not_busy(&mut self, poll: &PollConfig) -> Result<(), TransferError> {
        let bus = &mut *self.bus;
        try_poll_until(poll, || {
            bus.read(Mmd::Vend1, MailboxCommand::ADDR)
                .map(|raw| !MailboxCommand::from_bits(raw).busy())
        })?;
        Ok(())
    }

    /// Copy `data` to `target_addr` in the PHY processor's address space.
    ///
    /// A trailing partial word is zero padded.
    ///
    /// # Errors
    /// - [`TransferError::CrcMismatch`] if the PHY reports a different CRC.
    /// - [`TransferError::Bus`] on register access failures.
    /// - [`TransferError::Busy`] if busy polling is enabled and times out.
    #[allow(clippy::cast_possible_truncation)]
    pub fn load_segment(&mut self, target_addr: u32, data: &[u8]) -> Result<(), TransferError> {
        MailboxCommand::new()
            .with_crc_reset(true)
            .store(&mut *self.bus)?;
        self.write(MAILBOX_INTERFACE3, (target_addr >> 16) as u16)?;
        self.write(MAILBOX_INTERFACE4, (target_addr & 0xfffc) as u16)?;

        let execute_write = MailboxCommand::new().with_execute(true).with_write(true);
        let mut crc = Crc16::new();

        for chunk in data.chunks(4) {
            let mut bytes = [0u8; 4];
            bytes[..chunk.len()].copy_from_slice(chunk);
            let word = u32::from_le_bytes(bytes);

            self.write(MAILBOX_INTERFACE5, (word >> 16) as u16)?;
            self.write(MAILBOX_INTERFACE6, (word & 0xffff) as u16)?;
            execute_write.store(&mut *self.bus)?;

            if let Some(poll) = self.config.busy_poll {
                self.wait_not_busy(&poll)?;
            }

            crc.update(&word.to_be_bytes());
        }

        let computed = crc.value();
        let reported = self.bus.read(Mmd::Vend1, MAILBOX_INTERFACE2)?;
        if computed != reported {
            log::error!("CRC mismatch: calculated 0x{computed:04x} PHY 0x{reported:04x}");
            return Err(TransferError::CrcMismatch { computed, reported });
        }

        log::debug!(
            "loaded {} bytes to 0x{target_addr:08x}, CRC 0x{computed:04x}",
            data.len()
        );
        Ok(())
    }
}
