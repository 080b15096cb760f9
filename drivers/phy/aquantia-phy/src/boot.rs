//! # Firmware Boot Sequencer
//!
//! Brings the PHY's embedded processor up from a `.cld` image:
//!
//! 1. Skip everything if firmware already runs (`FW_ID != 0`).
//! 2. Fetch the image from the firmware chain and validate it.
//! 3. Stall the processor, push DRAM then IRAM through the mailbox.
//! 4. Clear the global system control register and pulse the processor reset.
//!
//! A failure after step 3 began leaves the processor stalled.

use crate::error::PhyError;
use crate::mailbox::{Mailbox, MailboxConfig};
use crate::mdio::MdioBus;
use crate::regs::{FirmwareId, GlobalControl2, GlobalSystemControl, LoadRegister, StoreRegister};
use cld_image::{DRAM_BASE_ADDR, FirmwareImage, IRAM_BASE_ADDR, Region};
use driver_firmware::FirmwareChain;
use driver_sync::poll::PollConfig;
use std::thread;
use std::time::Duration;

/// Shortest processor reset pulse the PHY accepts.
pub const MIN_RESET_HOLD: Duration = Duration::from_micros(100);
pub const MAX_RESET_HOLD: Duration = Duration::from_micros(200);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct BootConfig {
    /// How long the processor is held in reset after loading.
    pub reset_hold: Duration,
    pub mailbox: MailboxConfig,
    /// Waiting for `FW_ID` to become non-zero after a reset.
    pub reset_complete: PollConfig,
    /// Waiting for a processor-intensive operation to finish.
    pub op_in_progress: PollConfig,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            reset_hold: MIN_RESET_HOLD,
            mailbox: MailboxConfig::default(),
            reset_complete: PollConfig::new(Duration::from_millis(20), Duration::from_secs(2)),
            op_in_progress: PollConfig::new(Duration::from_millis(1), Duration::from_millis(100))
                .with_initial_delay(Duration::from_millis(1)),
        }
    }
}

impl BootConfig {
    /// Set the reset pulse, clamped to what the PHY accepts.
    #[must_use]
    pub fn with_reset_hold(mut self, hold: Duration) -> Self {
        self.reset_hold = hold.clamp(MIN_RESET_HOLD, MAX_RESET_HOLD);
        self
    }

    #[must_use]
    pub const fn with_mailbox(mut self, mailbox: MailboxConfig) -> Self {
        self.mailbox = mailbox;
        self
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BootOutcome {
    /// Firmware was already running; nothing was loaded.
    AlreadyRunning { firmware: FirmwareId },
    Loaded {
        /// Version string embedded in the image.
        version: String,
        /// Where the image came from.
        source: String,
    },
}

pub struct BootSequencer<'a, B: MdioBus + ?Sized> {
    bus: &'a mut B,
    config: &'a BootConfig,
}

impl<'a, B: MdioBus + ?Sized> BootSequencer<'a, B> {
    pub const fn new(bus: &'a mut B, config: &'a BootConfig) -> Self {
        Self { bus, config }
    }

    /// Run the full sequence, fetching the image from `chain` if needed.
    ///
    /// # Errors
    /// - [`PhyError::FirmwareUnavailable`] if no source in `chain` delivered an image.
    /// - [`PhyError::Image`] if the image is malformed; no register was written.
    /// - [`PhyError::Transfer`] if a segment could not be loaded.
    /// - [`PhyError::Bus`] on any other register access failure.
    pub fn boot(&mut self, chain: &FirmwareChain<'_>) -> Result<BootOutcome, PhyError> {
        let firmware = FirmwareId::load(&mut *self.bus)?;
        if firmware.is_running() {
            log::debug!(
                "firmware {}.{} already running, skipping download",
                firmware.major(),
                firmware.minor()
            );
            return Ok(BootOutcome::AlreadyRunning { firmware });
        }

        let image = chain.fetch()?;
        log::debug!("using firmware from {}", image.source);
        let version = self.load(&image.data)?;

        Ok(BootOutcome::Loaded {
            version,
            source: image.source,
        })
    }

    /// Validate `blob`, load it and restart the processor.
    ///
    /// Returns the image's version string.
    ///
    /// # Errors
    /// As for [`BootSequencer::boot`], minus the fetch.
    pub fn load(&mut self, blob: &[u8]) -> Result<String, PhyError> {
        let image = FirmwareImage::parse(blob)?;
        let version = image.version().to_owned();
        log::info!("loading firmware version '{version}'");

        GlobalControl2::stalled().store(&mut *self.bus)?;

        let mut mailbox = Mailbox::new(&mut *self.bus, self.config.mailbox);

        let dram = image.dram();
        log::debug!("loading DRAM 0x{:08x} from offset {}", DRAM_BASE_ADDR, dram.offset);
        mailbox
            .load_segment(DRAM_BASE_ADDR, image.dram_bytes())
            .map_err(|source| PhyError::Transfer {
                segment: Region::Dram,
                source,
            })?;

        let iram = image.iram();
        log::debug!("loading IRAM 0x{:08x} from offset {}", IRAM_BASE_ADDR, iram.offset);
        mailbox
            .load_segment(IRAM_BASE_ADDR, image.iram_bytes())
            .map_err(|source| PhyError::Transfer {
                segment: Region::Iram,
                source,
            })?;

        GlobalSystemControl::new().store(&mut *self.bus)?;
        self.pulse_reset()?;

        Ok(version)
    }

    fn pulse_reset(&mut self) -> Result<(), PhyError> {
        GlobalControl2::stalled_in_reset().store(&mut *self.bus)?;
        thread::sleep(self.config.reset_hold);
        GlobalControl2::released().store(&mut *self.bus)?;
        Ok(())
    }
}
