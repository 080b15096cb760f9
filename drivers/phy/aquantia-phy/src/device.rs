use crate::boot::{BootConfig, BootOutcome, BootSequencer};
use crate::error::PhyError;
use crate::mdio::{BusError, MdioBus, Mmd};
use crate::models::{self, PhyModel};
use crate::regs::{
    FirmwareId, GeneralStatus2, GlobalSystemControl, LoadRegister, ReservedStatus1,
    VendorRegister,
};
use core::fmt;
use driver_firmware::{FirmwareChain, FirmwareStore, NvmemCell};
use driver_sync::TicketMutex;
use driver_sync::poll::{PollConfig, PollError, try_poll_until};
use std::sync::Arc;

/// What [`AquantiaPhy::probe`] did.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ProbeOutcome {
    /// The model runs from its own flash; nothing to download.
    NoDownload,
    /// No firmware source delivered an image. The PHY is left as is.
    FirmwareMissing,
    Boot(BootOutcome),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ChipInfo {
    pub firmware: FirmwareId,
    pub build_id: u8,
    pub provisioning_id: u8,
}

impl fmt::Display for ChipInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FW {}.{}, Build {}, Provisioning {}",
            self.firmware.major(),
            self.firmware.minor(),
            self.build_id,
            self.provisioning_id
        )
    }
}

/// One Aquantia PHY on an MDIO bus.
///
/// All register sequences take the bus lock for their whole duration, so a
/// firmware download never interleaves with status reads of another thread.
pub struct AquantiaPhy<B: MdioBus> {
    model: &'static PhyModel,
    bus: TicketMutex<B>,
    config: BootConfig,
    firmware_store: Option<Arc<dyn FirmwareStore>>,
    nvmem_cell: Option<Arc<dyn NvmemCell>>,
}

impl<B: MdioBus> AquantiaPhy<B> {
    /// # Errors
    /// [`PhyError::UnknownModel`] if `phy_id` matches no supported model.
    pub fn new(phy_id: u32, bus: B, config: BootConfig) -> Result<Self, PhyError> {
        let model = models::lookup(phy_id).ok_or(PhyError::UnknownModel(phy_id))?;
        Ok(Self {
            model,
            bus: TicketMutex::new(bus),
            config,
            firmware_store: None,
            nvmem_cell: None,
        })
    }

    /// Where the model's firmware file is looked up.
    #[must_use]
    pub fn with_firmware_store(mut self, store: Arc<dyn FirmwareStore>) -> Self {
        self.firmware_store = Some(store);
        self
    }

    /// Tried before the firmware store.
    #[must_use]
    pub fn with_nvmem_cell(mut self, cell: Arc<dyn NvmemCell>) -> Self {
        self.nvmem_cell = Some(cell);
        self
    }

    pub const fn model(&self) -> &'static PhyModel {
        self.model
    }

    pub const fn config(&self) -> &BootConfig {
        &self.config
    }

    /// Run `f` with exclusive access to the bus.
    pub fn with_bus<U>(&self, f: impl FnOnce(&mut B) -> U) -> U {
        self.bus.with_lock(f)
    }

    pub fn into_bus(self) -> B {
        self.bus.into_inner()
    }

    /// Download firmware if the model needs it.
    ///
    /// A missing image is logged and tolerated.
    ///
    /// # Errors
    /// Any [`PhyError`] from the boot sequence other than
    /// [`PhyError::FirmwareUnavailable`].
    pub fn probe(&self) -> Result<ProbeOutcome, PhyError> {
        if !self.model.downloads_firmware() {
            log::debug!("{}: no firmware download required", self.model.name);
            return Ok(ProbeOutcome::NoDownload);
        }

        match self.boot() {
            Ok(outcome) => {
                if let BootOutcome::Loaded { version, source } = &outcome {
                    log::info!("{}: loaded firmware '{version}' from {source}", self.model.name);
                }
                Ok(ProbeOutcome::Boot(outcome))
            }
            Err(PhyError::FirmwareUnavailable(e)) => {
                log::warn!("{}: {e}", self.model.name);
                Ok(ProbeOutcome::FirmwareMissing)
            }
            Err(e) => {
                log::error!("{}: firmware boot failed: {e}", self.model.name);
                Err(e)
            }
        }
    }

    /// Run the boot sequence against the configured firmware sources.
    ///
    /// # Errors
    /// See [`BootSequencer::boot`].
    pub fn boot(&self) -> Result<BootOutcome, PhyError> {
        let mut chain = FirmwareChain::new();
        if let Some(cell) = &self.nvmem_cell {
            chain = chain.nvmem(cell.as_ref());
        }
        if let (Some(store), Some(name)) = (&self.firmware_store, self.model.firmware) {
            chain = chain.file(store.as_ref(), name);
        }

        self.bus
            .with_lock(|bus| BootSequencer::new(bus, &self.config).boot(&chain))
    }

    /// Wait for the firmware to come out of reset.
    ///
    /// # Errors
    /// [`PhyError::Timeout`] if `FW_ID` stays zero.
    pub fn wait_reset_complete(&self) -> Result<FirmwareId, PhyError> {
        self.bus.with_lock(|bus| {
            let mut firmware = FirmwareId::new();
            wait_for(bus, &self.config.reset_complete, "reset complete", |bus| {
                firmware = FirmwareId::load(bus)?;
                Ok(firmware.is_running())
            })?;
            Ok(firmware)
        })
    }

    /// # Errors
    /// Bus failures.
    pub fn chip_info(&self) -> Result<ChipInfo, PhyError> {
        let info = self.bus.with_lock(|bus| -> Result<_, BusError> {
            let firmware = FirmwareId::load(bus)?;
            let status = ReservedStatus1::load(bus)?;
            Ok(ChipInfo {
                firmware,
                build_id: status.build_id(),
                provisioning_id: status.provisioning_id(),
            })
        })?;
        log::info!("{}: {info}", self.model.name);
        Ok(info)
    }

    /// Enter low-power mode. A no-op for models without it.
    ///
    /// # Errors
    /// Bus failures, or [`PhyError::Timeout`] if the processor stays busy.
    pub fn suspend(&self) -> Result<(), PhyError> {
        self.set_low_power(true)
    }

    /// Leave low-power mode. A no-op for models without it.
    ///
    /// # Errors
    /// Bus failures, or [`PhyError::Timeout`] if the processor stays busy.
    pub fn resume(&self) -> Result<(), PhyError> {
        self.set_low_power(false)
    }

    fn set_low_power(&self, enable: bool) -> Result<(), PhyError> {
        if !self.model.low_power {
            return Ok(());
        }

        let bit = GlobalSystemControl::new().with_low_power(true).into_bits();
        self.bus.with_lock(|bus| {
            if enable {
                bus.set_bits(Mmd::Vend1, GlobalSystemControl::ADDR, bit)?;
            } else {
                bus.clear_bits(Mmd::Vend1, GlobalSystemControl::ADDR, bit)?;
            }
            wait_for(bus, &self.config.op_in_progress, "processor operation", |bus| {
                Ok(!GeneralStatus2::load(bus)?.op_in_progress())
            })
        })?;

        log::debug!("{}: low power {}", self.model.name, if enable { "on" } else { "off" });
        Ok(())
    }
}

fn wait_for<B: MdioBus>(
    bus: &mut B,
    poll: &PollConfig,
    what: &'static str,
    mut done: impl FnMut(&mut B) -> Result<bool, BusError>,
) -> Result<(), PhyError> {
    match try_poll_until(poll, || done(bus)) {
        Ok(_) => Ok(()),
        Err(PollError::Timeout(source)) => {
            log::warn!("timed out waiting for {what}");
            Err(PhyError::Timeout { what, source })
        }
        Err(PollError::Check(e)) => Err(e.into()),
    }
}
