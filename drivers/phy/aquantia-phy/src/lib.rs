//! # Aquantia PHY core
//!
//! Firmware download and power management for Aquantia / Marvell multi-gigabit
//! Ethernet PHYs. The host supplies clause-45 register access through
//! [`MdioBus`] and firmware through [`driver_firmware`] sources; this crate
//! owns the boot mailbox protocol and the register sequences around it.
//!
//! ```no_run
//! # use aquantia_phy::{AquantiaPhy, BootConfig, MdioBus};
//! # use driver_firmware::DirectoryStore;
//! # use std::sync::Arc;
//! # fn demo(bus: impl MdioBus) -> Result<(), aquantia_phy::PhyError> {
//! let phy = AquantiaPhy::new(0x31c3_1c12, bus, BootConfig::default())?
//!     .with_firmware_store(Arc::new(DirectoryStore::new("/lib/firmware")));
//! phy.probe()?;
//! phy.wait_reset_complete()?;
//! println!("{}", phy.chip_info()?);
//! # Ok(())
//! # }
//! ```

mod boot;
mod device;
mod error;
pub mod mailbox;
pub mod mdio;
pub mod models;
pub mod regs;

pub use boot::{BootConfig, BootOutcome, BootSequencer, MAX_RESET_HOLD, MIN_RESET_HOLD};
pub use device::{AquantiaPhy, ChipInfo, ProbeOutcome};
pub use error::PhyError;
pub use mailbox::{Mailbox, MailboxConfig, TransferError};
pub use mdio::{BusError, MdioBus, Mmd};
pub use models::{PhyModel, lookup};
