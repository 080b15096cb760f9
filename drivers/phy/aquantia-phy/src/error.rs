use crate::mailbox::TransferError;
use crate::mdio::BusError;
use cld_image::{ParseError, Region};
use driver_firmware::FirmwareUnavailable;
use driver_sync::poll::PollTimeout;

#[derive(Debug, thiserror::Error)]
pub enum PhyError {
    #[error("unsupported PHY id 0x{0:08x}")]
    UnknownModel(u32),
    #[error(transparent)]
    FirmwareUnavailable(#[from] FirmwareUnavailable),
    #[error("invalid firmware image")]
    Image(#[from] ParseError),
    #[error("failed to load {segment}")]
    Transfer {
        segment: Region,
        #[source]
        source: TransferError,
    },
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("timed out waiting for {what}")]
    Timeout {
        what: &'static str,
        #[source]
        source: PollTimeout,
    },
}

impl PhyError {
    #[must_use]
    pub const fn is_firmware_unavailable(&self) -> bool {
        matches!(self, Self::FirmwareUnavailable(_))
    }
}
