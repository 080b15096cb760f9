//! Collaborators supplied by the host platform.

use crate::error::{ClockError, DoorbellError, IrqError, SecureCallError};
use driver_firmware::FirmwareStore;
use std::sync::Arc;

/// One segment handed to the secure PD segment loader.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PdSegment<'a> {
    pub pd_asid: u8,
    /// Program header index.
    pub index: usize,
    pub paddr: u64,
    /// Segment contents, zero extended to the memory size.
    pub data: &'a [u8],
}

/// TrustZone peripheral authentication service.
pub trait SecureMonitor: Send + Sync {
    /// # Errors
    /// The call was refused.
    fn pas_init_image(&self, pas: u32, metadata: &[u8]) -> Result<(), SecureCallError>;
    /// # Errors
    /// The call was refused.
    fn pas_mem_setup(&self, pas: u32, addr: u64, size: u64) -> Result<(), SecureCallError>;
    /// # Errors
    /// The call was refused.
    fn pas_auth_and_reset(&self, pas: u32) -> Result<(), SecureCallError>;
    /// # Errors
    /// The call was refused.
    fn pas_shutdown(&self, pas: u32) -> Result<(), SecureCallError>;
    /// # Errors
    /// The call was refused.
    fn int_radio_powerup(&self, pas: u32) -> Result<(), SecureCallError>;
    /// # Errors
    /// The call was refused.
    fn int_radio_powerdown(&self, pas: u32) -> Result<(), SecureCallError>;
    /// # Errors
    /// The call was refused.
    fn pd_segment_load(&self, pas: u32, segment: PdSegment<'_>) -> Result<(), SecureCallError>;
}

pub trait Clock: Send + Sync {
    fn name(&self) -> &str;
    /// # Errors
    /// The clock could not be enabled.
    fn prepare_enable(&self) -> Result<(), ClockError>;
    fn disable_unprepare(&self);
    /// # Errors
    /// The rate is not supported.
    fn set_rate(&self, hz: u64) -> Result<(), ClockError>;
}

/// Called from interrupt context; must not block.
pub type IrqHandler = Arc<dyn Fn() + Send + Sync>;

pub trait InterruptController: Send + Sync {
    /// # Errors
    /// The line could not be claimed.
    fn request_irq(&self, number: u32, name: &str, handler: IrqHandler) -> Result<(), IrqError>;
    fn free_irq(&self, number: u32);
}

/// Looks up a node's interrupt lines by name.
pub trait IrqResolver: Send + Sync {
    fn irq_by_name(&self, name: &str) -> Option<u32>;
}

/// An outbound SMEM state word.
pub trait SmemState: Send + Sync {
    /// # Errors
    /// The state could not be updated.
    fn update_bits(&self, mask: u32, value: u32) -> Result<(), DoorbellError>;
}

/// Looks up a node's outbound SMEM states by name.
pub trait SmemStateProvider: Send + Sync {
    /// The state and the bit within it.
    fn state(&self, name: &str) -> Option<(Arc<dyn SmemState>, u32)>;
}

/// Shared memory items written by the remote.
pub trait SmemItems: Send + Sync {
    fn get(&self, item: u32) -> Option<Vec<u8>>;
}

/// Subsystem restart notifications.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SsrEvent {
    BeforePowerup,
    AfterPowerup,
    BeforeShutdown,
    AfterShutdown,
}

pub trait SsrNotifier: Send + Sync {
    fn notify(&self, subsystem: &str, event: SsrEvent, crashed: bool);
}

/// Everything a [`crate::DomainRegistry`] talks to besides the domain nodes.
#[derive(Clone)]
pub struct Platform {
    pub secure: Arc<dyn SecureMonitor>,
    pub firmware: Arc<dyn FirmwareStore>,
    pub interrupts: Arc<dyn InterruptController>,
    pub smem: Arc<dyn SmemItems>,
    pub notifier: Option<Arc<dyn SsrNotifier>>,
}
