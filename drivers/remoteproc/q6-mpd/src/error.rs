use crate::registry::DomainId;
use driver_firmware::FetchError;
use mdt_image::MdtError;
use std::time::Duration;

/// A privileged (TrustZone) call was refused.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("secure call {call} for PAS {pas} failed with {code}")]
pub struct SecureCallError {
    pub call: &'static str,
    pub pas: u32,
    pub code: i32,
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("clock {clock}: {reason}")]
pub struct ClockError {
    pub clock: String,
    pub reason: String,
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("failed to update {doorbell} doorbell: {reason}")]
pub struct DoorbellError {
    pub doorbell: String,
    pub reason: String,
}

impl DoorbellError {
    pub fn new(doorbell: &str, reason: impl Into<String>) -> Self {
        Self {
            doorbell: doorbell.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("interrupt {number}: {reason}")]
pub struct IrqError {
    pub number: u32,
    pub reason: String,
}

/// How a rendezvous wait failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum WaitError {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("remote crashed")]
    Crashed,
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum TimeoutError {
    #[error("{domain}: start timed out after {timeout:?}")]
    Start { domain: String, timeout: Duration },
    #[error("{domain}: stop timed out after {timeout:?}")]
    Stop { domain: String, timeout: Duration },
    #[error("{domain}: spawn timed out after {timeout:?}")]
    Spawn { domain: String, timeout: Duration },
}

/// Probe-time configuration problems.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("no descriptor for compatible '{0}'")]
    UnknownCompatible(String),
    #[error("{node}: no firmware-name given")]
    MissingFirmwareName { node: String },
    #[error("{node}: {count} firmware names given, at most {max} supported")]
    TooManyFirmwareNames {
        node: String,
        count: usize,
        max: usize,
    },
    #[error("{node}: cannot parse PD ASID from node name")]
    BadAsid { node: String },
    #[error("{node}: unable to acquire memory-region")]
    MissingMemoryRegion { node: String },
    #[error("{node}: dependent domain without a parent")]
    MissingParent { node: String },
    #[error("{node}: parent {parent} is not a root domain")]
    ParentNotRoot { node: String, parent: DomainId },
    #[error("{node}: failed to retrieve {line} IRQ")]
    MissingInterrupt { node: String, line: &'static str },
    #[error("{node}: failed to acquire {doorbell} state")]
    MissingDoorbell { node: String, doorbell: &'static str },
    #[error("failed to acquire {name} irq")]
    IrqRequest {
        name: String,
        #[source]
        source: IrqError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RprocError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unknown domain {0}")]
    UnknownDomain(DomainId),
    #[error("{id} still has dependent domains")]
    HasDependents { id: DomainId },
    #[error("failed to request firmware")]
    Firmware(#[from] FetchError),
    #[error("{name}: invalid image")]
    Image {
        name: String,
        #[source]
        source: MdtError,
    },
    #[error("{name}: segment {index} has {actual} bytes, expected {expected}")]
    SegmentFileSize {
        name: String,
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Secure(#[from] SecureCallError),
    #[error(transparent)]
    Clock(#[from] ClockError),
    #[error(transparent)]
    Doorbell(#[from] DoorbellError),
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}
