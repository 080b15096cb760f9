//! Per-instance probe configuration.

use crate::error::ConfigError;
use crate::memory::ReservedMemory;
use crate::platform::{Clock, IrqResolver, SmemStateProvider};
use crate::registry::DomainId;
use std::sync::Arc;
use std::time::Duration;

/// What the platform knows about one domain node.
#[derive(Clone, Default)]
pub struct DomainNode {
    /// Node name; a `pdN` / `pd-N` component selects the PD ASID.
    pub name: String,
    pub compatible: String,
    /// Primary image first, then optional extra segment files.
    pub firmware: Vec<String>,
    /// Roots only.
    pub memory_region: Option<ReservedMemory>,
    /// Roots only; needed by some SoCs to boot the Q6.
    pub prng_clock: Option<Arc<dyn Clock>>,
    pub interrupts: Option<Arc<dyn IrqResolver>>,
    pub smem_states: Option<Arc<dyn SmemStateProvider>>,
    /// Dependents only.
    pub parent: Option<DomainId>,
}

impl DomainNode {
    pub fn new(name: &str, compatible: &str) -> Self {
        Self {
            name: name.to_string(),
            compatible: compatible.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn firmware(mut self, name: &str) -> Self {
        self.firmware.push(name.to_string());
        self
    }

    #[must_use]
    pub fn memory_region(mut self, memory: ReservedMemory) -> Self {
        self.memory_region = Some(memory);
        self
    }

    #[must_use]
    pub fn prng_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.prng_clock = Some(clock);
        self
    }

    #[must_use]
    pub fn interrupts(mut self, resolver: Arc<dyn IrqResolver>) -> Self {
        self.interrupts = Some(resolver);
        self
    }

    #[must_use]
    pub fn smem_states(mut self, provider: Arc<dyn SmemStateProvider>) -> Self {
        self.smem_states = Some(provider);
        self
    }

    #[must_use]
    pub const fn parent(mut self, parent: DomainId) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// PD ASID encoded in a node name: `pd3` and `pd-3` both give 3, a name
/// without `pd` gives 0.
///
/// # Errors
/// [`ConfigError::BadAsid`] if `pd` is not followed by a number that fits `i8`.
pub fn parse_pd_asid(name: &str) -> Result<i8, ConfigError> {
    let Some(pos) = name.find("pd") else {
        return Ok(0);
    };
    let rest = &name[pos + 2..];
    let digits = rest.strip_prefix(['-', '_']).unwrap_or(rest);

    match digits.parse::<i8>() {
        Ok(asid) if asid >= 0 => Ok(asid),
        _ => Err(ConfigError::BadAsid {
            node: name.to_string(),
        }),
    }
}

/// Bounded waits of the lifecycle operations.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Timeouts {
    /// Root: ready after authenticate-and-reset.
    pub start: Duration,
    /// Dependent: spawn acknowledgement.
    pub spawn: Duration,
    /// Dependent: ready after the spawn acknowledgement.
    pub pd_start: Duration,
    /// Stop acknowledgement.
    pub stop: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            start: Duration::from_secs(5),
            spawn: Duration::from_secs(5),
            pd_start: Duration::from_secs(10),
            stop: Duration::from_secs(5),
        }
    }
}
