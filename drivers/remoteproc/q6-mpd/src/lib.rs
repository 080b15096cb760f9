//! # Q6 multi-PD remote processor
//!
//! Loads and runs the WCSS firmware on a Hexagon Q6 that hosts one root
//! protection domain and any number of user PDs:
//!
//! - the root owns the reserved memory and the Q6 reset, and is brought up
//!   through the secure monitor's peripheral authentication service;
//! - user PDs (dependents) boot their root first, then optionally load their
//!   own segments and run a spawn handshake.
//!
//! All domains live in one [`DomainRegistry`]. The host wires in hardware
//! through the traits in [`platform`] and describes each domain with a
//! [`DomainNode`].
//!
//! ```no_run
//! # use q6_mpd::{DomainNode, DomainRegistry, Platform, ReservedMemory, Timeouts};
//! # fn demo(platform: Platform, memory: ReservedMemory) -> Result<(), q6_mpd::RprocError> {
//! let registry = DomainRegistry::new(platform, Timeouts::default());
//! let root = registry.probe(
//!     DomainNode::new("q6v5_wcss", "qcom,ipq5018-q6-mpd")
//!         .firmware("ath11k/IPQ5018/q6_fw.mdt")
//!         .memory_region(memory),
//! )?;
//! let pd = registry.probe(
//!     DomainNode::new("pd-1", "qcom,ipq9574-wcss-ahb-mpd")
//!         .firmware("ath11k/IPQ5018/q6_fw.mdt")
//!         .parent(root),
//! )?;
//! registry.boot(pd)?;
//! registry.shutdown(pd)?;
//! # Ok(())
//! # }
//! ```

pub mod descriptor;
mod domain;
mod error;
pub mod mdt_loader;
pub mod memory;
mod node;
pub mod platform;
mod registry;
mod root;
pub mod signals;
mod userpd;

pub use descriptor::{PdLoader, Role, WcssDescriptor};
pub use domain::{CrashInfo, Lifecycle, PdState};
pub use error::{
    ClockError, ConfigError, DoorbellError, IrqError, RprocError, SecureCallError, TimeoutError,
    WaitError,
};
pub use memory::{HeapRegion, MemoryRegion, MemoryWindow, ReservedMemory};
pub use node::{DomainNode, Timeouts, parse_pd_asid};
pub use platform::{
    Clock, InterruptController, IrqHandler, IrqResolver, PdSegment, Platform, SecureMonitor,
    SmemItems, SmemState, SmemStateProvider, SsrEvent, SsrNotifier,
};
pub use registry::{DomainId, DomainRegistry};
