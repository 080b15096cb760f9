use crate::descriptor::WcssDescriptor;
use crate::memory::MemoryWindow;
use crate::platform::{Clock, SmemItems};
use crate::registry::DomainId;
use crate::signals::{Event, Rendezvous};
use driver_sync::SpinLock;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Where a domain is in its boot/stop cycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Lifecycle {
    Offline,
    /// Firmware is being loaded or the domain is waiting to come up.
    Preparing,
    Running,
    Stopping,
    /// The remote reported a fatal error.
    Crashed,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Offline => "offline",
            Self::Preparing => "preparing",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Crashed => "crashed",
        };
        f.write_str(s)
    }
}

/// Whether a dependent's firmware is still in place.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PdState {
    Normal,
    /// The dependent was stopped on its own; its segments must be reloaded.
    Shutdown,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CrashInfo {
    pub crashed: bool,
    pub reason: Option<String>,
}

/// The part of a domain touched from interrupt context.
pub(crate) struct Core {
    pub name: String,
    pub pd_asid: i8,
    crash_reason_smem: u32,
    smem: Arc<dyn SmemItems>,
    lifecycle: SpinLock<Lifecycle>,
    crash_reason: SpinLock<Option<String>>,
    pub rendezvous: Rendezvous,
}

impl Core {
    pub fn new(
        name: String,
        pd_asid: i8,
        crash_reason_smem: u32,
        smem: Arc<dyn SmemItems>,
        rendezvous: Rendezvous,
    ) -> Self {
        Self {
            name,
            pd_asid,
            crash_reason_smem,
            smem,
            lifecycle: SpinLock::new(Lifecycle::Offline),
            crash_reason: SpinLock::new(None),
            rendezvous,
        }
    }

    /// Interrupt entry point.
    pub fn handle(&self, event: Event) {
        if event == Event::Fatal {
            let reason = self
                .smem
                .get(self.crash_reason_smem)
                .map(|raw| {
                    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                    String::from_utf8_lossy(&raw[..end]).into_owned()
                })
                .filter(|r| !r.is_empty());
            match &reason {
                Some(r) => log::error!("{}: fatal error received: {r}", self.name),
                None => log::error!("{}: fatal error without message", self.name),
            }
            self.lifecycle.with_lock(|l| {
                self.crash_reason.with_lock(|r| *r = reason);
                *l = Lifecycle::Crashed;
            });
        }
        self.rendezvous.post(event);
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.load()
    }

    pub fn set_lifecycle(&self, state: Lifecycle) {
        let previous = self.lifecycle.with_lock(|l| std::mem::replace(l, state));
        if previous != state {
            log::debug!("{}: {previous} -> {state}", self.name);
        }
    }

    /// `Preparing → Running`, unless the domain crashed meanwhile.
    pub fn finish_start(&self) -> Lifecycle {
        self.lifecycle.with_lock(|l| {
            if *l == Lifecycle::Preparing {
                *l = Lifecycle::Running;
            }
            *l
        })
    }

    /// Enter `Preparing` and arm the rendezvous for this start cycle.
    ///
    /// Both happen under the lifecycle lock, so a fatal interrupt that
    /// arrives at any later point aborts the pending waits.
    pub fn begin_start(&self) {
        let previous = self.lifecycle.with_lock(|l| {
            self.crash_reason.with_lock(|r| *r = None);
            self.rendezvous.prepare();
            std::mem::replace(l, Lifecycle::Preparing)
        });
        log::debug!("{}: {previous} -> {}", self.name, Lifecycle::Preparing);
    }

    pub fn crash_info(&self) -> CrashInfo {
        CrashInfo {
            crashed: self.lifecycle() == Lifecycle::Crashed,
            reason: self.crash_reason.with_lock(|r| r.clone()),
        }
    }
}

/// Serialized by [`Domain::op`].
pub(crate) struct OpState {
    /// Outstanding `boot` calls.
    pub power: u32,
    pub window: MemoryWindow,
    pub clock_enabled: bool,
    /// A dependent currently holds a power reference on its root.
    pub root_held: bool,
}

pub(crate) struct Domain {
    pub id: DomainId,
    pub descriptor: &'static WcssDescriptor,
    pub core: Arc<Core>,
    pub firmware: Vec<String>,
    pub prng_clock: Option<Arc<dyn Clock>>,
    pub parent: Option<DomainId>,
    pub irqs: Vec<u32>,
    pub pd_state: SpinLock<PdState>,
    pub op: Mutex<OpState>,
}

impl Domain {
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Name used for restart notifications.
    pub fn subsystem(&self) -> &str {
        self.descriptor.ssr_name.unwrap_or(&self.core.name)
    }

    pub fn primary_firmware(&self) -> &str {
        &self.firmware[0]
    }
}
