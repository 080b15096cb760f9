//! # Domain Registry
//!
//! Owns every probed domain and implements the generic remote processor
//! lifecycle on top of the role-specific operations in [`crate::root`] and
//! [`crate::userpd`]:
//!
//! - `boot` counts power references; only the first one loads and starts.
//! - `shutdown` drops a reference; only the last one stops the domain.
//! - `recover` restarts a crashed domain without touching the count.
//!
//! Dependents refer to their root by [`DomainId`]. A dependent operation may
//! take its root's operation lock while holding its own, never the reverse.

use crate::descriptor::{self, MAX_FIRMWARE, Role};
use crate::domain::{CrashInfo, Core, Domain, Lifecycle, OpState, PdState};
use crate::error::{ConfigError, RprocError};
use crate::memory::MemoryWindow;
use crate::node::{DomainNode, Timeouts, parse_pd_asid};
use crate::platform::{IrqHandler, Platform, SsrEvent};
use crate::signals::{Doorbell, InboundLine, Rendezvous, SPAWN_DOORBELL, STOP_DOORBELL};
use driver_sync::SpinLock;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DomainId(usize);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "domain#{}", self.0)
    }
}

pub struct DomainRegistry {
    pub(crate) platform: Platform,
    pub(crate) timeouts: Timeouts,
    domains: RwLock<Vec<Option<Arc<Domain>>>>,
}

impl DomainRegistry {
    #[must_use]
    pub fn new(platform: Platform, timeouts: Timeouts) -> Self {
        Self {
            platform,
            timeouts,
            domains: RwLock::new(Vec::new()),
        }
    }

    pub const fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub(crate) fn get(&self, id: DomainId) -> Result<Arc<Domain>, RprocError> {
        self.domains
            .read()
            .get(id.0)
            .and_then(Option::clone)
            .ok_or(RprocError::UnknownDomain(id))
    }

    /// Dependents probed under `root`.
    #[must_use]
    pub fn dependents(&self, root: DomainId) -> Vec<DomainId> {
        self.domains
            .read()
            .iter()
            .flatten()
            .filter(|d| d.parent == Some(root))
            .map(|d| d.id)
            .collect()
    }

    /// Register the domain described by `node`.
    ///
    /// Roots take their memory window from the node; dependents copy their
    /// root's window as it is now. Interrupt handlers are installed before
    /// the domain becomes visible.
    ///
    /// # Errors
    /// [`ConfigError`] for anything missing or inconsistent in `node`.
    pub fn probe(&self, node: DomainNode) -> Result<DomainId, RprocError> {
        let desc = descriptor::lookup(&node.compatible)
            .ok_or_else(|| ConfigError::UnknownCompatible(node.compatible.clone()))?;

        if node.firmware.is_empty() {
            return Err(ConfigError::MissingFirmwareName { node: node.name }.into());
        }
        if node.firmware.len() > MAX_FIRMWARE {
            return Err(ConfigError::TooManyFirmwareNames {
                node: node.name,
                count: node.firmware.len(),
                max: MAX_FIRMWARE,
            }
            .into());
        }

        let pd_asid = parse_pd_asid(&node.name)?;

        let window = match desc.role {
            Role::Root => {
                let memory = node.memory_region.as_ref().ok_or_else(|| {
                    ConfigError::MissingMemoryRegion {
                        node: node.name.clone(),
                    }
                })?;
                MemoryWindow::new(memory)
            }
            Role::Dependent => {
                let parent_id = node.parent.ok_or_else(|| ConfigError::MissingParent {
                    node: node.name.clone(),
                })?;
                let parent = self.get(parent_id)?;
                if !parent.descriptor.is_root() {
                    return Err(ConfigError::ParentNotRoot {
                        node: node.name,
                        parent: parent_id,
                    }
                    .into());
                }
                parent.op.lock().window.clone()
            }
        };

        let rendezvous = if desc.signals {
            resolve_doorbells(&node, desc.role)?
        } else {
            Rendezvous::new(None, None)
        };

        let core = Arc::new(Core::new(
            node.name.clone(),
            pd_asid,
            desc.crash_reason_smem,
            Arc::clone(&self.platform.smem),
            rendezvous,
        ));

        let irqs = if desc.signals {
            self.request_irqs(&node, desc.role, &core)?
        } else {
            Vec::new()
        };

        let mut domains = self.domains.write();
        let id = DomainId(domains.len());
        domains.push(Some(Arc::new(Domain {
            id,
            descriptor: desc,
            core,
            firmware: node.firmware,
            prng_clock: node.prng_clock,
            parent: node.parent,
            irqs,
            pd_state: SpinLock::new(PdState::Normal),
            op: Mutex::new(OpState {
                power: 0,
                window,
                clock_enabled: false,
                root_held: false,
            }),
        })));

        log::info!(
            "{}: probed {id} ({}, PAS {}, PD{pd_asid})",
            node.name,
            desc.compatible,
            desc.pasid
        );
        Ok(id)
    }

    fn request_irqs(
        &self,
        node: &DomainNode,
        role: Role,
        core: &Arc<Core>,
    ) -> Result<Vec<u32>, RprocError> {
        let mut requested = Vec::new();
        let result = self.request_irq_lines(node, role, core, &mut requested);
        if result.is_err() {
            for &irq in &requested {
                self.platform.interrupts.free_irq(irq);
            }
        }
        result.map(|()| requested)
    }

    fn request_irq_lines(
        &self,
        node: &DomainNode,
        role: Role,
        core: &Arc<Core>,
        requested: &mut Vec<u32>,
    ) -> Result<(), RprocError> {
        for line in InboundLine::ALL {
            let optional = role == Role::Root && line == InboundLine::SpawnAck;
            let number = node
                .interrupts
                .as_ref()
                .and_then(|r| r.irq_by_name(line.resource_name()));
            let Some(number) = number else {
                if optional {
                    continue;
                }
                log::error!("{}: failed to retrieve {} IRQ", node.name, line.resource_name());
                return Err(ConfigError::MissingInterrupt {
                    node: node.name.clone(),
                    line: line.resource_name(),
                }
                .into());
            };

            let name = line.irq_name(core.pd_asid);
            let weak: Weak<Core> = Arc::downgrade(core);
            let event = line.event();
            let handler: IrqHandler = Arc::new(move || {
                if let Some(core) = weak.upgrade() {
                    core.handle(event);
                }
            });

            self.platform
                .interrupts
                .request_irq(number, &name, handler)
                .map_err(|source| {
                    log::error!("failed to acquire {name} irq");
                    ConfigError::IrqRequest {
                        name: name.clone(),
                        source,
                    }
                })?;
            requested.push(number);
        }
        Ok(())
    }

    /// Take a power reference, loading and starting the domain on the first.
    ///
    /// A domain that crashes while starting is reported as
    /// [`Lifecycle::Crashed`], not as an error.
    ///
    /// # Errors
    /// Whatever failed during load or start. The reference is not taken.
    pub fn boot(&self, id: DomainId) -> Result<Lifecycle, RprocError> {
        let domain = self.get(id)?;
        let mut op = domain.op.lock();

        op.power += 1;
        if op.power > 1 {
            log::debug!("{}: already powered ({} users)", domain.name(), op.power);
            return Ok(domain.core.lifecycle());
        }

        match self.power_up(&domain, &mut op) {
            Ok(state) => Ok(state),
            Err(e) => {
                op.power -= 1;
                self.abandon_start(&domain, &mut op);
                log::error!("{}: boot failed: {e}", domain.name());
                Err(e)
            }
        }
    }

    fn power_up(&self, domain: &Domain, op: &mut OpState) -> Result<Lifecycle, RprocError> {
        log::info!("powering up {}", domain.name());
        self.notify(domain, SsrEvent::BeforePowerup, false);
        domain.core.begin_start();

        let firmware = self.platform.firmware.request(domain.primary_firmware())?;
        log::info!(
            "{}: booting fw image {}, size {}",
            domain.name(),
            domain.primary_firmware(),
            firmware.len()
        );

        match domain.descriptor.role {
            Role::Root => {
                self.root_load(domain, op, &firmware)?;
                self.root_start(domain, op)?;
            }
            Role::Dependent => {
                self.pd_load(domain, op, &firmware)?;
                self.pd_start(domain)?;
            }
        }

        let state = domain.core.finish_start();
        self.notify(domain, SsrEvent::AfterPowerup, false);
        match state {
            Lifecycle::Crashed => log::warn!("{} crashed while starting", domain.name()),
            _ => log::info!("remote processor {} is now up", domain.name()),
        }
        Ok(state)
    }

    /// Undo what a failed `power_up` left behind.
    fn abandon_start(&self, domain: &Domain, op: &mut OpState) {
        domain.core.rendezvous.unprepare();
        if op.root_held {
            op.root_held = false;
            if let Some(root) = domain.parent
                && let Err(e) = self.shutdown(root)
            {
                log::warn!("{}: releasing root failed: {e}", domain.name());
            }
        }
        if domain.core.lifecycle() != Lifecycle::Crashed {
            domain.core.set_lifecycle(Lifecycle::Offline);
        }
    }

    /// Drop a power reference, stopping the domain with the last one.
    ///
    /// Stopping a dependent always releases its root and marks the
    /// dependent [`PdState::Shutdown`]; the first error seen on the way is
    /// returned afterwards.
    ///
    /// # Errors
    /// Whatever failed while stopping. A root that failed to stop keeps its
    /// reference.
    pub fn shutdown(&self, id: DomainId) -> Result<(), RprocError> {
        let domain = self.get(id)?;
        let mut op = domain.op.lock();

        if op.power == 0 {
            log::warn!("{}: shutdown without matching boot", domain.name());
            return Ok(());
        }
        op.power -= 1;
        if op.power > 0 {
            return Ok(());
        }

        let previous = domain.core.lifecycle();
        let crashed = previous == Lifecycle::Crashed;
        self.notify(&domain, SsrEvent::BeforeShutdown, crashed);
        domain.core.set_lifecycle(Lifecycle::Stopping);

        let result = self.stop(&domain, &mut op, crashed);
        if result.is_err() && domain.descriptor.is_root() {
            op.power += 1;
            domain.core.set_lifecycle(previous);
            return result;
        }

        domain.core.set_lifecycle(Lifecycle::Offline);
        self.notify(&domain, SsrEvent::AfterShutdown, crashed);
        log::info!("stopped remote processor {}", domain.name());
        result
    }

    fn stop(&self, domain: &Domain, op: &mut OpState, crashed: bool) -> Result<(), RprocError> {
        match domain.descriptor.role {
            Role::Root => self.root_stop(domain, op),
            Role::Dependent => self.pd_stop(domain, op, crashed),
        }
    }

    /// Restart a crashed domain.
    ///
    /// Domains that are not crashed are left alone. A crash reported while
    /// nobody holds a power reference only takes the domain back to
    /// [`Lifecycle::Offline`]. Retrying a failed recovery is up to the caller.
    ///
    /// # Errors
    /// Whatever failed while stopping or booting again. After a failed boot
    /// the domain is offline and holds no power references.
    pub fn recover(&self, id: DomainId) -> Result<Lifecycle, RprocError> {
        let domain = self.get(id)?;
        let mut op = domain.op.lock();

        let state = domain.core.lifecycle();
        if state != Lifecycle::Crashed {
            log::debug!("{}: not crashed ({state}), nothing to recover", domain.name());
            return Ok(state);
        }
        if op.power == 0 {
            log::warn!("{}: crashed while unpowered, not restarting", domain.name());
            domain.core.rendezvous.unprepare();
            domain.core.set_lifecycle(Lifecycle::Offline);
            return Ok(Lifecycle::Offline);
        }

        log::info!("attempting recovery of {}", domain.name());
        self.notify(&domain, SsrEvent::BeforeShutdown, true);
        domain.core.set_lifecycle(Lifecycle::Stopping);
        if let Err(e) = self.stop(&domain, &mut op, true) {
            domain.core.set_lifecycle(Lifecycle::Crashed);
            return Err(e);
        }
        domain.core.set_lifecycle(Lifecycle::Offline);
        self.notify(&domain, SsrEvent::AfterShutdown, true);

        match self.power_up(&domain, &mut op) {
            Ok(state) => Ok(state),
            Err(e) => {
                op.power = 0;
                self.abandon_start(&domain, &mut op);
                log::error!("{}: recovery failed: {e}", domain.name());
                Err(e)
            }
        }
    }

    /// Raise the stop doorbell from a panicking host without waiting.
    ///
    /// Returns how long to wait for the remote to save its state, or `None`
    /// if the domain has no panic handoff.
    ///
    /// # Errors
    /// [`RprocError::UnknownDomain`].
    pub fn panic(&self, id: DomainId) -> Result<Option<Duration>, RprocError> {
        let domain = self.get(id)?;
        if !domain.descriptor.is_root() {
            return Ok(None);
        }
        Ok(domain.core.rendezvous.panic())
    }

    /// # Errors
    /// [`RprocError::UnknownDomain`].
    pub fn crash_info(&self, id: DomainId) -> Result<CrashInfo, RprocError> {
        Ok(self.get(id)?.core.crash_info())
    }

    /// # Errors
    /// [`RprocError::UnknownDomain`].
    pub fn lifecycle(&self, id: DomainId) -> Result<Lifecycle, RprocError> {
        Ok(self.get(id)?.core.lifecycle())
    }

    /// # Errors
    /// [`RprocError::UnknownDomain`].
    pub fn pd_state(&self, id: DomainId) -> Result<PdState, RprocError> {
        Ok(self.get(id)?.pd_state.load())
    }

    /// Whether the remote acknowledged its last start and has not stopped.
    ///
    /// # Errors
    /// [`RprocError::UnknownDomain`].
    pub fn is_running(&self, id: DomainId) -> Result<bool, RprocError> {
        Ok(self.get(id)?.core.rendezvous.is_running())
    }

    /// # Errors
    /// [`RprocError::UnknownDomain`].
    pub fn power_count(&self, id: DomainId) -> Result<u32, RprocError> {
        Ok(self.get(id)?.op.lock().power)
    }

    /// # Errors
    /// [`RprocError::UnknownDomain`].
    pub fn name(&self, id: DomainId) -> Result<String, RprocError> {
        Ok(self.get(id)?.name().to_string())
    }

    /// A copy of the domain's current memory window.
    ///
    /// # Errors
    /// [`RprocError::UnknownDomain`].
    pub fn window(&self, id: DomainId) -> Result<MemoryWindow, RprocError> {
        Ok(self.get(id)?.op.lock().window.clone())
    }

    /// Window offset of the device address range `da..da + len`.
    ///
    /// # Errors
    /// [`RprocError::UnknownDomain`].
    pub fn translate(&self, id: DomainId, da: u64, len: usize) -> Result<Option<usize>, RprocError> {
        Ok(self.window(id)?.translate(da, len))
    }

    /// Copy `len` bytes at device address `da` out of the domain's window.
    ///
    /// # Errors
    /// [`RprocError::UnknownDomain`].
    pub fn read_memory(&self, id: DomainId, da: u64, len: usize) -> Result<Option<Vec<u8>>, RprocError> {
        Ok(self.window(id)?.read(da, len))
    }

    /// Stop (if powered) and unregister a domain.
    ///
    /// # Errors
    /// [`RprocError::HasDependents`] while dependents are registered, or a
    /// failure to stop.
    pub fn remove(&self, id: DomainId) -> Result<(), RprocError> {
        let domain = self.get(id)?;
        if !self.dependents(id).is_empty() {
            return Err(RprocError::HasDependents { id });
        }

        let powered = {
            let mut op = domain.op.lock();
            let powered = op.power > 0;
            if powered {
                op.power = 1;
            }
            powered
        };
        if powered {
            self.shutdown(id)?;
        }

        for &irq in &domain.irqs {
            self.platform.interrupts.free_irq(irq);
        }
        if let Some(slot) = self.domains.write().get_mut(id.0) {
            *slot = None;
        }
        log::info!("{}: removed", domain.name());
        Ok(())
    }

    fn notify(&self, domain: &Domain, event: SsrEvent, crashed: bool) {
        if let Some(notifier) = &self.platform.notifier {
            notifier.notify(domain.subsystem(), event, crashed);
        }
    }
}

fn resolve_doorbells(node: &DomainNode, role: Role) -> Result<Rendezvous, RprocError> {
    let lookup = |name: &'static str| {
        node.smem_states
            .as_ref()
            .and_then(|p| p.state(name))
            .map(|(state, bit)| Doorbell::new(name, state, bit))
    };
    let missing = |doorbell: &'static str| {
        log::error!("{}: failed to acquire {doorbell} state", node.name);
        ConfigError::MissingDoorbell {
            node: node.name.clone(),
            doorbell,
        }
    };

    let stop = lookup(STOP_DOORBELL).ok_or_else(|| missing(STOP_DOORBELL))?;
    let spawn = match (lookup(SPAWN_DOORBELL), role) {
        (Some(spawn), _) => Some(spawn),
        (None, Role::Root) => None,
        (None, Role::Dependent) => return Err(missing(SPAWN_DOORBELL).into()),
    };
    Ok(Rendezvous::new(Some(stop), spawn))
}
