//! # User PD Operations
//!
//! A dependent never touches the Q6 reset. Booting it boots its root (taking
//! one power reference on it), and stopping it always drops that reference
//! again, even when the dependent itself failed to stop.
//!
//! The root image already carries every user PD's segments, so a dependent
//! only reloads its own segments after it was stopped on its own while the
//! root kept running ([`PdState::Shutdown`]).

use crate::descriptor::PdLoader;
use crate::domain::{Domain, OpState, PdState};
use crate::error::{RprocError, TimeoutError, WaitError};
use crate::mdt_loader::MdtLoader;
use crate::registry::DomainRegistry;
use crate::signals::RequestError;
use std::time::Duration;

impl DomainRegistry {
    pub(crate) fn pd_load(
        &self,
        domain: &Domain,
        op: &mut OpState,
        firmware: &[u8],
    ) -> Result<(), RprocError> {
        if !op.root_held {
            let root = domain.parent.ok_or(RprocError::UnknownDomain(domain.id))?;
            self.boot(root)?;
            op.root_held = true;
        }

        if domain.pd_state.load() == PdState::Normal {
            return Ok(());
        }

        let loader = MdtLoader {
            secure: self.platform.secure.as_ref(),
            firmware: self.platform.firmware.as_ref(),
        };
        let name = domain.primary_firmware();
        let pas = domain.descriptor.pasid;
        match domain.descriptor.pd_loader {
            Some(PdLoader::FullImage) => loader.load(firmware, name, pas, &mut op.window),
            Some(PdLoader::PdSegments) | None => loader
                .load_pd_segments(
                    firmware,
                    name,
                    pas,
                    domain.core.pd_asid.unsigned_abs(),
                    &mut op.window,
                )
                .map(|_| ()),
        }
    }

    /// Power the PD up and run the spawn handshake.
    pub(crate) fn pd_start(&self, domain: &Domain) -> Result<(), RprocError> {
        let desc = domain.descriptor;
        let rendezvous = &domain.core.rendezvous;
        if !desc.reset_seq {
            if !rendezvous.is_crashed() {
                rendezvous.set_running(true);
            }
            return Ok(());
        }

        if desc.scm_power
            && let Err(e) = self.platform.secure.int_radio_powerup(desc.pasid)
        {
            log::error!("{}: failed to power up pd", domain.name());
            return Err(e.into());
        }

        let spawn = self.timeouts.spawn;
        match rendezvous.request_spawn(spawn) {
            Ok(()) => {}
            Err(RequestError::Wait(WaitError::Crashed)) => return Ok(()),
            Err(RequestError::Wait(WaitError::TimedOut(_))) => {
                log::error!("{} spawn timed out", domain.name());
                rendezvous.set_running(false);
                return Err(timeout(domain, spawn, TimeoutKind::Spawn));
            }
            Err(RequestError::Doorbell(e)) => return Err(e.into()),
        }

        let start = self.timeouts.pd_start;
        match rendezvous.wait_for_start(start) {
            Ok(()) => {}
            Err(WaitError::Crashed) => return Ok(()),
            Err(WaitError::TimedOut(_)) => {
                log::error!("{} start timed out", domain.name());
                rendezvous.set_running(false);
                return Err(timeout(domain, start, TimeoutKind::Start));
            }
        }

        rendezvous.set_running(true);
        domain.pd_state.store(PdState::Normal);
        Ok(())
    }

    /// Stop the PD, then release the root and mark the PD image gone.
    ///
    /// Every step runs; the first error is returned.
    pub(crate) fn pd_stop(
        &self,
        domain: &Domain,
        op: &mut OpState,
        crashed: bool,
    ) -> Result<(), RprocError> {
        let desc = domain.descriptor;
        let rendezvous = &domain.core.rendezvous;
        let mut first_error = None;

        if desc.reset_seq {
            if !crashed && rendezvous.has_stop_doorbell() {
                let stop = self.timeouts.stop;
                let stopped = match rendezvous.request_stop(stop) {
                    Ok(()) | Err(RequestError::Wait(WaitError::Crashed)) => Ok(()),
                    Err(RequestError::Wait(WaitError::TimedOut(_))) => {
                        Err(timeout(domain, stop, TimeoutKind::Stop))
                    }
                    Err(RequestError::Doorbell(e)) => Err(e.into()),
                };
                if let Err(e) = stopped {
                    log::error!("{}: pd not stopped: {e}", domain.name());
                    first_error.get_or_insert(e);
                }
            }

            if desc.scm_power
                && let Err(e) = self.platform.secure.int_radio_powerdown(desc.pasid)
            {
                log::error!("{}: failed to power down pd", domain.name());
                first_error.get_or_insert(e.into());
            }
        }
        rendezvous.unprepare();

        if op.root_held {
            op.root_held = false;
            if let Some(root) = domain.parent
                && let Err(e) = self.shutdown(root)
            {
                first_error.get_or_insert(e);
            }
        }

        domain.pd_state.store(PdState::Shutdown);
        first_error.map_or(Ok(()), Err)
    }
}

enum TimeoutKind {
    Start,
    Stop,
    Spawn,
}

fn timeout(domain: &Domain, timeout: Duration, kind: TimeoutKind) -> RprocError {
    let domain = domain.name().to_string();
    let err = match kind {
        TimeoutKind::Start => TimeoutError::Start { domain, timeout },
        TimeoutKind::Stop => TimeoutError::Stop { domain, timeout },
        TimeoutKind::Spawn => TimeoutError::Spawn { domain, timeout },
    };
    err.into()
}
