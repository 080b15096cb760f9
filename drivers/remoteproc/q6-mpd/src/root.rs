//! Root domain operations: the Q6 itself.

use crate::domain::{Domain, OpState, PdState};
use crate::error::{RprocError, TimeoutError, WaitError};
use crate::mdt_loader::MdtLoader;
use crate::registry::DomainRegistry;

impl DomainRegistry {
    /// Load the primary image with secure init, then any extra segment files.
    pub(crate) fn root_load(
        &self,
        domain: &Domain,
        op: &mut OpState,
        firmware: &[u8],
    ) -> Result<(), RprocError> {
        let loader = MdtLoader {
            secure: self.platform.secure.as_ref(),
            firmware: self.platform.firmware.as_ref(),
        };
        let pas = domain.descriptor.pasid;
        loader.load(firmware, domain.primary_firmware(), pas, &mut op.window)?;

        for name in &domain.firmware[1..] {
            let extra = match self.platform.firmware.request(name) {
                Ok(extra) => extra,
                Err(e) => {
                    log::warn!("{}: skipping {name}: {e}", domain.name());
                    continue;
                }
            };
            if let Err(e) = loader.load_no_init(&extra, name, &mut op.window) {
                log::error!("{}: can't load {name}: {e}", domain.name());
                return Err(e);
            }
        }
        Ok(())
    }

    /// Release the Q6 from reset and wait for it to report ready.
    ///
    /// A start timeout is reported but the reset is left as is.
    pub(crate) fn root_start(&self, domain: &Domain, op: &mut OpState) -> Result<(), RprocError> {
        if let Some(clock) = &domain.prng_clock
            && !op.clock_enabled
        {
            clock.prepare_enable()?;
            op.clock_enabled = true;
        }

        let rendezvous = &domain.core.rendezvous;
        if let Err(e) = self.platform.secure.pas_auth_and_reset(domain.descriptor.pasid) {
            log::error!("{}: wcss reset failed", domain.name());
            self.release_clock(domain, op);
            rendezvous.unprepare();
            return Err(e.into());
        }

        let timeout = self.timeouts.start;
        let result = match rendezvous.wait_for_start(timeout) {
            Ok(()) | Err(WaitError::Crashed) => Ok(()),
            Err(WaitError::TimedOut(_)) => {
                log::error!("{}: start timed out", domain.name());
                rendezvous.set_running(false);
                Err(TimeoutError::Start {
                    domain: domain.name().to_string(),
                    timeout,
                }
                .into())
            }
        };

        // A restarted root brings every user PD image back with it.
        for id in self.dependents(domain.id) {
            if let Ok(dependent) = self.get(id) {
                dependent.pd_state.store(PdState::Normal);
            }
        }
        result
    }

    pub(crate) fn root_stop(&self, domain: &Domain, op: &mut OpState) -> Result<(), RprocError> {
        if let Err(e) = self.platform.secure.pas_shutdown(domain.descriptor.pasid) {
            log::error!("{}: not able to shutdown", domain.name());
            return Err(e.into());
        }
        self.release_clock(domain, op);
        domain.core.rendezvous.unprepare();
        Ok(())
    }

    fn release_clock(&self, domain: &Domain, op: &mut OpState) {
        if op.clock_enabled
            && let Some(clock) = &domain.prng_clock
        {
            clock.disable_unprepare();
        }
        op.clock_enabled = false;
    }
}
