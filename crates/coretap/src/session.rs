//! Halt-session lifecycle and the guaranteed restore-and-resume unwind.
//!
//! A session that reaches the halted state must reach the resumed state on
//! every code path: leaving the target halted is a terminal denial of
//! service on that core. The session therefore runs the probe body inside
//! a scoped span: once `halt()` succeeds, context restore, injection
//! disable, and `resume()` execute on every exit path, error paths
//! included. The first error wins; unwind errors are surfaced only when
//! the body itself succeeded.

use log::debug;

use crate::access::RegisterBlock;
use crate::channel;
use crate::encoder::{self, CoprocReg, MODE_MASK};
use crate::fault::ProbeError;
use crate::halt::{self, HaltStrategy};
use crate::inject::{Injector, PollBudget};
use crate::regs::{self, debug::Dscr, debug::STATUS};

/// Caller-constructed configuration for one target core.
///
/// Passed by value to the entry surface, never process-wide state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SessionConfig {
    /// How the target is halted and restarted.
    pub strategy: HaltStrategy,
    /// Retry bound applied to every busy-wait poll.
    pub poll_budget: PollBudget,
    /// Mode-selector bits of the execution mode the probe elevates to.
    pub elevated_mode: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            strategy: HaltStrategy::default(),
            poll_budget: PollBudget::default(),
            elevated_mode: encoder::ELEVATED_MODE,
        }
    }
}

/// Lifecycle of one session against one target core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Both register blocks unlocked; target still running.
    Unlocked,
    /// Target halted and injection-capable.
    Halted,
    /// Target executing in the elevated mode.
    PrivilegeElevated,
    /// Disturbed registers restored to their saved values.
    Restored,
    /// Target running again; session complete.
    Resumed,
}

/// Target registers disturbed by the sequence, captured before privilege
/// elevation and restored in reverse order.
///
/// Fields are populated as the saves succeed, so a failure part-way
/// through the save phase unwinds exactly what was disturbed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SavedContext {
    r0: Option<u32>,
    saved_pc: Option<u32>,
    mode: Option<u32>,
}

/// The two register blocks of one target core.
#[derive(Debug)]
pub(crate) struct Ports<B> {
    pub debug: B,
    pub cti: Option<B>,
}

/// One open session: the halt-to-resume span plus its lifecycle state.
#[derive(Debug)]
pub(crate) struct HaltSession<'a, B: RegisterBlock> {
    ports: &'a mut Ports<B>,
    config: SessionConfig,
    state: SessionState,
}

impl<'a, B: RegisterBlock> HaltSession<'a, B> {
    /// Unlocks both register blocks and opens the session.
    pub(crate) fn open(ports: &'a mut Ports<B>, config: SessionConfig) -> Self {
        debug!("unlocking register blocks");
        regs::unlock(&mut ports.debug);
        if let Some(cti) = ports.cti.as_mut() {
            regs::unlock(cti);
        }
        Self {
            ports,
            config,
            state: SessionState::Unlocked,
        }
    }

    /// Current lifecycle state.
    pub(crate) const fn state(&self) -> SessionState {
        self.state
    }

    /// Runs `body` with the target halted, privilege elevated, and the
    /// disturbed context saved; unwinds unconditionally afterwards.
    ///
    /// # Errors
    ///
    /// Unlock-phase and halt failures abort with no unwind needed. Any
    /// failure after a successful halt still restores the saved context,
    /// disables injection, and resumes the target before surfacing.
    pub(crate) fn run_elevated<T, F>(&mut self, body: F) -> Result<T, ProbeError>
    where
        F: FnOnce(&mut Injector<'_, B>) -> Result<T, ProbeError>,
    {
        let budget = self.config.poll_budget;

        debug!("enabling halting debug");
        self.ports.debug.set_bits32(STATUS, Dscr::HDBGEN.bits());

        let engaged = halt::halt(
            self.config.strategy,
            &mut self.ports.debug,
            self.ports.cti.as_mut(),
            budget,
        )?;
        self.state = SessionState::Halted;

        let outcome = self.halted_span(body);

        debug!("resuming target");
        let resumed = halt::resume(
            engaged,
            &mut self.ports.debug,
            self.ports.cti.as_mut(),
            budget,
        );
        if resumed.is_ok() {
            self.state = SessionState::Resumed;
        }

        let value = outcome?;
        resumed?;
        Ok(value)
    }

    /// Everything between halt and resume: enable injection, save the
    /// disturbed context, elevate, run the body, restore, disable
    /// injection.
    fn halted_span<T, F>(&mut self, body: F) -> Result<T, ProbeError>
    where
        F: FnOnce(&mut Injector<'_, B>) -> Result<T, ProbeError>,
    {
        debug!("enabling instruction injection");
        self.ports.debug.set_bits32(STATUS, Dscr::ITREN.bits());

        let mut saved = SavedContext::default();
        let outcome = self.disturb_and_probe(&mut saved, body);
        let restored = self.restore(&mut saved);

        debug!("disabling instruction injection");
        self.ports.debug.clear_bits32(STATUS, Dscr::ITREN.bits());

        let value = outcome?;
        restored?;
        Ok(value)
    }

    fn disturb_and_probe<T, F>(
        &mut self,
        saved: &mut SavedContext,
        body: F,
    ) -> Result<T, ProbeError>
    where
        F: FnOnce(&mut Injector<'_, B>) -> Result<T, ProbeError>,
    {
        let budget = self.config.poll_budget;
        let mut inj = Injector::new(&mut self.ports.debug, budget);

        debug!("saving disturbed context");
        saved.r0 = Some(channel::save_r0(&mut inj)?);
        saved.saved_pc = Some(channel::save_via_r0(
            &mut inj,
            encoder::move_to_r0(CoprocReg::SAVED_PC),
        )?);
        saved.mode = Some(channel::save_via_r0(
            &mut inj,
            encoder::read_status_register(),
        )?);

        debug!(
            "elevating privilege to mode {:#04x}",
            self.config.elevated_mode
        );
        for instruction in encoder::switch_privilege_mode(self.config.elevated_mode) {
            inj.inject(instruction)?;
        }
        self.state = SessionState::PrivilegeElevated;

        body(&mut inj)
    }

    /// Restores the saved context in reverse save order.
    ///
    /// Best-effort: a failed restore step does not stop the remaining
    /// steps, and the first error is reported.
    fn restore(&mut self, saved: &mut SavedContext) -> Result<(), ProbeError> {
        let budget = self.config.poll_budget;
        let mut inj = Injector::new(&mut self.ports.debug, budget);
        let mut first_error: Option<ProbeError> = None;
        let mut note = |step: Result<(), ProbeError>| {
            if let Err(err) = step {
                first_error.get_or_insert(err);
            }
        };

        debug!("restoring disturbed context");
        if let Some(mode) = saved.mode.take() {
            for instruction in encoder::switch_privilege_mode(mode & MODE_MASK) {
                note(inj.inject(instruction));
            }
        }
        if let Some(saved_pc) = saved.saved_pc.take() {
            note(channel::restore_via_r0(
                &mut inj,
                encoder::move_from_r0(CoprocReg::SAVED_PC),
                saved_pc,
            ));
        }
        if let Some(r0) = saved.r0.take() {
            note(channel::restore_r0(&mut inj, r0));
        }

        self.state = SessionState::Restored;
        first_error.map_or(Ok(()), Err)
    }
}
