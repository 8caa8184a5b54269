//! Halt/resume synchronizer.
//!
//! Brings the target core to a halted, instruction-injectable state and
//! later restarts it, through one contract with two interchangeable
//! strategies selected by configuration:
//!
//! - **Direct request**: set a halt-request bit in the run-control
//!   register, poll for the halted flag; mirror with the restart-request
//!   bit and the restarted flag.
//! - **Cross trigger**: route and gate trigger channel 0, pulse the
//!   application trigger, poll the status field for "halted by external
//!   request", acknowledge the trigger interrupt; mirror on channel 1.
//!
//! Whatever trigger/control registers a strategy reprograms are
//! snapshotted on halt and put back once resume completes, so a later
//! session finds the peripheral in its pre-halt configuration.
//!
//! Trigger acknowledgement is best-effort: once the halted or restarted
//! condition has been confirmed, a stuck acknowledge is logged and the
//! session carries on, keeping every observed halt paired with a resume.

use log::{debug, warn};

use crate::access::RegisterBlock;
use crate::fault::{ProbeError, StatusSnapshot};
use crate::inject::PollBudget;
use crate::regs::cti;
use crate::regs::debug::{
    status_field, Drcr, Dscr, RUN_CONTROL, STATUS, STATUS_HALTED_BY_DEBUG_REQUEST,
    STATUS_NON_DEBUG,
};

/// Synchronization strategy for halting and restarting the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum HaltStrategy {
    /// Request bits in the debug block's run-control register.
    #[default]
    DirectRequest,
    /// Trigger channels routed through the cross-trigger block.
    CrossTrigger,
}

/// Pre-halt contents of every cross-trigger register the halt path
/// reprograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CtiSnapshot {
    control: u32,
    gate: u32,
    out_enable_0: u32,
    out_enable_1: u32,
}

/// Proof of a successful halt, consumed by [`resume`].
///
/// Holds whatever state the strategy must unwind; the session keeps it
/// across the halted span so resume can restore the pre-halt trigger
/// configuration.
#[derive(Debug)]
pub(crate) enum EngagedHalt {
    Direct,
    CrossTrigger(CtiSnapshot),
}

/// Halts the target using the selected strategy.
///
/// # Errors
///
/// [`ProbeError::HaltTimeout`] when the halted condition is never
/// observed within the budget; [`ProbeError::CrossTriggerBlockMissing`]
/// when the cross-trigger strategy is selected without its block.
pub(crate) fn halt<B: RegisterBlock>(
    strategy: HaltStrategy,
    debug_block: &mut B,
    cti_block: Option<&mut B>,
    budget: PollBudget,
) -> Result<EngagedHalt, ProbeError> {
    match strategy {
        HaltStrategy::DirectRequest => {
            debug!("halting target via direct request");
            debug_block.write32(RUN_CONTROL, Drcr::HRQ.bits());
            budget
                .poll32(debug_block, STATUS, |raw| {
                    Dscr::from_bits_retain(raw).contains(Dscr::HALTED)
                })
                .map_err(|raw| ProbeError::HaltTimeout(StatusSnapshot::new(raw)))?;
            Ok(EngagedHalt::Direct)
        }
        HaltStrategy::CrossTrigger => {
            let cti_block = cti_block.ok_or(ProbeError::CrossTriggerBlockMissing)?;
            debug!("halting target via cross-trigger channel 0");

            let snapshot = CtiSnapshot {
                control: cti_block.read32(cti::CONTROL),
                gate: cti_block.read32(cti::GATE),
                out_enable_0: cti_block.read32(cti::OUT_ENABLE_0),
                out_enable_1: cti_block.read32(cti::OUT_ENABLE_1),
            };

            cti_block.write32(cti::CONTROL, cti::GLOBAL_ENABLE);
            cti_block.clear_bits32(cti::GATE, cti::CHANNEL_0);
            cti_block.set_bits32(cti::OUT_ENABLE_0, cti::CHANNEL_0);
            // Pulse registers are write-only; never read-modify-write them.
            cti_block.write32(cti::APP_PULSE, cti::CHANNEL_0);

            let wait = budget.poll32(debug_block, STATUS, |raw| {
                status_field(raw) == STATUS_HALTED_BY_DEBUG_REQUEST
            });
            if let Err(raw) = wait {
                // Leave the trigger configuration as found before failing.
                restore_cti(cti_block, snapshot);
                return Err(ProbeError::HaltTimeout(StatusSnapshot::new(raw)));
            }

            // Halted is confirmed; from here the session must reach
            // resume, so a stuck acknowledge must not strand the core.
            if let Err(raw) = acknowledge_trigger(cti_block, cti::CHANNEL_0, budget) {
                warn!("halt trigger not acknowledged, trigger status {raw:#010x}");
            }
            Ok(EngagedHalt::CrossTrigger(snapshot))
        }
    }
}

/// Restarts the target and unwinds the strategy's peripheral state.
///
/// # Errors
///
/// [`ProbeError::ResumeTimeout`] when the restarted condition is never
/// observed within the budget. The trigger configuration is restored even
/// on the timeout path.
pub(crate) fn resume<B: RegisterBlock>(
    engaged: EngagedHalt,
    debug_block: &mut B,
    cti_block: Option<&mut B>,
    budget: PollBudget,
) -> Result<(), ProbeError> {
    match engaged {
        EngagedHalt::Direct => {
            debug!("restarting target via direct request");
            debug_block.write32(RUN_CONTROL, Drcr::RRQ.bits());
            budget
                .poll32(debug_block, STATUS, |raw| {
                    Dscr::from_bits_retain(raw).contains(Dscr::RESTARTED)
                })
                .map_err(|raw| ProbeError::ResumeTimeout(StatusSnapshot::new(raw)))?;
            Ok(())
        }
        EngagedHalt::CrossTrigger(snapshot) => {
            debug!("restarting target via cross-trigger channel 1");
            // Engagement proves the block was present.
            let cti_block = cti_block.ok_or(ProbeError::CrossTriggerBlockMissing)?;

            cti_block.clear_bits32(cti::GATE, cti::CHANNEL_1);
            cti_block.set_bits32(cti::OUT_ENABLE_1, cti::CHANNEL_1);
            cti_block.write32(cti::APP_PULSE, cti::CHANNEL_1);

            let wait = budget.poll32(debug_block, STATUS, |raw| {
                status_field(raw) == STATUS_NON_DEBUG
            });
            if wait.is_ok() {
                if let Err(raw) = acknowledge_trigger(cti_block, cti::CHANNEL_1, budget) {
                    warn!("restart trigger not acknowledged, trigger status {raw:#010x}");
                }
            }

            restore_cti(cti_block, snapshot);
            wait.map(|_| ())
                .map_err(|raw| ProbeError::ResumeTimeout(StatusSnapshot::new(raw)))
        }
    }
}

/// Acknowledges a fired trigger and waits for its output status to clear.
fn acknowledge_trigger<B: RegisterBlock>(
    cti_block: &mut B,
    channel: u32,
    budget: PollBudget,
) -> Result<(), u32> {
    cti_block.write32(cti::INT_ACK, channel);
    budget
        .poll32(cti_block, cti::TRIG_OUT_STATUS, |raw| raw & channel == 0)
        .map(|_| ())
}

fn restore_cti<B: RegisterBlock>(cti_block: &mut B, snapshot: CtiSnapshot) {
    cti_block.write32(cti::GATE, snapshot.gate);
    cti_block.write32(cti::OUT_ENABLE_0, snapshot.out_enable_0);
    cti_block.write32(cti::OUT_ENABLE_1, snapshot.out_enable_1);
    cti_block.write32(cti::CONTROL, snapshot.control);
}

#[cfg(test)]
mod tests {
    use super::{halt, resume, EngagedHalt, HaltStrategy};
    use crate::access::RegisterBlock;
    use crate::fault::ProbeError;
    use crate::inject::PollBudget;
    use crate::regs;
    use crate::regs::debug::{Dscr, STATUS};
    use crate::sim::{SimFaults, SimTarget};

    fn prepared_debug_block(sim: &SimTarget) -> crate::sim::SimBlock {
        let mut block = sim.debug_block();
        regs::unlock(&mut block);
        block.set_bits32(STATUS, Dscr::HDBGEN.bits());
        block
    }

    #[test]
    fn direct_request_halts_and_restarts() {
        let sim = SimTarget::new();
        let mut debug = prepared_debug_block(&sim);
        let budget = PollBudget::new(16);

        let engaged =
            halt(HaltStrategy::DirectRequest, &mut debug, None, budget).expect("halt succeeds");
        assert!(sim.is_halted());

        resume(engaged, &mut debug, None, budget).expect("resume succeeds");
        assert!(!sim.is_halted());
        assert_eq!(sim.halt_events(), 1);
        assert_eq!(sim.resume_events(), 1);
    }

    #[test]
    fn cross_trigger_without_block_is_rejected() {
        let sim = SimTarget::new();
        let mut debug = prepared_debug_block(&sim);

        let err = halt(
            HaltStrategy::CrossTrigger,
            &mut debug,
            None,
            PollBudget::new(16),
        )
        .expect_err("missing block must be rejected");
        assert_eq!(err, ProbeError::CrossTriggerBlockMissing);
        assert!(!sim.is_halted());
    }

    #[test]
    fn cross_trigger_round_trip_restores_trigger_registers() {
        let sim = SimTarget::new();
        let mut debug = prepared_debug_block(&sim);
        let mut cti = sim.cti_block();
        regs::unlock(&mut cti);
        let budget = PollBudget::new(16);

        let engaged = halt(
            HaltStrategy::CrossTrigger,
            &mut debug,
            Some(&mut cti),
            budget,
        )
        .expect("halt succeeds");
        assert!(sim.is_halted());
        assert!(matches!(engaged, EngagedHalt::CrossTrigger(_)));

        resume(engaged, &mut debug, Some(&mut cti), budget).expect("resume succeeds");
        assert!(!sim.is_halted());
        assert_eq!(cti.read32(crate::regs::cti::CONTROL), 0);
        assert_eq!(cti.read32(crate::regs::cti::OUT_ENABLE_0), 0);
        assert_eq!(cti.read32(crate::regs::cti::OUT_ENABLE_1), 0);
    }

    #[test]
    fn stuck_acknowledge_still_engages_and_resumes() {
        let sim = SimTarget::new();
        sim.set_faults(SimFaults {
            stuck_trigger_ack: true,
            ..SimFaults::default()
        });
        let mut debug = prepared_debug_block(&sim);
        let mut cti = sim.cti_block();
        regs::unlock(&mut cti);
        let budget = PollBudget::new(16);

        // An observed halt must stay paired with a resume even when the
        // trigger acknowledge never clears.
        let engaged = halt(
            HaltStrategy::CrossTrigger,
            &mut debug,
            Some(&mut cti),
            budget,
        )
        .expect("halt engages despite the stuck acknowledge");
        assert!(sim.is_halted());

        resume(engaged, &mut debug, Some(&mut cti), budget).expect("resume succeeds");
        assert!(!sim.is_halted());
        assert_eq!(sim.resume_events(), 1);
    }

    #[test]
    fn direct_halt_times_out_against_an_unresponsive_core() {
        let sim = SimTarget::new();
        // HDBGEN left clear: the core ignores the halt request.
        let mut block = sim.debug_block();
        regs::unlock(&mut block);

        let err = halt(
            HaltStrategy::DirectRequest,
            &mut block,
            None,
            PollBudget::new(8),
        )
        .expect_err("halt must time out");
        assert!(matches!(err, ProbeError::HaltTimeout(_)));
    }
}
