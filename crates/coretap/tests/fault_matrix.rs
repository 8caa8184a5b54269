//! Fault-injection matrix: every failure mode must leave the target
//! either untouched (halt never engaged) or restored and resumed.

use bitflags as _;
use log as _;
use proptest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use coretap::{
    CoprocReg, HaltStrategy, PollBudget, ProbeError, ProbeTarget, SessionConfig, SimFaults,
    SimTarget,
};
use rstest::rstest;

const R0_BEFORE: u32 = 0x1111_2222;
const SAVED_PC_BEFORE: u32 = 0x8000_0040;
const MODE_BEFORE: u32 = 0x10;

fn seeded_sim() -> SimTarget {
    let sim = SimTarget::new();
    sim.set_r0(R0_BEFORE);
    sim.set_saved_pc(SAVED_PC_BEFORE);
    sim.set_status_register(MODE_BEFORE);
    sim.set_secure_config(0xCAFE_F00D);
    sim
}

fn short_budget_target(sim: &SimTarget) -> ProbeTarget<coretap::SimBlock> {
    let config = SessionConfig {
        poll_budget: PollBudget::new(64),
        ..SessionConfig::default()
    };
    ProbeTarget::new(sim.debug_block(), config)
}

/// A sticky error raised anywhere up to and including the probe read
/// must surface as an injection error, with every disturbed register
/// rolled back and the target running again.
#[rstest]
#[case::save_r0_transfer(1)]
#[case::save_pc_read(2)]
#[case::save_pc_transfer(3)]
#[case::save_mode_read(4)]
#[case::save_mode_transfer(5)]
#[case::elevate_read_status(6)]
#[case::elevate_clear_mode(7)]
#[case::elevate_set_mode(8)]
#[case::elevate_write_status(9)]
#[case::probe_register_read(10)]
#[case::probe_transfer(11)]
fn injection_error_before_restore_rolls_back_and_resumes(#[case] step: u32) {
    let sim = seeded_sim();
    sim.set_faults(SimFaults {
        error_on_injection: Some(step),
        ..SimFaults::default()
    });

    let target = short_budget_target(&sim);
    let err = target
        .read_register(CoprocReg::SECURE_CONFIG)
        .expect_err("faulted injection must fail the probe");
    assert!(matches!(err, ProbeError::InjectionError(_)));
    assert!(err.status().is_some());

    assert!(!sim.is_halted());
    assert_eq!(sim.resume_events(), 1);
    assert_eq!(sim.r0(), R0_BEFORE);
    assert_eq!(sim.saved_pc(), SAVED_PC_BEFORE);
    assert_eq!(sim.status_register(), MODE_BEFORE);
}

/// A sticky error during the restore phase is surfaced even though the
/// probe value was already read, and the target is still resumed.
#[rstest]
#[case::restore_mode_read(12)]
#[case::restore_mode_clear(13)]
#[case::restore_mode_set(14)]
#[case::restore_mode_write(15)]
#[case::restore_pc_receive(16)]
#[case::restore_pc_transfer(17)]
#[case::restore_r0_receive(18)]
fn injection_error_during_restore_still_resumes(#[case] step: u32) {
    let sim = seeded_sim();
    sim.set_faults(SimFaults {
        error_on_injection: Some(step),
        ..SimFaults::default()
    });

    let target = short_budget_target(&sim);
    let err = target
        .read_register(CoprocReg::SECURE_CONFIG)
        .expect_err("restore fault must be surfaced, not swallowed");
    assert!(matches!(err, ProbeError::InjectionError(_)));

    assert!(!sim.is_halted());
    assert_eq!(sim.resume_events(), 1);
}

#[test]
fn halt_timeout_leaves_the_target_untouched() {
    let sim = seeded_sim();
    sim.set_faults(SimFaults {
        never_halt: true,
        ..SimFaults::default()
    });

    let target = short_budget_target(&sim);
    let err = target
        .read_register(CoprocReg::SECURE_CONFIG)
        .expect_err("halt must time out");
    assert!(matches!(err, ProbeError::HaltTimeout(_)));
    assert!(err.is_timeout());

    assert!(!sim.is_halted());
    assert_eq!(sim.injections(), 0);
    assert_eq!(sim.halt_events(), 0);
    assert_eq!(sim.resume_events(), 0);
    assert_eq!(sim.r0(), R0_BEFORE);
}

#[test]
fn resume_timeout_reports_after_full_restore() {
    let sim = seeded_sim();
    sim.set_faults(SimFaults {
        never_restart: true,
        ..SimFaults::default()
    });

    let target = short_budget_target(&sim);
    let err = target
        .read_register(CoprocReg::SECURE_CONFIG)
        .expect_err("restart must time out");
    assert!(matches!(err, ProbeError::ResumeTimeout(_)));
    assert!(err.is_timeout());

    // The restore already ran before the failed restart request.
    assert!(sim.is_halted());
    assert_eq!(sim.resume_events(), 0);
    assert_eq!(sim.r0(), R0_BEFORE);
    assert_eq!(sim.saved_pc(), SAVED_PC_BEFORE);
    assert_eq!(sim.status_register(), MODE_BEFORE);
}

#[test]
fn stuck_injection_engine_times_out_within_budget_and_resumes() {
    let sim = seeded_sim();
    sim.set_faults(SimFaults {
        never_complete: true,
        ..SimFaults::default()
    });

    let target = short_budget_target(&sim);
    let err = target
        .read_register(CoprocReg::SECURE_CONFIG)
        .expect_err("injection must time out");
    assert!(matches!(err, ProbeError::InjectionTimeout(_)));
    assert!(err.is_timeout());

    assert!(!sim.is_halted());
    assert_eq!(sim.resume_events(), 1);
}

#[test]
fn stuck_trigger_acknowledge_does_not_strand_the_target() {
    let sim = seeded_sim();
    sim.set_faults(SimFaults {
        stuck_trigger_ack: true,
        ..SimFaults::default()
    });
    let config = SessionConfig {
        strategy: HaltStrategy::CrossTrigger,
        poll_budget: PollBudget::new(64),
        ..SessionConfig::default()
    };

    let target = ProbeTarget::with_cross_trigger(sim.debug_block(), sim.cti_block(), config);
    assert_eq!(
        target.read_register(CoprocReg::SECURE_CONFIG),
        Ok(0xCAFE_F00D)
    );

    assert!(!sim.is_halted());
    assert_eq!(sim.halt_events(), 1);
    assert_eq!(sim.resume_events(), 1);
    assert_eq!(sim.r0(), R0_BEFORE);
    assert_eq!(sim.saved_pc(), SAVED_PC_BEFORE);
    assert_eq!(sim.status_register(), MODE_BEFORE);
}

#[test]
fn silent_transfer_channel_fails_the_save_and_resumes() {
    let sim = seeded_sim();
    sim.set_faults(SimFaults {
        suppress_transmit_full: true,
        ..SimFaults::default()
    });

    let target = short_budget_target(&sim);
    let err = target
        .read_register(CoprocReg::SECURE_CONFIG)
        .expect_err("save must see an empty channel");
    assert!(matches!(err, ProbeError::ChannelNotReady(_)));

    assert!(!sim.is_halted());
    assert_eq!(sim.resume_events(), 1);
    assert_eq!(sim.r0(), R0_BEFORE);
}
