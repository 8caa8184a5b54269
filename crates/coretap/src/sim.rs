//! Simulated target core behind the two register blocks.
//!
//! An in-process model of one halted-and-injectable processor core, used
//! by the crate's own tests and by harnesses for bring-up before touching
//! real hardware. The model covers exactly the protocol surface: lock
//! gating (writes silently ignored while locked), both halt paths, the
//! one-word transfer channel, and execution of the encoder's instruction
//! vocabulary with mode-gated access to the secure configuration
//! register. Fault hooks make every protocol failure reproducible.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::access::RegisterBlock;
use crate::encoder::{ELEVATED_MODE, MODE_MASK};
use crate::regs::cti;
use crate::regs::debug::{
    Drcr, Dscr, INSTRUCTION, LOCK_ACCESS, OS_LOCK, RECEIVE, RUN_CONTROL, STATUS,
    STATUS_HALTED_BY_DEBUG_REQUEST, STATUS_NON_DEBUG, TRANSMIT,
};
use crate::regs::UNLOCK_KEY;

/// Scriptable failure modes of the simulated target.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimFaults {
    /// The instruction-complete bit is never set after an injection.
    pub never_complete: bool,
    /// The nth executed injection (1-based) sets the sticky error bit.
    pub error_on_injection: Option<u32>,
    /// The channel-full flag is never reported even when a word waits.
    pub suppress_transmit_full: bool,
    /// Halt requests are dropped.
    pub never_halt: bool,
    /// Restart requests are dropped.
    pub never_restart: bool,
    /// Trigger acknowledges never clear the trigger-output status.
    pub stuck_trigger_ack: bool,
}

#[derive(Debug)]
struct SimCore {
    faults: SimFaults,

    // Per-block software locks; both engage at reset.
    locked: bool,
    os_locked: bool,
    cti_locked: bool,
    cti_os_locked: bool,

    // Architectural state the protocol can disturb.
    r0: u32,
    cpsr: u32,
    saved_pc: u32,
    secure_config: u32,
    stack: Vec<u32>,
    memory: HashMap<u32, u32>,

    // Debug block state.
    dtr_tx: Option<u32>,
    dtr_rx: Option<u32>,
    halted: bool,
    status_field: u32,
    err: bool,
    ite: bool,
    itren: bool,
    hdbgen: bool,

    // Cross-trigger block state.
    cti_control: u32,
    cti_gate: u32,
    cti_out_enable_0: u32,
    cti_out_enable_1: u32,
    cti_trig_out: u32,

    // Observation counters for pairing assertions.
    injections: u32,
    halt_events: u32,
    resume_events: u32,
}

impl Default for SimCore {
    fn default() -> Self {
        Self {
            faults: SimFaults::default(),
            locked: true,
            os_locked: true,
            cti_locked: true,
            cti_os_locked: true,
            r0: 0,
            cpsr: 0x13,
            saved_pc: 0,
            secure_config: 0,
            stack: Vec::new(),
            memory: HashMap::new(),
            dtr_tx: None,
            dtr_rx: None,
            halted: false,
            status_field: STATUS_NON_DEBUG,
            err: false,
            ite: false,
            itren: false,
            hdbgen: false,
            cti_control: 0,
            cti_gate: 0,
            cti_out_enable_0: 0,
            cti_out_enable_1: 0,
            cti_trig_out: 0,
            injections: 0,
            halt_events: 0,
            resume_events: 0,
        }
    }
}

impl SimCore {
    fn status_word(&self) -> u32 {
        let mut raw = self.status_field;
        if self.err {
            raw |= Dscr::ERR.bits();
        }
        if self.itren {
            raw |= Dscr::ITREN.bits();
        }
        if self.hdbgen {
            raw |= Dscr::HDBGEN.bits();
        }
        if self.ite {
            raw |= Dscr::ITE.bits();
        }
        if self.dtr_tx.is_some() && !self.faults.suppress_transmit_full {
            raw |= Dscr::TXFULL.bits();
        }
        raw
    }

    fn request_halt(&mut self) {
        if !self.hdbgen || self.faults.never_halt || self.halted {
            return;
        }
        self.halted = true;
        self.status_field = STATUS_HALTED_BY_DEBUG_REQUEST;
        self.halt_events += 1;
    }

    fn request_restart(&mut self) {
        if self.faults.never_restart || !self.halted {
            return;
        }
        self.halted = false;
        self.status_field = STATUS_NON_DEBUG;
        self.resume_events += 1;
    }

    fn debug_write(&mut self, offset: u32, value: u32) {
        if offset == LOCK_ACCESS {
            self.locked = value != UNLOCK_KEY;
            return;
        }
        if self.locked {
            return;
        }
        if offset == OS_LOCK {
            self.os_locked = value != 0;
            return;
        }
        if self.os_locked {
            return;
        }
        match offset {
            STATUS => {
                self.itren = value & Dscr::ITREN.bits() != 0;
                self.hdbgen = value & Dscr::HDBGEN.bits() != 0;
            }
            RUN_CONTROL => {
                if value & Drcr::CSE.bits() != 0 {
                    self.err = false;
                }
                if value & Drcr::HRQ.bits() != 0 {
                    self.request_halt();
                }
                if value & Drcr::RRQ.bits() != 0 {
                    self.request_restart();
                }
            }
            INSTRUCTION => self.execute(value),
            RECEIVE => self.dtr_rx = Some(value),
            _ => {}
        }
    }

    fn debug_read(&mut self, offset: u32) -> u32 {
        match offset {
            STATUS => self.status_word(),
            TRANSMIT => match self.dtr_tx.take() {
                // Reading the empty transmit register is an undefined
                // access; the model makes it visible as the sticky error.
                None => {
                    self.err = true;
                    0
                }
                Some(word) => word,
            },
            RECEIVE => self.dtr_rx.unwrap_or(0),
            _ => 0,
        }
    }

    fn cti_write(&mut self, offset: u32, value: u32) {
        if offset == LOCK_ACCESS {
            self.cti_locked = value != UNLOCK_KEY;
            return;
        }
        if self.cti_locked {
            return;
        }
        if offset == OS_LOCK {
            self.cti_os_locked = value != 0;
            return;
        }
        if self.cti_os_locked {
            return;
        }
        match offset {
            cti::CONTROL => self.cti_control = value,
            cti::GATE => self.cti_gate = value,
            cti::OUT_ENABLE_0 => self.cti_out_enable_0 = value,
            cti::OUT_ENABLE_1 => self.cti_out_enable_1 = value,
            cti::APP_PULSE => self.pulse(value),
            cti::INT_ACK => {
                if !self.faults.stuck_trigger_ack {
                    self.cti_trig_out &= !value;
                }
            }
            _ => {}
        }
    }

    fn cti_read(&mut self, offset: u32) -> u32 {
        match offset {
            cti::CONTROL => self.cti_control,
            cti::GATE => self.cti_gate,
            cti::OUT_ENABLE_0 => self.cti_out_enable_0,
            cti::OUT_ENABLE_1 => self.cti_out_enable_1,
            cti::TRIG_OUT_STATUS => self.cti_trig_out,
            _ => 0,
        }
    }

    fn pulse(&mut self, channels: u32) {
        if self.cti_control & cti::GLOBAL_ENABLE == 0 {
            return;
        }
        if channels & cti::CHANNEL_0 != 0 && self.cti_out_enable_0 & cti::CHANNEL_0 != 0 {
            self.cti_trig_out |= cti::CHANNEL_0;
            self.request_halt();
        }
        if channels & cti::CHANNEL_1 != 0 && self.cti_out_enable_1 & cti::CHANNEL_1 != 0 {
            self.cti_trig_out |= cti::CHANNEL_1;
            self.request_restart();
        }
    }

    /// Retires one injected instruction word.
    fn execute(&mut self, instruction: u32) {
        if !self.halted || !self.itren {
            // The injection register is inert outside debug state; the
            // engine observes this as a completion timeout.
            return;
        }
        self.injections += 1;
        self.ite = false;
        if self.faults.never_complete {
            return;
        }
        if self.faults.error_on_injection == Some(self.injections) {
            self.err = true;
            self.ite = true;
            return;
        }
        self.retire(instruction);
        self.ite = true;
    }

    fn retire(&mut self, instruction: u32) {
        match instruction {
            // ldr r0, [r0]
            0xE590_0000 => self.r0 = self.memory.get(&self.r0).copied().unwrap_or(0),
            // push {r0}
            0xE52D_0004 => self.stack.push(self.r0),
            // pop {r0}
            0xE49D_0004 => match self.stack.pop() {
                Some(word) => self.r0 = word,
                None => self.err = true,
            },
            // mrs r0, cpsr
            0xE10F_0000 => self.r0 = self.cpsr,
            // msr cpsr, r0
            0xE129_F000 => self.cpsr = self.r0,
            // bic r0, r0, #0x1f
            0xE3C0_001F => self.r0 &= !MODE_MASK,
            // mcr: r0 -> channel transmit
            0xEE00_0E15 => {
                if self.dtr_tx.is_some() {
                    self.err = true;
                } else {
                    self.dtr_tx = Some(self.r0);
                }
            }
            // mrc: channel receive -> r0
            0xEE10_0E15 => match self.dtr_rx.take() {
                Some(word) => self.r0 = word,
                None => self.err = true,
            },
            // mrc: saved pc -> r0 / mcr: r0 -> saved pc
            0xEE74_0F35 => self.r0 = self.saved_pc,
            0xEE64_0F35 => self.saved_pc = self.r0,
            // mrc: secure configuration -> r0, elevated mode only
            0xEE11_0F11 => {
                if self.cpsr & MODE_MASK == ELEVATED_MODE {
                    self.r0 = self.secure_config;
                } else {
                    self.err = true;
                }
            }
            // movw r0, #imm16
            word if word & 0xFFF0_F000 == 0xE300_0000 => {
                self.r0 = ((word >> 4) & 0xF000) | (word & 0x0FFF);
            }
            // movt r0, #imm16
            word if word & 0xFFF0_F000 == 0xE340_0000 => {
                let imm16 = ((word >> 4) & 0xF000) | (word & 0x0FFF);
                self.r0 = (self.r0 & 0xFFFF) | (imm16 << 16);
            }
            // orr r0, r0, #imm8
            word if word & 0xFFFF_FF00 == 0xE380_0000 => self.r0 |= word & 0xFF,
            _ => self.err = true,
        }
    }
}

/// Which hardware block a [`SimBlock`] view exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Debug,
    CrossTrigger,
}

/// One register-block view onto a shared [`SimTarget`].
#[derive(Debug, Clone)]
pub struct SimBlock {
    core: Rc<RefCell<SimCore>>,
    kind: BlockKind,
}

impl RegisterBlock for SimBlock {
    fn read32(&mut self, offset: u32) -> u32 {
        let mut core = self.core.borrow_mut();
        match self.kind {
            BlockKind::Debug => core.debug_read(offset),
            BlockKind::CrossTrigger => core.cti_read(offset),
        }
    }

    fn write32(&mut self, offset: u32, value: u32) {
        let mut core = self.core.borrow_mut();
        match self.kind {
            BlockKind::Debug => core.debug_write(offset, value),
            BlockKind::CrossTrigger => core.cti_write(offset, value),
        }
    }
}

/// A simulated target core plus its two register blocks.
#[derive(Debug, Default)]
pub struct SimTarget {
    core: Rc<RefCell<SimCore>>,
}

impl SimTarget {
    /// Creates a running, locked target with all state zeroed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the debug register-block view.
    #[must_use]
    pub fn debug_block(&self) -> SimBlock {
        SimBlock {
            core: Rc::clone(&self.core),
            kind: BlockKind::Debug,
        }
    }

    /// Returns the cross-trigger register-block view.
    #[must_use]
    pub fn cti_block(&self) -> SimBlock {
        SimBlock {
            core: Rc::clone(&self.core),
            kind: BlockKind::CrossTrigger,
        }
    }

    /// Replaces the scripted fault configuration.
    pub fn set_faults(&self, faults: SimFaults) {
        self.core.borrow_mut().faults = faults;
    }

    /// Sets the target's general-purpose register 0.
    pub fn set_r0(&self, value: u32) {
        self.core.borrow_mut().r0 = value;
    }

    /// Reads the target's general-purpose register 0.
    #[must_use]
    pub fn r0(&self) -> u32 {
        self.core.borrow().r0
    }

    /// Sets the target's full mode/status register.
    pub fn set_status_register(&self, value: u32) {
        self.core.borrow_mut().cpsr = value;
    }

    /// Reads the target's full mode/status register.
    #[must_use]
    pub fn status_register(&self) -> u32 {
        self.core.borrow().cpsr
    }

    /// Reads the target's current mode-selector bits.
    #[must_use]
    pub fn mode(&self) -> u32 {
        self.core.borrow().cpsr & MODE_MASK
    }

    /// Sets the debug-state saved program counter.
    pub fn set_saved_pc(&self, value: u32) {
        self.core.borrow_mut().saved_pc = value;
    }

    /// Reads the debug-state saved program counter.
    #[must_use]
    pub fn saved_pc(&self) -> u32 {
        self.core.borrow().saved_pc
    }

    /// Sets the secure configuration register.
    pub fn set_secure_config(&self, value: u32) {
        self.core.borrow_mut().secure_config = value;
    }

    /// Writes one word of simulated target memory.
    pub fn write_memory_word(&self, addr: u32, value: u32) {
        self.core.borrow_mut().memory.insert(addr, value);
    }

    /// True while the target is halted.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.core.borrow().halted
    }

    /// Number of halt requests the target has honored.
    #[must_use]
    pub fn halt_events(&self) -> u32 {
        self.core.borrow().halt_events
    }

    /// Number of restart requests the target has honored.
    #[must_use]
    pub fn resume_events(&self) -> u32 {
        self.core.borrow().resume_events
    }

    /// Number of instructions the target has been made to execute.
    #[must_use]
    pub fn injections(&self) -> u32 {
        self.core.borrow().injections
    }

    /// Number of words currently on the target's own stack.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.core.borrow().stack.len()
    }
}
