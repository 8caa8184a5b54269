//! Debug register block: instruction injection, status, and the one-word
//! data transfer channel.

use bitflags::bitflags;

/// Lock-access register; write [`crate::regs::UNLOCK_KEY`] to unlock.
pub const LOCK_ACCESS: u32 = 0xFB0;

/// OS lock register; write zero to clear.
pub const OS_LOCK: u32 = 0x300;

/// Instruction injection register; writing a word makes the halted target
/// execute exactly that instruction.
pub const INSTRUCTION: u32 = 0x84;

/// Status register; see [`Dscr`] for the bit assignments.
pub const STATUS: u32 = 0x88;

/// Channel transmit register (target to controller).
pub const TRANSMIT: u32 = 0x8C;

/// Channel receive register (controller to target). Fixed at 0x80 on both
/// supported peripheral generations.
pub const RECEIVE: u32 = 0x80;

/// Run-control register; see [`Drcr`] for the bit assignments.
pub const RUN_CONTROL: u32 = 0x90;

/// Mask of the processor-status field inside [`STATUS`].
pub const STATUS_FIELD_MASK: u32 = 0x3F;

/// Status-field value reported once the target halts on an external
/// debug request.
pub const STATUS_HALTED_BY_DEBUG_REQUEST: u32 = 0x13;

/// Status-field value reported once the target is back in normal
/// (non-debug) execution.
pub const STATUS_NON_DEBUG: u32 = 0x02;

bitflags! {
    /// Individual bits of the [`STATUS`] register.
    ///
    /// The halted/restarted bits are the low bits of the status field, so
    /// both peripheral generations can be decoded through one view.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Dscr: u32 {
        /// Target is halted.
        const HALTED = 1 << 0;
        /// Target has restarted after a resume request.
        const RESTARTED = 1 << 1;
        /// Sticky error: the last injected instruction faulted.
        const ERR = 1 << 6;
        /// Instruction injection enabled while halted.
        const ITREN = 1 << 13;
        /// Halting debug enabled.
        const HDBGEN = 1 << 14;
        /// Last injected instruction has fully retired.
        const ITE = 1 << 24;
        /// Channel transmit register is full (a valid word is waiting).
        const TXFULL = 1 << 26;
    }
}

bitflags! {
    /// Individual bits of the [`RUN_CONTROL`] register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Drcr: u32 {
        /// Halt request.
        const HRQ = 1 << 0;
        /// Restart request.
        const RRQ = 1 << 1;
        /// Clear sticky error and completion state.
        const CSE = 1 << 2;
    }
}

/// Extracts the processor-status field from a raw [`STATUS`] word.
#[must_use]
pub const fn status_field(raw: u32) -> u32 {
    raw & STATUS_FIELD_MASK
}
