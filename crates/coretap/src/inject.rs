//! Instruction injection engine.
//!
//! The core primitive of the whole protocol: write an encoded instruction
//! word into the injection register, then poll the status register until
//! the target reports that the instruction has fully retired. On success
//! the instruction's architectural effects are complete before `inject`
//! returns, which is what lets the sequencer treat injected instructions
//! as synchronous, ordered operations.

use log::trace;

use crate::access::RegisterBlock;
use crate::fault::{ProbeError, StatusSnapshot};
use crate::regs::debug::{Drcr, Dscr, INSTRUCTION, RUN_CONTROL, STATUS};

/// Default number of status reads a poll loop may issue before giving up.
pub const DEFAULT_POLL_LIMIT: u32 = 100_000;

/// Bounded retry budget for one busy-wait poll.
///
/// Every wait in the protocol goes through [`PollBudget::poll32`]; a poll
/// that exhausts its budget reports the last observed register word so the
/// caller can convert it into the matching timeout error. There is no
/// genuinely unbounded wait anywhere in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PollBudget {
    limit: u32,
}

impl Default for PollBudget {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_LIMIT)
    }
}

impl PollBudget {
    /// Creates a budget allowing at most `limit` status reads per wait.
    #[must_use]
    pub const fn new(limit: u32) -> Self {
        Self { limit }
    }

    /// Returns the maximum number of reads per wait.
    #[must_use]
    pub const fn limit(self) -> u32 {
        self.limit
    }

    /// Polls the register at `offset` until `done` accepts its value.
    ///
    /// # Errors
    ///
    /// Returns the last observed register word when the budget is
    /// exhausted before `done` accepts a value.
    pub fn poll32<B, F>(self, block: &mut B, offset: u32, mut done: F) -> Result<u32, u32>
    where
        B: RegisterBlock,
        F: FnMut(u32) -> bool,
    {
        let mut last = 0;
        for _ in 0..self.limit {
            last = block.read32(offset);
            if done(last) {
                return Ok(last);
            }
        }
        Err(last)
    }
}

/// Injection engine borrowing a session's debug block.
#[derive(Debug)]
pub struct Injector<'a, B: RegisterBlock> {
    debug: &'a mut B,
    budget: PollBudget,
}

impl<'a, B: RegisterBlock> Injector<'a, B> {
    /// Wraps the debug block of a halted, injection-enabled target.
    pub fn new(debug: &'a mut B, budget: PollBudget) -> Self {
        Self { debug, budget }
    }

    /// Direct register access for the channel's non-injected half.
    pub fn debug(&mut self) -> &mut B {
        self.debug
    }

    /// Returns the poll budget this engine was configured with.
    #[must_use]
    pub const fn budget(&self) -> PollBudget {
        self.budget
    }

    /// Makes the target execute one instruction word and waits for it to
    /// retire.
    ///
    /// Clears the sticky error/completion state, writes the word to the
    /// injection register, polls for completion, and checks the error bit.
    ///
    /// # Errors
    ///
    /// [`ProbeError::InjectionTimeout`] when the completion bit never
    /// appears within the budget; [`ProbeError::InjectionError`] when the
    /// target flags the sticky error bit after execution. Both carry the
    /// last observed status word.
    pub fn inject(&mut self, instruction: u32) -> Result<(), ProbeError> {
        self.debug.write32(RUN_CONTROL, Drcr::CSE.bits());
        self.debug.write32(INSTRUCTION, instruction);

        let raw = self
            .budget
            .poll32(self.debug, STATUS, |raw| {
                Dscr::from_bits_retain(raw).contains(Dscr::ITE)
            })
            .map_err(|raw| ProbeError::InjectionTimeout(StatusSnapshot::new(raw)))?;

        if Dscr::from_bits_retain(raw).contains(Dscr::ERR) {
            trace!("injection of {instruction:#010x} faulted, status {raw:#010x}");
            return Err(ProbeError::InjectionError(StatusSnapshot::new(raw)));
        }
        trace!("injected {instruction:#010x}, status {raw:#010x}");
        Ok(())
    }
}
