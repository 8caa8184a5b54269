//! One-word data transfer channel between the controller and the target's
//! general-purpose register 0.
//!
//! Each direction is built from exactly two primitive steps: one injected
//! register-move instruction and one direct access to a channel register.
//! Nothing here ever buffers more than one word, because the hardware channel is
//! one word deep, and a second unread word would silently overwrite the
//! first.

use crate::access::RegisterBlock;
use crate::encoder::{self, CoprocReg};
use crate::fault::{ProbeError, StatusSnapshot};
use crate::inject::Injector;
use crate::regs::debug::{Dscr, RECEIVE, STATUS, TRANSMIT};

/// Direction of a word in transit through the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Controller reading a word produced by the target.
    ToController,
    /// Controller supplying a word for the target to consume.
    ToTarget,
}

/// A 32-bit value observed in the channel, tagged with its direction and
/// the hardware's full/empty status at observation time.
///
/// A word observed while the channel was not full is a protocol error, not
/// a value; [`ChannelWord::into_word`] enforces that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelWord {
    value: u32,
    direction: Direction,
    valid: bool,
    status: StatusSnapshot,
}

impl ChannelWord {
    /// Records an observation of the channel.
    #[must_use]
    pub const fn observe(value: u32, direction: Direction, status: StatusSnapshot) -> Self {
        let valid = match direction {
            // Outbound words are valid exactly when the transmit side
            // reports full; inbound words are valid by construction, the
            // controller just wrote them.
            Direction::ToController => status.raw() & Dscr::TXFULL.bits() != 0,
            Direction::ToTarget => true,
        };
        Self {
            value,
            direction,
            valid,
            status,
        }
    }

    /// Returns the direction of the observed word.
    #[must_use]
    pub const fn direction(self) -> Direction {
        self.direction
    }

    /// True when the hardware reported a valid (full) word.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.valid
    }

    /// Converts the observation into its value.
    ///
    /// # Errors
    ///
    /// [`ProbeError::ChannelNotReady`] when the channel was not full at
    /// observation time.
    pub const fn into_word(self) -> Result<u32, ProbeError> {
        if self.valid {
            Ok(self.value)
        } else {
            Err(ProbeError::ChannelNotReady(self.status))
        }
    }
}

/// Reads the target's r0 through the channel.
///
/// Injects the move that copies r0 into the channel, checks the
/// channel-full flag, and only then reads the transmit register.
///
/// # Errors
///
/// Injection failures propagate; [`ProbeError::ChannelNotReady`] when the
/// channel-full flag is absent at read time.
pub fn save_r0<B: RegisterBlock>(inj: &mut Injector<'_, B>) -> Result<u32, ProbeError> {
    inj.inject(encoder::move_from_r0(CoprocReg::DTR_TRANSFER))?;
    let status = StatusSnapshot::new(inj.debug().read32(STATUS));
    // The transmit register is undefined while empty; read it only once
    // the full flag confirms a word is waiting.
    if status.raw() & Dscr::TXFULL.bits() == 0 {
        return Err(ProbeError::ChannelNotReady(status));
    }
    let value = inj.debug().read32(TRANSMIT);
    ChannelWord::observe(value, Direction::ToController, status).into_word()
}

/// Reads an arbitrary target register through r0 and the channel.
///
/// `move_to_r0` is the injected instruction that copies the register of
/// interest into r0 (clobbering it).
///
/// # Errors
///
/// Same as [`save_r0`].
pub fn save_via_r0<B: RegisterBlock>(
    inj: &mut Injector<'_, B>,
    move_to_r0: u32,
) -> Result<u32, ProbeError> {
    inj.inject(move_to_r0)?;
    save_r0(inj)
}

/// Writes `word` into the target's r0 through the channel.
///
/// Writes the receive register directly, then injects the move that copies
/// the channel into r0.
///
/// # Errors
///
/// Injection failures propagate.
pub fn restore_r0<B: RegisterBlock>(
    inj: &mut Injector<'_, B>,
    word: u32,
) -> Result<(), ProbeError> {
    inj.debug().write32(RECEIVE, word);
    inj.inject(encoder::move_to_r0(CoprocReg::DTR_TRANSFER))
}

/// Writes `word` into an arbitrary target register through the channel
/// and r0.
///
/// `move_from_r0` is the injected instruction that copies r0 into the
/// register of interest.
///
/// # Errors
///
/// Injection failures propagate.
pub fn restore_via_r0<B: RegisterBlock>(
    inj: &mut Injector<'_, B>,
    move_from_r0: u32,
    word: u32,
) -> Result<(), ProbeError> {
    restore_r0(inj, word)?;
    inj.inject(move_from_r0)
}

#[cfg(test)]
mod tests {
    use super::{save_r0, ChannelWord, Direction, ProbeError, StatusSnapshot};
    use crate::access::RegisterBlock;
    use crate::inject::{Injector, PollBudget};
    use crate::regs::debug::{Dscr, TRANSMIT};

    #[test]
    fn outbound_word_is_valid_only_when_transmit_full() {
        let full = StatusSnapshot::new(Dscr::TXFULL.bits());
        let word = ChannelWord::observe(0x1234, Direction::ToController, full);
        assert!(word.is_valid());
        assert_eq!(word.into_word(), Ok(0x1234));

        let empty = StatusSnapshot::new(0);
        let word = ChannelWord::observe(0x1234, Direction::ToController, empty);
        assert!(!word.is_valid());
        assert_eq!(word.into_word(), Err(ProbeError::ChannelNotReady(empty)));
    }

    #[test]
    fn inbound_word_is_valid_by_construction() {
        let word = ChannelWord::observe(7, Direction::ToTarget, StatusSnapshot::new(0));
        assert_eq!(word.direction(), Direction::ToTarget);
        assert_eq!(word.into_word(), Ok(7));
    }

    #[test]
    fn empty_transmit_register_is_never_read() {
        struct Script {
            raw: u32,
            reads: Vec<u32>,
        }

        impl RegisterBlock for Script {
            fn read32(&mut self, offset: u32) -> u32 {
                self.reads.push(offset);
                self.raw
            }

            fn write32(&mut self, _offset: u32, _value: u32) {}
        }

        // Injection completes cleanly but the full flag stays clear.
        let mut block = Script {
            raw: Dscr::ITE.bits(),
            reads: Vec::new(),
        };
        let mut inj = Injector::new(&mut block, PollBudget::new(4));
        let err = save_r0(&mut inj).expect_err("channel is empty");
        assert!(matches!(err, ProbeError::ChannelNotReady(_)));
        assert!(!block.reads.contains(&TRANSMIT));
    }
}
