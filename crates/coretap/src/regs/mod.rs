//! Wire-level register maps for the two hardware blocks.
//!
//! Offsets and bit positions are the contract with the debug and
//! cross-trigger peripherals and are reproduced bit-exact.

pub mod cti;
pub mod debug;

use crate::access::RegisterBlock;

/// Magic key accepted by the software lock register on both blocks.
pub const UNLOCK_KEY: u32 = 0xC5AC_CE55;

/// Unlocks a register block for external accesses.
///
/// Writes the documented key to the lock-access register, then clears the
/// OS lock. Idempotent; must run once per block per session before any
/// other register in the block is touched; while either lock is engaged
/// the hardware silently ignores writes.
pub fn unlock<B: RegisterBlock>(block: &mut B) {
    block.write32(debug::LOCK_ACCESS, UNLOCK_KEY);
    block.write32(debug::OS_LOCK, 0);
}
