//! Remote execution over a processor debug port.
//!
//! A controller core halts a peer core through its memory-mapped debug
//! registers, injects machine instructions into it one at a time,
//! exchanges 32-bit words with it through a one-word transfer channel,
//! and resumes it, all without any cooperating software on the target.
//! Composed on top of that primitive, the probe sequence elevates the
//! target's privilege mode, reads state reachable only from the higher
//! privilege level (a control register or an arbitrary memory word), and
//! restores the target to its exact prior state before resuming it.
//!
//! The harness owns entry registration, core-affinity dispatch, and the
//! mapping of the two register blocks; this crate owns the protocol.

/// Raw register access over an already-mapped peripheral block.
pub mod access;
pub use access::{MmioBlock, RegisterBlock};

/// Wire-level register maps for the debug and cross-trigger blocks.
pub mod regs;
pub use regs::{unlock, UNLOCK_KEY};

/// Failure taxonomy and status snapshots.
pub mod fault;
pub use fault::{ProbeError, StatusSnapshot};

/// Pure instruction encoders.
pub mod encoder;
pub use encoder::CoprocReg;

/// Instruction injection engine with bounded polling.
pub mod inject;
pub use inject::{Injector, PollBudget, DEFAULT_POLL_LIMIT};

/// One-word data transfer channel.
pub mod channel;
pub use channel::{ChannelWord, Direction};

/// Halt/resume synchronization strategies.
pub mod halt;
pub use halt::HaltStrategy;

/// Session lifecycle and the guaranteed unwind.
pub mod session;
pub use session::{SessionConfig, SessionState};

/// Secure-state extraction entry surface.
pub mod probe;
pub use probe::{MemoryDump, ProbeTarget};

/// Simulated target core for tests and harness bring-up.
pub mod sim;
pub use sim::{SimBlock, SimFaults, SimTarget};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
