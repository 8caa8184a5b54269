//! Cross-trigger register block: routes a trigger event from the
//! controller into the target's debug logic, halting or restarting it
//! without a per-core request bit.
//!
//! Channel 0 carries halt requests and channel 1 restart requests, each
//! addressed by one bit of the channel-indexed registers.

/// Global control register.
pub const CONTROL: u32 = 0x0;

/// Global-enable bit inside [`CONTROL`].
pub const GLOBAL_ENABLE: u32 = 1 << 0;

/// Interrupt acknowledge register; write a channel bit to acknowledge.
pub const INT_ACK: u32 = 0x10;

/// Application pulse register; write a channel bit to fire the trigger.
pub const APP_PULSE: u32 = 0x1C;

/// Output enable for channel 0 (halt requests).
pub const OUT_ENABLE_0: u32 = 0xA0;

/// Output enable for channel 1 (restart requests).
pub const OUT_ENABLE_1: u32 = 0xA4;

/// Trigger-output status; a set channel bit means the trigger is still
/// pending acknowledgement.
pub const TRIG_OUT_STATUS: u32 = 0x134;

/// Channel gate register; a channel's gate bit controls propagation of its
/// trigger beyond this interface.
pub const GATE: u32 = 0x140;

/// Bit addressing channel 0 in the channel-indexed registers.
pub const CHANNEL_0: u32 = 1 << 0;

/// Bit addressing channel 1 in the channel-indexed registers.
pub const CHANNEL_1: u32 = 1 << 1;
