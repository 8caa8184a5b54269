//! Pure instruction encoders.
//!
//! The injection engine can only make the halted target execute single
//! instruction words (it can never call existing target code), so every
//! operation the sequencer needs is synthesized here. All encoders are
//! deterministic functions from semantic parameters to 32-bit A32
//! instruction words; none of them touch hardware. General-purpose
//! register 0 is the single scratch register of the whole protocol.

/// Mask of the mode-selector bits in the target's status register.
pub const MODE_MASK: u32 = 0x1F;

/// Mode-selector value for the elevated (secure-capable) execution mode.
pub const ELEVATED_MODE: u32 = 0x16;

/// Mode-selector value for the unprivileged execution mode.
pub const USER_MODE: u32 = 0x10;

/// A coprocessor register selector, the transport for privileged state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoprocReg {
    /// Coprocessor number.
    pub coproc: u32,
    /// Primary opcode.
    pub opc1: u32,
    /// Primary register selector.
    pub crn: u32,
    /// Secondary register selector.
    pub crm: u32,
    /// Secondary opcode.
    pub opc2: u32,
}

impl CoprocReg {
    /// The data-transfer-channel register: moving r0 to or from it is the
    /// target-side half of the one-word channel.
    pub const DTR_TRANSFER: Self = Self::new(14, 0, 0, 5, 0);

    /// The debug-state saved program counter, the one privileged special
    /// register the probe sequence disturbs and must restore.
    pub const SAVED_PC: Self = Self::new(15, 3, 4, 5, 1);

    /// The secure configuration register, readable only from the elevated
    /// execution mode.
    pub const SECURE_CONFIG: Self = Self::new(15, 0, 1, 1, 0);

    /// Builds a selector from raw coprocessor fields.
    #[must_use]
    pub const fn new(coproc: u32, opc1: u32, crn: u32, crm: u32, opc2: u32) -> Self {
        Self {
            coproc,
            opc1,
            crn,
            crm,
            opc2,
        }
    }

    const fn pack(self) -> u32 {
        ((self.opc1 & 0x7) << 21)
            | ((self.crn & 0xF) << 16)
            | ((self.coproc & 0xF) << 8)
            | ((self.opc2 & 0x7) << 5)
            | (self.crm & 0xF)
    }
}

/// Encodes "copy coprocessor register to r0" (`mrc`).
#[must_use]
pub const fn move_to_r0(reg: CoprocReg) -> u32 {
    0xEE10_0010 | reg.pack()
}

/// Encodes "copy r0 to coprocessor register" (`mcr`).
#[must_use]
pub const fn move_from_r0(reg: CoprocReg) -> u32 {
    0xEE00_0010 | reg.pack()
}

/// Encodes a split 16-bit immediate load of `value` into r0.
///
/// The first word loads the low half and zero-extends, the second inserts
/// the high half; both must execute, in order, before r0 holds `value`.
#[must_use]
pub const fn load_immediate32(value: u32) -> [u32; 2] {
    let low = 0xE300_0000 | ((value & 0xF000) << 4) | (value & 0x0FFF);
    let high = 0xE340_0000 | ((value >> 12) & 0xF_0000) | ((value >> 16) & 0x0FFF);
    [low, high]
}

/// Encodes "dereference r0, result in r0" (`ldr r0, [r0]`).
#[must_use]
pub const fn load_indirect() -> u32 {
    0xE590_0000
}

/// Encodes a push of r0 onto the target's own stack.
///
/// Together with [`pop_r0`] this gives the sequencer a transient r0 spill
/// that does not occupy the one-word channel.
#[must_use]
pub const fn push_r0() -> u32 {
    0xE52D_0004
}

/// Encodes a pop of r0 from the target's own stack.
#[must_use]
pub const fn pop_r0() -> u32 {
    0xE49D_0004
}

/// Encodes "copy the mode/status register to r0" (`mrs r0, cpsr`).
#[must_use]
pub const fn read_status_register() -> u32 {
    0xE10F_0000
}

/// Encodes "copy r0 to the mode/status register" (`msr cpsr, r0`).
#[must_use]
pub const fn write_status_register() -> u32 {
    0xE129_F000
}

/// Encodes "clear the mode-selector bits of r0" (`bic r0, r0, #0x1F`).
#[must_use]
pub const fn clear_mode_bits() -> u32 {
    0xE3C0_0000 | MODE_MASK
}

/// Encodes "set mode-selector bits in r0" (`orr r0, r0, #bits`).
#[must_use]
pub const fn set_mode_bits(mode_bits: u32) -> u32 {
    0xE380_0000 | (mode_bits & 0xFF)
}

/// Encodes the full privilege-mode transition sequence.
///
/// Reads the current mode/status register into r0, clears the mode
/// selector, sets it to `target_mode_bits`, and writes r0 back. The words
/// must be injected in order; r0 is clobbered.
#[must_use]
pub const fn switch_privilege_mode(target_mode_bits: u32) -> [u32; 4] {
    [
        read_status_register(),
        clear_mode_bits(),
        set_mode_bits(target_mode_bits & MODE_MASK),
        write_status_register(),
    ]
}
