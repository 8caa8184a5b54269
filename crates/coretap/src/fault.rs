use core::fmt;

use thiserror::Error;

/// Raw debug status word captured at the moment a probe operation failed.
///
/// Carried inside every hardware-facing [`ProbeError`] variant so a caller
/// can see exactly what the target reported when the protocol gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct StatusSnapshot(u32);

impl StatusSnapshot {
    /// Wraps a raw status register word.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw status word.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the processor-status field (low six bits).
    #[must_use]
    pub const fn status_field(self) -> u32 {
        self.0 & crate::regs::debug::STATUS_FIELD_MASK
    }

    /// True when the sticky error bit was set in the snapshot.
    #[must_use]
    pub const fn error_set(self) -> bool {
        self.0 & (1 << 6) != 0
    }

    /// True when the target reported itself halted.
    #[must_use]
    pub const fn halted(self) -> bool {
        self.0 & 1 != 0
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Failure taxonomy for one probe run.
///
/// Every poll-based wait is bounded; exhaustion converts into the matching
/// timeout variant instead of looping forever. Any variant observed after a
/// successful halt is surfaced only once the restore-and-resume unwind has
/// run, so a failed probe never leaves the target halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ProbeError {
    /// The instruction-complete bit never appeared within the poll budget.
    #[error("injected instruction did not complete within the poll budget (status {0})")]
    InjectionTimeout(StatusSnapshot),
    /// The target flagged the sticky error bit after an injected instruction.
    #[error("target flagged an error after an injected instruction (status {0})")]
    InjectionError(StatusSnapshot),
    /// The transfer channel was not full when a word was expected.
    #[error("transfer channel held no valid word (status {0})")]
    ChannelNotReady(StatusSnapshot),
    /// The target never reported halted within the poll budget.
    #[error("target did not report halted within the poll budget (status {0})")]
    HaltTimeout(StatusSnapshot),
    /// The target never reported restarted within the poll budget.
    #[error("target did not report restarted within the poll budget (status {0})")]
    ResumeTimeout(StatusSnapshot),
    /// The cross-trigger strategy was selected without a cross-trigger block.
    #[error("cross-trigger halt strategy selected but no cross-trigger block was supplied")]
    CrossTriggerBlockMissing,
    /// Another session is already open against this target core.
    #[error("another session is already open against this target core")]
    SessionActive,
}

impl ProbeError {
    /// Returns the status snapshot carried by hardware-facing variants.
    #[must_use]
    pub const fn status(self) -> Option<StatusSnapshot> {
        match self {
            Self::InjectionTimeout(s)
            | Self::InjectionError(s)
            | Self::ChannelNotReady(s)
            | Self::HaltTimeout(s)
            | Self::ResumeTimeout(s) => Some(s),
            Self::CrossTriggerBlockMissing | Self::SessionActive => None,
        }
    }

    /// True for variants produced by an exhausted poll loop.
    #[must_use]
    pub const fn is_timeout(self) -> bool {
        matches!(
            self,
            Self::InjectionTimeout(_) | Self::HaltTimeout(_) | Self::ResumeTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{ProbeError, StatusSnapshot};

    #[test]
    fn snapshot_decodes_status_bits() {
        let snap = StatusSnapshot::new(0x13 | (1 << 6));
        assert_eq!(snap.status_field(), 0x13);
        assert!(snap.error_set());
        assert!(snap.halted());
        assert_eq!(snap.raw(), 0x53);
    }

    #[test]
    fn snapshot_displays_as_hex() {
        assert_eq!(StatusSnapshot::new(0x2EFA_D510).to_string(), "0x2efad510");
    }

    #[test]
    fn hardware_variants_carry_their_snapshot() {
        let snap = StatusSnapshot::new(0x2);
        assert_eq!(ProbeError::HaltTimeout(snap).status(), Some(snap));
        assert_eq!(ProbeError::InjectionError(snap).status(), Some(snap));
        assert_eq!(ProbeError::SessionActive.status(), None);
        assert_eq!(ProbeError::CrossTriggerBlockMissing.status(), None);
    }

    #[test]
    fn timeout_classification_matches_taxonomy() {
        let snap = StatusSnapshot::new(0);
        assert!(ProbeError::InjectionTimeout(snap).is_timeout());
        assert!(ProbeError::HaltTimeout(snap).is_timeout());
        assert!(ProbeError::ResumeTimeout(snap).is_timeout());
        assert!(!ProbeError::InjectionError(snap).is_timeout());
        assert!(!ProbeError::SessionActive.is_timeout());
    }
}
