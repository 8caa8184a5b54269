//! Secure-state extraction entry surface.
//!
//! One synchronous entry point per probe type, invoked by the harness on a
//! chosen controller core with both register blocks already mapped. Every
//! probe runs the same strictly ordered sequence: unlock, halt, save
//! disturbed registers, elevate privilege, read, restore in reverse order,
//! resume. A probe value is never surfaced until the target's context
//! has been fully restored.

use std::sync::{Mutex, TryLockError};

use log::{debug, info};

use crate::access::RegisterBlock;
use crate::channel;
use crate::encoder::{self, CoprocReg};
use crate::fault::ProbeError;
use crate::inject::Injector;
use crate::session::{HaltSession, Ports, SessionConfig};

/// Bytes covered by one four-word row of a memory dump.
const ROW_BYTES: u32 = 16;

/// A dumped memory region: `words` holds ceil(len/16) four-word rows
/// starting at `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemoryDump {
    /// First dumped address.
    pub base: u32,
    /// Byte length that was requested (the dump rounds up to whole rows).
    pub len: u32,
    /// Dumped words in address order.
    pub words: Vec<u32>,
}

impl MemoryDump {
    /// Iterates the dump as `(row address, four words)` pairs.
    #[allow(clippy::cast_possible_truncation)]
    pub fn rows(&self) -> impl Iterator<Item = (u32, &[u32])> {
        self.words
            .chunks(4)
            .enumerate()
            .map(|(i, row)| (self.base.wrapping_add(i as u32 * ROW_BYTES), row))
    }
}

/// One target core reachable through its debug (and optionally
/// cross-trigger) register block.
///
/// Exactly one session may be open against the target at a time; the
/// entry points serialize through an internal lock and reject a
/// concurrent open with [`ProbeError::SessionActive`] rather than
/// queueing behind a halted core.
#[derive(Debug)]
pub struct ProbeTarget<B: RegisterBlock> {
    ports: Mutex<Ports<B>>,
    config: SessionConfig,
}

impl<B: RegisterBlock> ProbeTarget<B> {
    /// Builds a target from its debug block alone (direct-request
    /// strategy only).
    pub fn new(debug_block: B, config: SessionConfig) -> Self {
        Self {
            ports: Mutex::new(Ports {
                debug: debug_block,
                cti: None,
            }),
            config,
        }
    }

    /// Builds a target from both register blocks.
    pub fn with_cross_trigger(debug_block: B, cti_block: B, config: SessionConfig) -> Self {
        Self {
            ports: Mutex::new(Ports {
                debug: debug_block,
                cti: Some(cti_block),
            }),
            config,
        }
    }

    /// Reads a privileged-only register from the target.
    ///
    /// # Errors
    ///
    /// Any [`ProbeError`]; failures after the halt still restore and
    /// resume the target first.
    pub fn read_register(&self, reg: CoprocReg) -> Result<u32, ProbeError> {
        let value = self.with_session(|inj| {
            channel::save_via_r0(inj, encoder::move_to_r0(reg))
        })?;
        info!("privileged register read: {value:#010x}");
        Ok(value)
    }

    /// Reads one word of target memory at an absolute address.
    ///
    /// # Errors
    ///
    /// Any [`ProbeError`]; failures after the halt still restore and
    /// resume the target first.
    pub fn read_word(&self, addr: u32) -> Result<u32, ProbeError> {
        let value = self.with_session(|inj| read_memory_word(inj, addr))?;
        info!("memory word at {addr:#010x}: {value:#010x}");
        Ok(value)
    }

    /// Dumps a memory region whose base pointer and byte length are
    /// themselves stored in target memory.
    ///
    /// Reads the pointer at `pointer_addr` and the length at
    /// `length_addr` while elevated, then fetches the region in four-word
    /// rows, each word independently loaded and dereferenced.
    ///
    /// # Errors
    ///
    /// Any [`ProbeError`]; failures after the halt still restore and
    /// resume the target first.
    #[allow(clippy::cast_possible_truncation)]
    pub fn dump_region(
        &self,
        pointer_addr: u32,
        length_addr: u32,
    ) -> Result<MemoryDump, ProbeError> {
        self.with_session(|inj| {
            let base = read_memory_word(inj, pointer_addr)?;
            let len = read_memory_word(inj, length_addr)?;
            debug!("dumping {len:#x} bytes at {base:#010x}");

            let rows = len.div_ceil(ROW_BYTES);
            let mut words = Vec::with_capacity(rows as usize * 4);
            for row in 0..rows {
                let addr = base.wrapping_add(row * ROW_BYTES);
                let mut line = [0_u32; 4];
                for (i, word) in (0_u32..).zip(line.iter_mut()) {
                    *word = read_memory_word(inj, addr.wrapping_add(i * 4))?;
                }
                info!(
                    "{addr:08x}: {:08x} {:08x} {:08x} {:08x}",
                    line[0], line[1], line[2], line[3]
                );
                words.extend_from_slice(&line);
            }
            Ok(MemoryDump { base, len, words })
        })
    }

    /// Opens a session, runs `body` on the halted and elevated target,
    /// and unwinds.
    ///
    /// This is the escape hatch for probe sequences the fixed entry
    /// points do not cover: `body` receives the injection engine
    /// directly and may run any instruction sequence, under the same
    /// save/elevate/restore/resume bracket as the built-in probes.
    ///
    /// # Errors
    ///
    /// [`ProbeError::SessionActive`] if a session is already open
    /// against this target, otherwise any error from the session or
    /// from `body`; failures after the halt still restore and resume
    /// the target first.
    pub fn with_session<T, F>(&self, body: F) -> Result<T, ProbeError>
    where
        F: FnOnce(&mut Injector<'_, B>) -> Result<T, ProbeError>,
    {
        let mut ports = match self.ports.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(ProbeError::SessionActive),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let mut session = HaltSession::open(&mut ports, self.config);
        let value = session.run_elevated(body)?;
        debug!("session complete in state {:?}", session.state());
        Ok(value)
    }
}

/// Loads an absolute address into r0, dereferences it, and retrieves the
/// word through the channel.
fn read_memory_word<B: RegisterBlock>(
    inj: &mut Injector<'_, B>,
    addr: u32,
) -> Result<u32, ProbeError> {
    for instruction in encoder::load_immediate32(addr) {
        inj.inject(instruction)?;
    }
    inj.inject(encoder::load_indirect())?;
    channel::save_r0(inj)
}
