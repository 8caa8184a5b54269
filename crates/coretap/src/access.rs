//! Raw register access over an already-mapped peripheral block.
//!
//! Every call is a single memory-mapped I/O transaction: no buffering, no
//! retries, no caching. The block must be mapped into the controller's
//! address space and exclusively owned for the duration of a session; under
//! that precondition an access cannot fail, so the contract is infallible
//! and failures surface only at the protocol level (timeouts, error bits).

/// One 4 KiB peripheral register block accessed in 32-bit transactions.
pub trait RegisterBlock {
    /// Reads the 32-bit register at `offset` (byte offset from the base).
    fn read32(&mut self, offset: u32) -> u32;

    /// Writes the 32-bit register at `offset`.
    fn write32(&mut self, offset: u32, value: u32);

    /// Read-modify-write: sets `bits` in the register at `offset`.
    fn set_bits32(&mut self, offset: u32, bits: u32) {
        let value = self.read32(offset);
        self.write32(offset, value | bits);
    }

    /// Read-modify-write: clears `bits` in the register at `offset`.
    fn clear_bits32(&mut self, offset: u32, bits: u32) {
        let value = self.read32(offset);
        self.write32(offset, value & !bits);
    }
}

/// Memory-mapped register block over a raw virtual base address.
///
/// This is the production implementation: the harness maps the physical
/// register page and hands the virtual base to [`MmioBlock::new`].
#[derive(Debug)]
pub struct MmioBlock {
    base: *mut u32,
    size: u32,
}

// The caller guarantees exclusive ownership of the mapping, so moving the
// block to another thread cannot introduce a second accessor.
#[allow(unsafe_code)]
unsafe impl Send for MmioBlock {}

impl MmioBlock {
    /// Wraps a mapped register page of `size` bytes starting at `base`.
    ///
    /// # Safety
    ///
    /// `base` must point to a live mapping of at least `size` bytes of
    /// device memory, 4-byte aligned, and the caller must hold exclusive
    /// read/write access to it for the lifetime of the returned block.
    #[allow(unsafe_code)]
    #[must_use]
    pub const unsafe fn new(base: *mut u32, size: u32) -> Self {
        Self { base, size }
    }
}

impl RegisterBlock for MmioBlock {
    #[allow(unsafe_code)]
    fn read32(&mut self, offset: u32) -> u32 {
        debug_assert!(offset % 4 == 0 && offset < self.size);
        // SAFETY: in-bounds per the constructor contract, and volatile so
        // the compiler never elides or reorders device accesses.
        unsafe { self.base.add(offset as usize / 4).read_volatile() }
    }

    #[allow(unsafe_code)]
    fn write32(&mut self, offset: u32, value: u32) {
        debug_assert!(offset % 4 == 0 && offset < self.size);
        // SAFETY: see read32.
        unsafe { self.base.add(offset as usize / 4).write_volatile(value) }
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::{MmioBlock, RegisterBlock};

    #[test]
    fn mmio_block_round_trips_through_backing_memory() {
        let mut backing = [0_u32; 4];
        let mut block = unsafe { MmioBlock::new(backing.as_mut_ptr(), 16) };

        block.write32(0x4, 0x2EFA_D510);
        assert_eq!(block.read32(0x4), 0x2EFA_D510);
        assert_eq!(block.read32(0x0), 0);

        drop(block);
        assert_eq!(backing[1], 0x2EFA_D510);
    }

    #[test]
    fn rmw_helpers_only_touch_named_bits() {
        let mut backing = [0b1010_u32; 1];
        let mut block = unsafe { MmioBlock::new(backing.as_mut_ptr(), 4) };

        block.set_bits32(0, 0b0101);
        assert_eq!(block.read32(0), 0b1111);
        block.clear_bits32(0, 0b0011);
        assert_eq!(block.read32(0), 0b1100);
    }
}
