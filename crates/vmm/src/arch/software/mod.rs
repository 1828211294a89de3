//! Software emulation for testing and host-side tooling.
//!
//! This module provides:
//! - [`EmulatedMemory`], a block of host memory standing in for physical RAM;
//! - [`EmulatedPageSource`], a [`PageSource`] carving blocks out of that RAM;
//! - [`SimulatedControl`], a [`TranslationControl`] that records register state instead of
//!   touching hardware.

use alloc::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use alloc::vec::Vec;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    AddressTranslator, AllocError, BlockSize, DomainAccessControl, PageSource, PhysicalAddress,
    TranslationControl, descriptor::PAGE_SIZE,
};

/// Emulated physical RAM.
///
/// A zero-filled, page-aligned host buffer mapped at a chosen physical base address. Blocks are
/// handed out by a bump allocator and never reused, so every allocation is zero-filled.
pub struct EmulatedMemory {
    /// Start of the host buffer.
    memory: NonNull<u8>,
    /// Layout the buffer was allocated with.
    layout: Layout,
    /// Physical address of the first byte.
    base: PhysicalAddress,
    /// Next allocation offset (simple bump allocator).
    next_alloc: AtomicUsize,
}

impl EmulatedMemory {
    /// Creates `size` bytes of emulated RAM at physical address `base`.
    ///
    /// # Panics
    /// Panics if `base` is not page aligned or the region does not fit below 4 GiB.
    pub fn new(base: PhysicalAddress, size: usize) -> Self {
        assert!(
            base.is_aligned(PAGE_SIZE as u32),
            "emulated RAM must start on a page boundary"
        );
        assert!(
            base.as_usize() as u64 + size as u64 <= 1 << 32,
            "emulated RAM must fit in the 32-bit physical address space"
        );

        let size = size.next_multiple_of(PAGE_SIZE).max(PAGE_SIZE);
        let layout = Layout::from_size_align(size, PAGE_SIZE).expect("invalid emulated RAM size");

        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        let memory = NonNull::new(ptr).unwrap_or_else(|| handle_alloc_error(layout));

        Self {
            memory,
            layout,
            base,
            next_alloc: AtomicUsize::new(0),
        }
    }

    /// Allocates a block of memory from the emulated RAM.
    ///
    /// Returns the physical address of the allocated block, or None if there's not enough
    /// space left.
    pub fn allocate(&self, size: usize, align: usize) -> Option<PhysicalAddress> {
        loop {
            let current = self.next_alloc.load(Ordering::Relaxed);

            // Physical alignment, not host alignment, is what the MMU cares about.
            let phys = self.base.as_usize() + current;
            let aligned = phys.next_multiple_of(align) - self.base.as_usize();
            let end = aligned + size;

            if end > self.layout.size() {
                return None;
            }

            if self
                .next_alloc
                .compare_exchange(current, end, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return Some(self.base + aligned as u32);
            }
        }
    }

    /// Translates a physical address to a pointer into the buffer.
    ///
    /// # Panics
    /// Panics if the address is outside the emulated RAM.
    pub fn translate(&self, phys: PhysicalAddress) -> *mut u8 {
        let offset = phys
            .as_usize()
            .checked_sub(self.base.as_usize())
            .filter(|offset| *offset < self.layout.size())
            .expect("physical address outside emulated RAM");

        // SAFETY: `offset` is within the buffer.
        unsafe { self.memory.as_ptr().add(offset) }
    }

    /// Returns the physical address of the first byte of emulated RAM.
    pub fn base(&self) -> PhysicalAddress {
        self.base
    }

    /// Returns the size of the emulated RAM in bytes.
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Returns the number of bytes handed out so far, including alignment padding.
    pub fn used(&self) -> usize {
        self.next_alloc.load(Ordering::Relaxed)
    }
}

impl Drop for EmulatedMemory {
    fn drop(&mut self) {
        // SAFETY: Allocated in `new` with this exact layout.
        unsafe { dealloc(self.memory.as_ptr(), self.layout) }
    }
}

/// A [`PageSource`] backed by the current thread's emulated RAM.
///
/// An optional limit makes the source fail after a fixed number of blocks, to exercise
/// out-of-memory paths.
#[derive(Debug, Default)]
pub struct EmulatedPageSource {
    remaining: Option<usize>,
    allocated: usize,
}

impl EmulatedPageSource {
    /// Creates a source limited only by the size of the emulated RAM.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source that fails after `blocks` successful allocations.
    pub fn with_limit(blocks: usize) -> Self {
        Self {
            remaining: Some(blocks),
            allocated: 0,
        }
    }

    /// Returns the number of blocks handed out so far.
    pub fn allocated(&self) -> usize {
        self.allocated
    }
}

impl PageSource for EmulatedPageSource {
    fn allocate(&mut self, size: BlockSize) -> Result<PhysicalAddress, AllocError> {
        if self.remaining == Some(0) {
            return Err(AllocError::OutOfMemory);
        }

        let bytes = size.bytes();
        let block = AddressTranslator::current()
            .allocate(bytes, bytes)
            .ok_or(AllocError::OutOfMemory)?;

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        self.allocated += 1;
        Ok(block)
    }
}

/// A hardware operation observed by [`SimulatedControl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    SetDomainAccessControl(DomainAccessControl),
    SetTranslationTableBase(PhysicalAddress),
    DisableTranslation,
    EnableTranslation,
}

/// A [`TranslationControl`] that models the registers in memory.
#[derive(Debug, Default)]
pub struct SimulatedControl {
    dacr: DomainAccessControl,
    ttbr: Option<PhysicalAddress>,
    enabled: bool,
    events: Vec<ControlEvent>,
    base_writes_while_enabled: usize,
}

impl SimulatedControl {
    /// Creates a simulated core with translation off and every register cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current domain access control register value.
    pub fn domain_access_control(&self) -> DomainAccessControl {
        self.dacr
    }

    /// Returns the current translation table base, or None if it was never written.
    pub fn translation_table_base(&self) -> Option<PhysicalAddress> {
        self.ttbr
    }

    /// Returns whether translation is currently on.
    pub fn is_translation_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns every operation issued so far, oldest first.
    pub fn events(&self) -> &[ControlEvent] {
        &self.events
    }

    /// Returns how many times the table base was written while translation was on.
    pub fn base_writes_while_enabled(&self) -> usize {
        self.base_writes_while_enabled
    }

    /// Forgets the recorded events, keeping register state.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }
}

impl TranslationControl for SimulatedControl {
    fn set_domain_access_control(&mut self, dacr: DomainAccessControl) {
        self.dacr = dacr;
        self.events.push(ControlEvent::SetDomainAccessControl(dacr));
    }

    fn set_translation_table_base(&mut self, base: PhysicalAddress) {
        if self.enabled {
            self.base_writes_while_enabled += 1;
        }
        self.ttbr = Some(base);
        self.events.push(ControlEvent::SetTranslationTableBase(base));
    }

    fn disable_translation(&mut self) {
        self.enabled = false;
        self.events.push(ControlEvent::DisableTranslation);
    }

    fn enable_translation(&mut self) {
        self.enabled = true;
        self.events.push(ControlEvent::EnableTranslation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_physically_aligned_blocks() {
        let mem = EmulatedMemory::new(PhysicalAddress::new(0x8000_0000), 64 * 1024);

        let small = mem.allocate(1024, 1024).unwrap();
        let large = mem.allocate(16 * 1024, 16 * 1024).unwrap();

        assert_eq!(small, PhysicalAddress::new(0x8000_0000));
        assert_eq!(large, PhysicalAddress::new(0x8000_4000));
        assert_eq!(mem.used(), 0x8000);
    }

    #[test]
    fn reports_exhaustion() {
        let mem = EmulatedMemory::new(PhysicalAddress::new(0x8000_0000), 8 * 1024);
        assert!(mem.allocate(4096, 4096).is_some());
        assert!(mem.allocate(4096, 4096).is_some());
        assert!(mem.allocate(4096, 4096).is_none());
    }

    #[test]
    fn memory_is_zeroed_and_writable() {
        let mem = EmulatedMemory::new(PhysicalAddress::new(0x8000_0000), 4096);
        let ptr = mem.translate(PhysicalAddress::new(0x8000_0010));
        unsafe {
            assert_eq!(*ptr, 0);
            *ptr = 0xAB;
            assert_eq!(*mem.translate(PhysicalAddress::new(0x8000_0010)), 0xAB);
        }
    }

    #[test]
    #[should_panic(expected = "physical address outside emulated RAM")]
    fn rejects_addresses_below_base() {
        let mem = EmulatedMemory::new(PhysicalAddress::new(0x8000_0000), 4096);
        let _ = mem.translate(PhysicalAddress::new(0x7FFF_F000));
    }

    #[test]
    fn limited_page_source_runs_dry() {
        crate::testing::setup();
        let mut pages = EmulatedPageSource::with_limit(1);

        assert!(pages.allocate(BlockSize::Page).is_ok());
        assert_eq!(
            pages.allocate(BlockSize::Page),
            Err(AllocError::OutOfMemory)
        );
        assert_eq!(pages.allocated(), 1);
    }

    #[test]
    fn simulated_control_tracks_register_state() {
        let mut control = SimulatedControl::new();
        control.set_translation_table_base(PhysicalAddress::new(0x8000_4000));
        control.enable_translation();
        control.set_translation_table_base(PhysicalAddress::new(0x8000_8000));

        assert!(control.is_translation_enabled());
        assert_eq!(
            control.translation_table_base(),
            Some(PhysicalAddress::new(0x8000_8000))
        );
        assert_eq!(control.base_writes_while_enabled(), 1);
        assert_eq!(control.events().len(), 3);
    }
}
