//! Two-level table construction.
//!
//! A [`PageDirectory`] owns one first-level table and every second-level table linked from
//! it. Mappings are always confined to the 1 MiB window of a single second-level table: a
//! request that would run past slot 255 is rejected rather than continued into the next
//! window.

use crate::{
    AccessPermission, AddressTranslator, HumanSize, MmuError, PhysicalAddress, VirtualAddress,
    descriptor::{self, FirstLevelEntry, L2_ENTRY_COUNT, PAGE_SIZE, PageEntry},
    page_source::{BlockSize, PageSource},
    table::{FirstLevelTable, L1_TABLE_SIZE, SecondLevelTable},
};

/// Mask applied to the first-level table address before it is loaded into TTBR0.
const TTBR_ADDRESS_MASK: u32 = 0xFFFF_C000;

/// Returns a pointer to the table stored at `base`.
fn table_ptr<T>(base: PhysicalAddress) -> *mut T {
    AddressTranslator::current().phys_to_ptr(base)
}

/// Checks that `size` bytes starting at second-level slot `l2_index` fit in one table and
/// returns the page count.
fn check_window(l2_index: usize, size: usize) -> Result<usize, MmuError> {
    let count = descriptor::pages_for(size);
    if l2_index + count > L2_ENTRY_COUNT {
        log::warn!(
            "rejecting {} region at slot {}: only {} slots remain",
            HumanSize(size),
            l2_index,
            L2_ENTRY_COUNT - l2_index
        );
        return Err(MmuError::RegionExceedsTable);
    }
    Ok(count)
}

/// The translation tables of one address space.
pub struct PageDirectory {
    /// Physical address of the first-level table.
    base: PhysicalAddress,
}

impl PageDirectory {
    /// Allocates an empty first-level table.
    pub fn create<P: PageSource + ?Sized>(pages: &mut P) -> Result<Self, MmuError> {
        let base = pages.allocate(BlockSize::FirstLevelTable)?;
        debug_assert!(
            base.is_aligned(L1_TABLE_SIZE as u32),
            "first-level table must be 16 KiB aligned"
        );

        // SAFETY: The page source just handed us this block; nothing else refers to it. An
        // all-zero table is a table of unmapped entries.
        unsafe {
            table_ptr::<FirstLevelTable>(base).write_bytes(0, 1);
        }

        log::trace!("allocated first-level table at {}", base);
        Ok(Self { base })
    }

    /// Returns the physical address of the first-level table.
    pub fn table_base(&self) -> PhysicalAddress {
        self.base
    }

    /// Returns the value to load into the translation table base register.
    pub fn ttbr_value(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.base.as_u32() & TTBR_ADDRESS_MASK)
    }

    fn root(&self) -> &FirstLevelTable {
        // SAFETY: The first-level table is owned by this directory for its whole lifetime.
        unsafe { &*table_ptr::<FirstLevelTable>(self.base) }
    }

    fn root_mut(&mut self) -> &mut FirstLevelTable {
        // SAFETY: As above; `&mut self` guarantees exclusive access.
        unsafe { &mut *table_ptr::<FirstLevelTable>(self.base) }
    }

    fn second_level(&self, table: PhysicalAddress) -> &SecondLevelTable {
        // SAFETY: `table` was read from one of our own first-level slots, and every slot we
        // populate points at a second-level table we allocated and own.
        unsafe { &*table_ptr::<SecondLevelTable>(table) }
    }

    fn second_level_mut(&mut self, table: PhysicalAddress) -> &mut SecondLevelTable {
        // SAFETY: As above; `&mut self` guarantees exclusive access.
        unsafe { &mut *table_ptr::<SecondLevelTable>(table) }
    }

    /// Returns the second-level table linked from `l1_index`, if any.
    pub fn second_level_table(&self, l1_index: usize) -> Option<PhysicalAddress> {
        self.root().entry(l1_index).table_address()
    }

    /// Iterates over every linked second-level table as `(l1_index, table address)`.
    pub fn second_level_tables(&self) -> impl Iterator<Item = (usize, PhysicalAddress)> + '_ {
        self.root()
            .page_tables()
            .filter_map(|(index, entry)| entry.table_address().map(|table| (index, table)))
    }

    /// Returns the second-level table for `l1_index`, allocating and linking a fresh one when
    /// the slot is still unmapped.
    ///
    /// Calling this again for the same slot returns the same table.
    pub fn ensure_second_level_table<P: PageSource + ?Sized>(
        &mut self,
        pages: &mut P,
        l1_index: usize,
    ) -> Result<PhysicalAddress, MmuError> {
        if let Some(table) = self.root().entry(l1_index).table_address() {
            return Ok(table);
        }

        let table = pages.allocate(BlockSize::SecondLevelTable)?;

        // SAFETY: Freshly allocated and not yet linked. The table is cleared before the slot
        // below makes it reachable by the hardware walker.
        unsafe {
            table_ptr::<SecondLevelTable>(table).write_bytes(0, 1);
        }
        *self.root_mut().entry_mut(l1_index) = FirstLevelEntry::page_table(table);

        log::trace!(
            "linked second-level table {} at slot {:#x} of {}",
            table,
            l1_index,
            self.base
        );
        Ok(table)
    }

    /// Maps `size` bytes at `virt`, backing every page with a freshly allocated frame.
    ///
    /// Fails with [`MmuError::RegionExceedsTable`] before touching any table when the region
    /// does not fit in the remaining slots of its second-level table. Every frame is obtained
    /// before the first slot is written, so a page-source failure leaves the slots untouched
    /// as well.
    pub fn map_region<P: PageSource + ?Sized>(
        &mut self,
        pages: &mut P,
        virt: VirtualAddress,
        size: usize,
        access: AccessPermission,
    ) -> Result<(), MmuError> {
        let (l1_index, l2_index) = descriptor::decompose(virt);
        let count = check_window(l2_index, size)?;
        let table = self.ensure_second_level_table(pages, l1_index)?;

        let mut frames = [PhysicalAddress::default(); L2_ENTRY_COUNT];
        for frame in frames.iter_mut().take(count) {
            *frame = pages.allocate(BlockSize::Page)?;
        }

        let l2 = self.second_level_mut(table);
        for (offset, frame) in frames[..count].iter().enumerate() {
            *l2.entry_mut(l2_index + offset) = PageEntry::new(*frame, access);

            #[cfg(feature = "detailed-logging")]
            log::trace!(
                "mapped {} -> {} ({:?})",
                virt + (offset * PAGE_SIZE) as u32,
                frame,
                access
            );
        }

        Ok(())
    }

    /// Maps `size` bytes at `virt` onto the physical range at the same address.
    ///
    /// The start address is truncated to its page; any offset within the first page is
    /// dropped. Straight mappings are always privileged-only.
    pub fn map_straight_region<P: PageSource + ?Sized>(
        &mut self,
        pages: &mut P,
        virt: VirtualAddress,
        size: usize,
    ) -> Result<(), MmuError> {
        let (l1_index, l2_index) = descriptor::decompose(virt);
        let count = check_window(l2_index, size)?;
        let table = self.ensure_second_level_table(pages, l1_index)?;

        let origin = virt.align_down(PAGE_SIZE as u32).as_u32();
        let l2 = self.second_level_mut(table);
        for offset in 0..count {
            let frame = PhysicalAddress::new(origin + (offset * PAGE_SIZE) as u32);
            *l2.entry_mut(l2_index + offset) =
                PageEntry::new(frame, AccessPermission::PrivilegedOnly);
        }

        Ok(())
    }

    /// Maps the single page at `virt` onto an already obtained `frame`.
    pub fn map_page<P: PageSource + ?Sized>(
        &mut self,
        pages: &mut P,
        virt: VirtualAddress,
        frame: PhysicalAddress,
        access: AccessPermission,
    ) -> Result<(), MmuError> {
        let (l1_index, l2_index) = descriptor::decompose(virt);
        let table = self.ensure_second_level_table(pages, l1_index)?;
        *self.second_level_mut(table).entry_mut(l2_index) = PageEntry::new(frame, access);
        Ok(())
    }

    /// Looks up the page entry for `virt`. Returns None if the page is unmapped.
    pub fn translate(&self, virt: VirtualAddress) -> Option<PageEntry> {
        let (l1_index, l2_index) = descriptor::decompose(virt);
        let table = self.second_level_table(l1_index)?;
        let entry = self.second_level(table).entry(l2_index);
        entry.is_present().then_some(entry)
    }
}
