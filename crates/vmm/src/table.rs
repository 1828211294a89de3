//! Translation table layouts.
//!
//! Both tables are plain arrays of descriptor words with the exact in-memory layout the MMU
//! walks. They never live on the heap; a [`crate::PageDirectory`] places them in blocks taken
//! from a [`crate::PageSource`] and reaches them through the [`crate::AddressTranslator`].

use crate::descriptor::{FirstLevelEntry, L1_ENTRY_COUNT, L2_ENTRY_COUNT, PageEntry};

/// Size in bytes of a first-level table (16 KiB).
pub const L1_TABLE_SIZE: usize = L1_ENTRY_COUNT * core::mem::size_of::<FirstLevelEntry>();

/// Size in bytes of a second-level table (1 KiB).
pub const L2_TABLE_SIZE: usize = L2_ENTRY_COUNT * core::mem::size_of::<PageEntry>();

/// A first-level translation table: 4096 slots, one per 1 MiB of virtual address space.
#[repr(transparent)]
pub struct FirstLevelTable {
    entries: [FirstLevelEntry; L1_ENTRY_COUNT],
}

impl FirstLevelTable {
    /// Creates a table with every slot unmapped.
    pub const fn new() -> Self {
        Self {
            entries: [FirstLevelEntry::empty(); L1_ENTRY_COUNT],
        }
    }

    /// Returns the entry at the given index.
    ///
    /// # Panics
    /// Panics if index >= 4096.
    pub fn entry(&self, index: usize) -> FirstLevelEntry {
        assert!(index < L1_ENTRY_COUNT, "first-level index out of bounds");
        self.entries[index]
    }

    /// Returns a mutable reference to the entry at the given index.
    ///
    /// # Panics
    /// Panics if index >= 4096.
    pub fn entry_mut(&mut self, index: usize) -> &mut FirstLevelEntry {
        assert!(index < L1_ENTRY_COUNT, "first-level index out of bounds");
        &mut self.entries[index]
    }

    /// Iterates over the indices and entries of populated slots.
    pub fn page_tables(&self) -> impl Iterator<Item = (usize, FirstLevelEntry)> + '_ {
        self.entries
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, entry)| entry.is_page_table())
    }
}

impl Default for FirstLevelTable {
    fn default() -> Self {
        Self::new()
    }
}

/// A second-level translation table: 256 small page slots covering one 1 MiB window.
#[repr(transparent)]
pub struct SecondLevelTable {
    entries: [PageEntry; L2_ENTRY_COUNT],
}

impl SecondLevelTable {
    /// Creates a table with every slot unmapped.
    pub const fn new() -> Self {
        Self {
            entries: [PageEntry::empty(); L2_ENTRY_COUNT],
        }
    }

    /// Returns the entry at the given index.
    ///
    /// # Panics
    /// Panics if index >= 256.
    pub fn entry(&self, index: usize) -> PageEntry {
        assert!(index < L2_ENTRY_COUNT, "second-level index out of bounds");
        self.entries[index]
    }

    /// Returns a mutable reference to the entry at the given index.
    ///
    /// # Panics
    /// Panics if index >= 256.
    pub fn entry_mut(&mut self, index: usize) -> &mut PageEntry {
        assert!(index < L2_ENTRY_COUNT, "second-level index out of bounds");
        &mut self.entries[index]
    }

    /// Returns the entries as a slice.
    pub fn entries(&self) -> &[PageEntry] {
        &self.entries
    }
}

impl Default for SecondLevelTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccessPermission, PhysicalAddress};

    #[test]
    fn table_sizes_match_hardware_layout() {
        assert_eq!(L1_TABLE_SIZE, 16 * 1024);
        assert_eq!(L2_TABLE_SIZE, 1024);
        assert_eq!(core::mem::size_of::<FirstLevelTable>(), L1_TABLE_SIZE);
        assert_eq!(core::mem::size_of::<SecondLevelTable>(), L2_TABLE_SIZE);
    }

    #[test]
    fn new_tables_are_unmapped() {
        let l1 = FirstLevelTable::new();
        assert_eq!(l1.page_tables().count(), 0);

        let l2 = SecondLevelTable::new();
        assert!(l2.entries().iter().all(|entry| !entry.is_present()));
    }

    #[test]
    fn lists_populated_first_level_slots() {
        let mut l1 = Box::new(FirstLevelTable::new());
        *l1.entry_mut(0x100) = FirstLevelEntry::page_table(PhysicalAddress::new(0x8000_0400));
        *l1.entry_mut(0xFFF) = FirstLevelEntry::page_table(PhysicalAddress::new(0x8000_0800));

        let indices: Vec<usize> = l1.page_tables().map(|(index, _)| index).collect();
        assert_eq!(indices, [0x100, 0xFFF]);
    }

    #[test]
    fn writes_second_level_slot() {
        let mut l2 = SecondLevelTable::new();
        let entry = PageEntry::new(PhysicalAddress::new(0x8000_1000), AccessPermission::Full);
        *l2.entry_mut(255) = entry;
        assert_eq!(l2.entry(255), entry);
    }

    #[test]
    #[should_panic(expected = "second-level index out of bounds")]
    fn second_level_index_is_bounded() {
        let l2 = SecondLevelTable::new();
        let _ = l2.entry(L2_ENTRY_COUNT);
    }

    #[test]
    #[should_panic(expected = "first-level index out of bounds")]
    fn first_level_index_is_bounded() {
        let l1 = Box::new(FirstLevelTable::new());
        let _ = l1.entry(L1_ENTRY_COUNT);
    }
}
