//! ARMv7 short-descriptor encodings.
//!
//! The first-level table holds 4096 word-sized entries, one per 1 MiB of virtual address
//! space. This crate only ever installs *page table* entries there, each pointing at a 1 KiB
//! second-level table. A second-level table holds 256 *small page* entries, one per 4 KiB page.
//!
//! ```text
//! | 31‒20    | 19‒12    | 11‒0   |
//! | L1 index | L2 index | Offset |
//! ```

use core::fmt;

use crate::{PhysicalAddress, VirtualAddress};

/// Page size in bytes (4 KiB small pages).
pub const PAGE_SIZE: usize = 4096;

/// Virtual address span covered by one first-level slot (1 MiB).
pub const SECTION_SIZE: usize = 0x10_0000;

/// Number of entries in a first-level table.
pub const L1_ENTRY_COUNT: usize = 4096;

/// Number of entries in a second-level table.
pub const L2_ENTRY_COUNT: usize = 256;

/// Splits a virtual address into its first-level and second-level table indices.
#[inline]
pub const fn decompose(addr: VirtualAddress) -> (usize, usize) {
    let raw = addr.as_u32();
    ((raw >> 20) as usize, ((raw & 0xF_F000) >> 12) as usize)
}

/// Returns the number of pages needed to hold `size` bytes.
#[inline]
pub const fn pages_for(size: usize) -> usize {
    size.div_ceil(PAGE_SIZE)
}

/// Access permission of a small page entry (the AP[1:0] field, bits 5:4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPermission {
    /// Read/write from privileged modes only.
    PrivilegedOnly,
    /// Read/write from every mode.
    Full,
}

impl AccessPermission {
    const MASK: u32 = 0x30;

    /// Returns the AP bits for this permission, already shifted into place.
    pub const fn bits(self) -> u32 {
        match self {
            Self::PrivilegedOnly => 0x10,
            Self::Full => 0x30,
        }
    }

    /// Decodes the AP bits of a raw entry. Encodings this crate never writes yield None.
    pub const fn from_bits(raw: u32) -> Option<Self> {
        match raw & Self::MASK {
            0x10 => Some(Self::PrivilegedOnly),
            0x30 => Some(Self::Full),
            _ => None,
        }
    }
}

/// A first-level descriptor.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct FirstLevelEntry(u32);

impl FirstLevelEntry {
    const PAGE_TABLE: u32 = 0x1;
    const TABLE_ADDRESS_MASK: u32 = 0xFFFF_FC00;

    /// The unmapped (fault) entry.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Encodes a page-table entry pointing at the second-level table at `base`.
    ///
    /// The low 10 bits of `base` are discarded; second-level tables are 1 KiB aligned.
    pub const fn page_table(base: PhysicalAddress) -> Self {
        Self((base.as_u32() & Self::TABLE_ADDRESS_MASK) | Self::PAGE_TABLE)
    }

    /// Returns whether this slot points at a second-level table.
    pub const fn is_page_table(self) -> bool {
        self.0 & Self::PAGE_TABLE != 0
    }

    /// Returns the second-level table address, or None if the slot is unmapped.
    pub const fn table_address(self) -> Option<PhysicalAddress> {
        if self.is_page_table() {
            Some(PhysicalAddress::new(self.0 & Self::TABLE_ADDRESS_MASK))
        } else {
            None
        }
    }

    /// Returns the raw descriptor word.
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FirstLevelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.table_address() {
            Some(table) => write!(f, "FirstLevelEntry(table @ {table})"),
            None => write!(f, "FirstLevelEntry(unmapped)"),
        }
    }
}

/// A second-level small page descriptor.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct PageEntry(u32);

impl PageEntry {
    const SMALL_PAGE: u32 = 0x2;
    const FRAME_MASK: u32 = 0xFFFF_F000;

    /// The unmapped (fault) entry.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Encodes a small page entry mapping `frame` with the given access permission.
    pub const fn new(frame: PhysicalAddress, access: AccessPermission) -> Self {
        Self(frame.as_u32() | Self::SMALL_PAGE | access.bits())
    }

    /// Returns whether this slot maps a page.
    pub const fn is_present(self) -> bool {
        self.0 & Self::SMALL_PAGE != 0
    }

    /// Returns the physical frame behind this entry, or None if unmapped.
    pub const fn address(self) -> Option<PhysicalAddress> {
        if self.is_present() {
            Some(PhysicalAddress::new(self.0 & Self::FRAME_MASK))
        } else {
            None
        }
    }

    /// Returns the access permission, or None if unmapped.
    pub const fn access(self) -> Option<AccessPermission> {
        if self.is_present() {
            AccessPermission::from_bits(self.0)
        } else {
            None
        }
    }

    /// Returns the raw descriptor word.
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.address(), self.access()) {
            (Some(frame), Some(access)) => write!(f, "PageEntry({frame}, {access:?})"),
            (Some(frame), None) => write!(f, "PageEntry({frame}, raw {:#x})", self.0),
            _ => write!(f, "PageEntry(unmapped)"),
        }
    }
}
