//! The physical page source consumed by the table builder.

use core::fmt;

use crate::PhysicalAddress;
use crate::descriptor::PAGE_SIZE;
use crate::table::{L1_TABLE_SIZE, L2_TABLE_SIZE};

/// Errors reported by a [`PageSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No block of the requested size class is available.
    OutOfMemory,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "out of physical memory"),
        }
    }
}

/// The block size classes requested from a [`PageSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSize {
    /// A 4 KiB page frame.
    Page,
    /// A 1 KiB second-level table.
    SecondLevelTable,
    /// A 16 KiB first-level table.
    FirstLevelTable,
}

impl BlockSize {
    /// Returns the size of the block in bytes. Blocks are aligned to their own size.
    pub const fn bytes(self) -> usize {
        match self {
            Self::Page => PAGE_SIZE,
            Self::SecondLevelTable => L2_TABLE_SIZE,
            Self::FirstLevelTable => L1_TABLE_SIZE,
        }
    }
}

/// Supplier of physical memory blocks.
///
/// Implemented by the kernel's page-frame allocator. Returned blocks must be zero-filled,
/// aligned to their own size and reachable through the installed
/// [`crate::AddressTranslator`].
pub trait PageSource {
    /// Allocates one block of the given size class.
    fn allocate(&mut self, size: BlockSize) -> Result<PhysicalAddress, AllocError>;
}

impl<P: PageSource + ?Sized> PageSource for &mut P {
    fn allocate(&mut self, size: BlockSize) -> Result<PhysicalAddress, AllocError> {
        (**self).allocate(size)
    }
}
