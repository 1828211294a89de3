use core::fmt;

use crate::AllocError;

/// Errors reported by the virtual memory manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmuError {
    /// The requested region runs past the end of the second-level table its start address
    /// falls into. Nothing was written.
    RegionExceedsTable,
    /// No address space is registered for the given process.
    UnknownAddressSpace,
    /// The page source could not supply a table or page frame.
    OutOfMemory(AllocError),
}

impl From<AllocError> for MmuError {
    fn from(err: AllocError) -> Self {
        Self::OutOfMemory(err)
    }
}

impl fmt::Display for MmuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegionExceedsTable => write!(f, "region exceeds its second-level table"),
            Self::UnknownAddressSpace => write!(f, "no address space registered for process"),
            Self::OutOfMemory(err) => write!(f, "cannot build translation tables: {err}"),
        }
    }
}
