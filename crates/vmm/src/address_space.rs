//! Process identifiers and the address spaces they own.

use core::fmt;

use crate::PageDirectory;

/// A process identifier.
///
/// Pid 0 names the kernel's own address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Pid(u32);

impl Pid {
    /// The kernel's address space, active whenever no process is scheduled.
    pub const KERNEL: Pid = Pid(0);

    pub const fn new(pid: u32) -> Self {
        Self(pid)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns whether this is [`Pid::KERNEL`].
    pub const fn is_kernel(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Pid {
    fn from(pid: u32) -> Self {
        Self(pid)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/// The translation tables belonging to one process.
pub struct AddressSpace {
    pid: Pid,
    directory: PageDirectory,
}

impl AddressSpace {
    pub(crate) fn new(pid: Pid, directory: PageDirectory) -> Self {
        Self { pid, directory }
    }

    /// Returns the owning process.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Returns the address space's tables.
    pub fn directory(&self) -> &PageDirectory {
        &self.directory
    }

    /// Returns the address space's tables for modification.
    pub fn directory_mut(&mut self) -> &mut PageDirectory {
        &mut self.directory
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("pid", &self.pid)
            .field("table_base", &self.directory.table_base())
            .finish()
    }
}
