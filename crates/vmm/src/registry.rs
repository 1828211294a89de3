//! The set of live address spaces, keyed by pid.

use alloc::vec::Vec;

use crate::{AddressSpace, KernelLayout, MmuError, PageDirectory, PageSource, Pid};

/// Every address space created so far and not yet destroyed.
///
/// Process counts are small, so lookup is a linear scan.
#[derive(Debug, Default)]
pub struct AddressSpaceRegistry {
    spaces: Vec<AddressSpace>,
}

impl AddressSpaceRegistry {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self { spaces: Vec::new() }
    }

    fn position(&self, pid: Pid) -> Option<usize> {
        self.spaces.iter().position(|space| space.pid() == pid)
    }

    /// Returns the address space for `pid`, creating it on first use.
    ///
    /// A new address space gets a fresh first-level table with `layout` installed before it
    /// is registered, so a failed installation leaves the registry unchanged.
    pub fn resolve<P: PageSource + ?Sized>(
        &mut self,
        pid: Pid,
        pages: &mut P,
        layout: &KernelLayout,
    ) -> Result<&mut AddressSpace, MmuError> {
        let index = match self.position(pid) {
            Some(index) => index,
            None => {
                let mut directory = PageDirectory::create(pages)?;
                layout.install(&mut directory, pages)?;

                log::info!(
                    "created address space for {} (first-level table at {})",
                    pid,
                    directory.table_base()
                );
                self.spaces.push(AddressSpace::new(pid, directory));
                self.spaces.len() - 1
            }
        };

        Ok(&mut self.spaces[index])
    }

    /// Unregisters the address space for `pid` and returns it.
    ///
    /// The tables and user pages stay allocated: the straight-mapped kernel frames are shared
    /// between every address space and nothing tracks which frames a space owns.
    pub fn remove(&mut self, pid: Pid) -> Result<AddressSpace, MmuError> {
        let index = self.position(pid).ok_or(MmuError::UnknownAddressSpace)?;
        let space = self.spaces.remove(index);

        log::info!(
            "removed address space for {}; leaking first-level table {} and {} second-level tables",
            pid,
            space.directory().table_base(),
            space.directory().second_level_tables().count()
        );
        Ok(space)
    }

    /// Returns the address space for `pid`, if one is registered.
    pub fn get(&self, pid: Pid) -> Option<&AddressSpace> {
        self.spaces.iter().find(|space| space.pid() == pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.position(pid).is_some()
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    /// Iterates over the registered address spaces in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &AddressSpace> + '_ {
        self.spaces.iter()
    }
}
