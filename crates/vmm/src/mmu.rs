//! The virtual memory manager.
//!
//! [`Mmu`] ties the pieces together: it owns the address space registry, remembers which
//! process's tables are loaded, and drives the hardware through a [`TranslationControl`].
//!
//! ```text
//! activate(pid) ──► registry.resolve ──► PageDirectory::create + KernelLayout::install
//!       │                                       (first use only)
//!       └──► disable translation ──► TTBR0 = table base ──► enable translation
//! ```

use core::mem;

use crate::{
    AccessPermission, AddressSpace, AddressSpaceRegistry, DomainAccess, DomainAccessControl,
    HumanSize, KernelLayout, MmuError, PageSource, Pid, TranslationControl, VirtualAddress,
};

/// Kernel virtual memory manager for one CPU.
///
/// All mutation goes through `&mut self`; callers serialise access and keep interrupts masked
/// around [`Mmu::activate`].
pub struct Mmu<C, P> {
    control: C,
    pages: P,
    layout: KernelLayout,
    registry: AddressSpaceRegistry,
    current: Pid,
}

impl<C: TranslationControl, P: PageSource> Mmu<C, P> {
    /// Brings up translation: domain 0 becomes a client domain and the kernel's own address
    /// space is created and loaded.
    pub fn bootstrap(control: C, pages: P, layout: KernelLayout) -> Result<Self, MmuError> {
        let mut mmu = Self {
            control,
            pages,
            layout,
            registry: AddressSpaceRegistry::new(),
            current: Pid::KERNEL,
        };

        mmu.control.set_domain_access_control(
            DomainAccessControl::empty().with_domain(0, DomainAccess::Client),
        );
        mmu.activate(Pid::KERNEL)?;

        log::info!(
            "translation enabled with {} kernel image at {}",
            HumanSize(mmu.layout.kernel_image.size),
            mmu.layout.kernel_image.base
        );
        Ok(mmu)
    }

    /// Loads the address space of `pid`, creating it first if needed, and returns the pid
    /// that was active before.
    ///
    /// Translation is switched off while the table base register is rewritten.
    pub fn activate(&mut self, pid: Pid) -> Result<Pid, MmuError> {
        let space = self.registry.resolve(pid, &mut self.pages, &self.layout)?;
        let ttbr = space.directory().ttbr_value();

        self.control.disable_translation();
        self.control.set_translation_table_base(ttbr);
        self.control.enable_translation();

        let previous = mem::replace(&mut self.current, pid);
        log::debug!("switched from {} to {} (ttbr {})", previous, pid, ttbr);
        Ok(previous)
    }

    /// Unregisters the address space of `pid`.
    ///
    /// The kernel's tables are loaded first, so the hardware is never left walking a table
    /// that is no longer registered. Table and page memory is not reclaimed.
    pub fn destroy(&mut self, pid: Pid) -> Result<(), MmuError> {
        if !self.registry.contains(pid) {
            return Err(MmuError::UnknownAddressSpace);
        }

        self.activate(Pid::KERNEL)?;
        self.registry.remove(pid)?;
        Ok(())
    }

    /// Backs `size` bytes at `virt` in `pid`'s address space with fresh, user-accessible
    /// pages.
    ///
    /// The region must fit in the second-level table `virt` falls into.
    pub fn allocate_user_region(
        &mut self,
        pid: Pid,
        virt: VirtualAddress,
        size: usize,
    ) -> Result<(), MmuError> {
        let space = self.registry.resolve(pid, &mut self.pages, &self.layout)?;
        space
            .directory_mut()
            .map_region(&mut self.pages, virt, size, AccessPermission::Full)?;

        log::debug!("allocated {} at {} for {}", HumanSize(size), virt, pid);
        Ok(())
    }

    /// Returns the pid whose tables are loaded.
    pub fn current_pid(&self) -> Pid {
        self.current
    }

    /// Returns the address space of `pid` without creating it.
    pub fn address_space(&self, pid: Pid) -> Option<&AddressSpace> {
        self.registry.get(pid)
    }

    pub fn registry(&self) -> &AddressSpaceRegistry {
        &self.registry
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn layout(&self) -> &KernelLayout {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::software::ControlEvent;
    use crate::descriptor::{L2_ENTRY_COUNT, PAGE_SIZE};
    use crate::testing::{self, EmulatedPageSource, SimulatedControl, VECTORS};
    use crate::{AddressTranslator, PageEntry, PhysicalAddress};
    use std::collections::HashSet;

    type TestMmu = Mmu<SimulatedControl, EmulatedPageSource>;

    fn setup() -> TestMmu {
        testing::setup();
        Mmu::bootstrap(
            SimulatedControl::new(),
            EmulatedPageSource::new(),
            testing::layout(),
        )
        .unwrap()
    }

    fn table_of(mmu: &TestMmu, pid: Pid) -> PhysicalAddress {
        mmu.address_space(pid).unwrap().directory().table_base()
    }

    fn lookup(mmu: &TestMmu, pid: Pid, virt: u32) -> Option<PageEntry> {
        mmu.address_space(pid)
            .unwrap()
            .directory()
            .translate(VirtualAddress::new(virt))
    }

    #[test]
    fn bootstrap_loads_kernel_space() {
        let mmu = setup();

        assert_eq!(mmu.current_pid(), Pid::KERNEL);
        assert_eq!(mmu.registry().len(), 1);
        assert_eq!(
            mmu.control().translation_table_base(),
            Some(table_of(&mmu, Pid::KERNEL))
        );
        assert!(mmu.control().is_translation_enabled());
        assert_eq!(mmu.control().domain_access_control().bits(), 0x1);
    }

    #[test]
    fn bootstrap_programs_domains_before_table_base() {
        let mmu = setup();

        let events = mmu.control().events();
        let dacr = events
            .iter()
            .position(|e| matches!(e, ControlEvent::SetDomainAccessControl(_)))
            .unwrap();
        let ttbr = events
            .iter()
            .position(|e| matches!(e, ControlEvent::SetTranslationTableBase(_)))
            .unwrap();
        assert!(dacr < ttbr);
    }

    #[test]
    fn bootstrap_reports_exhausted_page_source() {
        testing::setup();
        let result = Mmu::bootstrap(
            SimulatedControl::new(),
            EmulatedPageSource::with_limit(0),
            testing::layout(),
        );
        assert!(matches!(result, Err(MmuError::OutOfMemory(_))));
    }

    #[test]
    fn activation_is_idempotent() {
        let mut mmu = setup();

        mmu.activate(Pid::new(1)).unwrap();
        let first = table_of(&mmu, Pid::new(1));
        mmu.activate(Pid::new(1)).unwrap();

        assert_eq!(table_of(&mmu, Pid::new(1)), first);
        assert_eq!(mmu.registry().len(), 2);
    }

    #[test]
    fn table_base_is_written_with_translation_off() {
        let mut mmu = setup();
        mmu.activate(Pid::new(1)).unwrap();
        mmu.activate(Pid::KERNEL).unwrap();

        assert_eq!(mmu.control().base_writes_while_enabled(), 0);

        let events = mmu.control().events();
        let tail = &events[events.len() - 3..];
        assert_eq!(
            tail,
            [
                ControlEvent::DisableTranslation,
                ControlEvent::SetTranslationTableBase(table_of(&mmu, Pid::KERNEL)),
                ControlEvent::EnableTranslation,
            ]
        );
    }

    #[test]
    fn activate_returns_previous_pid() {
        let mut mmu = setup();
        let p1 = Pid::new(1);
        let p2 = Pid::new(2);

        assert_eq!(mmu.activate(p1).unwrap(), Pid::KERNEL);
        assert_eq!(mmu.activate(p2).unwrap(), p1);
        assert_eq!(mmu.activate(p1).unwrap(), p2);

        assert_eq!(mmu.current_pid(), p1);
        assert_eq!(
            mmu.control().translation_table_base(),
            Some(table_of(&mmu, p1))
        );
    }

    #[test]
    fn new_space_has_kernel_layout() {
        let mut mmu = setup();
        let pid = Pid::new(4);
        mmu.activate(pid).unwrap();

        for virt in [0x6000_0000, 0x68FF_F000, 0x1000_0000, 0x1001_F000, 0x1E00_1000] {
            let entry = lookup(&mmu, pid, virt).unwrap();
            assert_eq!(entry.address(), Some(PhysicalAddress::new(virt)));
            assert_eq!(entry.access(), Some(AccessPermission::PrivilegedOnly));
        }

        let vectors = lookup(&mmu, pid, 0xFFFF_0000).unwrap();
        assert_eq!(vectors.access(), Some(AccessPermission::PrivilegedOnly));
        let page = AddressTranslator::current().phys_to_ptr::<u8>(vectors.address().unwrap());
        let page = unsafe { core::slice::from_raw_parts(page, VECTORS.len()) };
        assert_eq!(page, &VECTORS[..]);
    }

    #[test]
    fn vector_pages_are_private() {
        let mut mmu = setup();
        mmu.activate(Pid::new(1)).unwrap();

        let kernel = lookup(&mmu, Pid::KERNEL, 0xFFFF_0000).unwrap().address();
        let user = lookup(&mmu, Pid::new(1), 0xFFFF_0000).unwrap().address();
        assert_ne!(kernel, user);
    }

    #[test]
    fn user_region_uses_distinct_frames() {
        let mut mmu = setup();
        let pid = Pid::new(7);

        mmu.allocate_user_region(pid, VirtualAddress::new(0x0080_0000), 16 * PAGE_SIZE)
            .unwrap();

        let mut frames = HashSet::new();
        for page in 0..16u32 {
            let entry = lookup(&mmu, pid, 0x0080_0000 + page * PAGE_SIZE as u32).unwrap();
            assert_eq!(entry.access(), Some(AccessPermission::Full));
            assert!(frames.insert(entry.address().unwrap()));
        }
    }

    #[test]
    fn user_region_creates_space_without_switching() {
        let mut mmu = setup();

        mmu.allocate_user_region(Pid::new(3), VirtualAddress::new(0x0001_0000), PAGE_SIZE)
            .unwrap();

        assert!(mmu.address_space(Pid::new(3)).is_some());
        assert_eq!(mmu.current_pid(), Pid::KERNEL);
    }

    #[test]
    fn oversized_user_region_changes_nothing() {
        let mut mmu = setup();
        let pid = Pid::new(2);
        mmu.allocate_user_region(pid, VirtualAddress::new(0x0040_0000), 4 * PAGE_SIZE)
            .unwrap();

        let result = mmu.allocate_user_region(
            pid,
            VirtualAddress::new(0x0040_8000),
            (L2_ENTRY_COUNT - 7) * PAGE_SIZE,
        );

        assert_eq!(result, Err(MmuError::RegionExceedsTable));
        for page in 0..L2_ENTRY_COUNT as u32 {
            let present = lookup(&mmu, pid, 0x0040_0000 + page * PAGE_SIZE as u32).is_some();
            assert_eq!(present, page < 4);
        }
    }

    #[test]
    fn destroy_unknown_pid_fails_without_touching_hardware() {
        let mut mmu = setup();
        let before = mmu.control().events().len();

        assert_eq!(mmu.destroy(Pid::new(12)), Err(MmuError::UnknownAddressSpace));
        assert_eq!(mmu.control().events().len(), before);
    }

    #[test]
    fn destroy_switches_to_kernel_space() {
        let mut mmu = setup();
        let pid = Pid::new(5);
        mmu.activate(pid).unwrap();

        mmu.destroy(pid).unwrap();

        assert_eq!(mmu.current_pid(), Pid::KERNEL);
        assert_eq!(
            mmu.control().translation_table_base(),
            Some(table_of(&mmu, Pid::KERNEL))
        );
        assert!(mmu.address_space(pid).is_none());
    }

    #[test]
    fn reactivation_after_destroy_builds_fresh_space() {
        let mut mmu = setup();
        let pid = Pid::new(6);
        mmu.allocate_user_region(pid, VirtualAddress::new(0x0100_0000), PAGE_SIZE)
            .unwrap();
        let old = table_of(&mmu, pid);

        mmu.destroy(pid).unwrap();
        mmu.activate(pid).unwrap();

        assert_ne!(table_of(&mmu, pid), old);
        assert!(lookup(&mmu, pid, 0x0100_0000).is_none());
        assert!(lookup(&mmu, pid, 0x6000_0000).is_some());
        assert!(lookup(&mmu, pid, 0xFFFF_0000).is_some());
    }

    #[test]
    fn destroying_kernel_space_recreates_it_on_demand() {
        let mut mmu = setup();
        let old = table_of(&mmu, Pid::KERNEL);

        mmu.destroy(Pid::KERNEL).unwrap();
        assert!(mmu.registry().is_empty());

        mmu.activate(Pid::KERNEL).unwrap();
        assert_ne!(table_of(&mmu, Pid::KERNEL), old);
    }
}
