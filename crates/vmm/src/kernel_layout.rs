//! The kernel and hardware mappings present in every address space.

use crate::{
    AccessPermission, AddressTranslator, HumanSize, MmuError, PageDirectory, PageSource,
    VirtualAddress,
    descriptor::{PAGE_SIZE, SECTION_SIZE},
    page_source::BlockSize,
};

/// A straight-mapped range of the kernel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Name used in log output.
    pub name: &'static str,
    /// First byte of the range. Must be page aligned.
    pub base: VirtualAddress,
    /// Length of the range in bytes.
    pub size: usize,
}

impl Region {
    /// Describes a range.
    pub const fn new(name: &'static str, base: u32, size: usize) -> Self {
        Self {
            name,
            base: VirtualAddress::new(base),
            size,
        }
    }

    /// Returns whether `addr` falls inside this range.
    pub const fn contains(&self, addr: VirtualAddress) -> bool {
        let addr = addr.as_u32() as u64;
        let base = self.base.as_u32() as u64;
        addr >= base && addr < base + self.size as u64
    }
}

/// Versatile Express peripheral windows.
const VEXPRESS_PERIPHERALS: [Region; 2] = [
    Region::new("motherboard peripherals", 0x1000_0000, 0x2_0000),
    Region::new("snoop control unit", 0x1E00_0000, 0x2000),
];

/// The fixed set of mappings installed into each new address space.
///
/// The layout is data: installing it gives each address space its own table entries, while
/// the straight-mapped kernel and peripheral frames are shared by every space.
#[derive(Debug, Clone, Copy)]
pub struct KernelLayout {
    /// Virtual address of the exception vector page.
    pub vector_base: VirtualAddress,
    /// Exception vector code copied into a private page of each address space.
    pub vector_image: &'static [u8],
    /// The kernel image range.
    pub kernel_image: Region,
    /// Memory-mapped peripheral windows.
    pub peripherals: &'static [Region],
}

impl KernelLayout {
    /// The high-vectors address used when SCTLR.V is set.
    pub const HIGH_VECTORS: VirtualAddress = VirtualAddress::new(0xFFFF_0000);

    /// The layout of the Versatile Express board: high vectors, a 144 MiB kernel image at
    /// `0x6000_0000`, the motherboard peripheral block and the snoop control unit.
    pub const fn versatile_express(vector_image: &'static [u8]) -> Self {
        Self {
            vector_base: Self::HIGH_VECTORS,
            vector_image,
            kernel_image: Region::new("kernel image", 0x6000_0000, 0x900_0000),
            peripherals: &VEXPRESS_PERIPHERALS,
        }
    }

    /// Iterates over every straight-mapped range: the kernel image, then each peripheral.
    pub fn straight_regions(&self) -> impl Iterator<Item = &Region> + '_ {
        core::iter::once(&self.kernel_image).chain(self.peripherals.iter())
    }

    /// Installs the layout into a fresh page directory.
    ///
    /// The vector page is written before its entry is recorded, so the page never becomes
    /// reachable half copied.
    pub fn install<P: PageSource + ?Sized>(
        &self,
        directory: &mut PageDirectory,
        pages: &mut P,
    ) -> Result<(), MmuError> {
        self.install_vectors(directory, pages)?;

        for region in self.straight_regions() {
            log::trace!(
                "mapping {} ({} at {})",
                region.name,
                HumanSize(region.size),
                region.base
            );
            install_straight(directory, pages, region)?;
        }

        Ok(())
    }

    fn install_vectors<P: PageSource + ?Sized>(
        &self,
        directory: &mut PageDirectory,
        pages: &mut P,
    ) -> Result<(), MmuError> {
        let frame = pages.allocate(BlockSize::Page)?;

        let image = if self.vector_image.len() > PAGE_SIZE {
            log::warn!(
                "vector image is {}, truncating to one page",
                HumanSize(self.vector_image.len())
            );
            &self.vector_image[..PAGE_SIZE]
        } else {
            self.vector_image
        };

        // SAFETY: `frame` is a page we just allocated and have not mapped anywhere yet, and
        // `image` is at most one page long.
        unsafe {
            let dst = AddressTranslator::current().phys_to_ptr::<u8>(frame);
            core::ptr::copy_nonoverlapping(image.as_ptr(), dst, image.len());
        }

        directory.map_page(
            pages,
            self.vector_base,
            frame,
            AccessPermission::PrivilegedOnly,
        )
    }
}

/// Straight-maps a region one 1 MiB window at a time.
fn install_straight<P: PageSource + ?Sized>(
    directory: &mut PageDirectory,
    pages: &mut P,
    region: &Region,
) -> Result<(), MmuError> {
    let end = region.base.as_u32() as u64 + region.size as u64;
    let mut start = region.base.as_u32() as u64;

    while start < end {
        let window_end = (start & !(SECTION_SIZE as u64 - 1)) + SECTION_SIZE as u64;
        let chunk_end = end.min(window_end);
        directory.map_straight_region(
            pages,
            VirtualAddress::new(start as u32),
            (chunk_end - start) as usize,
        )?;
        start = chunk_end;
    }

    Ok(())
}
