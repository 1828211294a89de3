#![cfg_attr(not(any(test, feature = "software-emulation")), no_std)]

//! # Virtual Memory Manager (VMM)
//!
//! Builds and switches ARMv7 short-descriptor translation tables for a small kernel. It
//! provides:
//!
//! - Encoding of first-level page-table descriptors and second-level small-page entries.
//! - Per-process address spaces, each carrying the kernel image, peripheral windows and a
//!   private copy of the exception vectors.
//! - User region allocation backed by freshly allocated page frames.
//! - Address space switching through the translation table base register.
//! - Software emulation for testing in non-kernel environments.
//!
//! Physical memory is reached through the installed [`AddressTranslator`]; physical blocks
//! come from a [`PageSource`] supplied by the kernel's frame allocator.

extern crate alloc;

mod address;
mod address_space;
mod control;
mod descriptor;
mod error;
mod human_size;
mod kernel_layout;
mod mmu;
mod page_directory;
mod page_source;
mod registry;
mod table;

pub mod arch;

#[cfg(test)]
mod testing;

pub use address::{AddressTranslator, PhysicalAddress, VirtualAddress};
pub use address_space::{AddressSpace, Pid};
pub use control::{DomainAccess, DomainAccessControl, TranslationControl};
pub use descriptor::{
    AccessPermission, FirstLevelEntry, L1_ENTRY_COUNT, L2_ENTRY_COUNT, PAGE_SIZE, PageEntry,
    SECTION_SIZE, decompose, pages_for,
};
pub use error::MmuError;
pub use human_size::HumanSize;
pub use kernel_layout::{KernelLayout, Region};
pub use mmu::Mmu;
pub use page_directory::PageDirectory;
pub use page_source::{AllocError, BlockSize, PageSource};
pub use registry::AddressSpaceRegistry;
pub use table::{FirstLevelTable, L1_TABLE_SIZE, L2_TABLE_SIZE, SecondLevelTable};

#[cfg(target_arch = "arm")]
pub use arch::armv7::Armv7Control;

#[cfg(any(test, feature = "software-emulation"))]
pub use arch::software::{ControlEvent, EmulatedMemory, EmulatedPageSource, SimulatedControl};
