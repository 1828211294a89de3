//! Shared test fixtures.

pub(crate) use crate::arch::software::{EmulatedPageSource, SimulatedControl};

use crate::{AddressTranslator, KernelLayout, PhysicalAddress};

/// Physical base of the emulated RAM used by unit tests.
pub(crate) const RAM_BASE: PhysicalAddress = PhysicalAddress::new(0x8000_0000);

/// Size of the emulated RAM used by unit tests.
pub(crate) const RAM_SIZE: usize = 64 * 1024 * 1024;

/// A recognisable stand-in for the exception vector code.
pub(crate) static VECTORS: [u8; 32] = [
    0x18, 0xF0, 0x9F, 0xE5, 0x18, 0xF0, 0x9F, 0xE5, 0x18, 0xF0, 0x9F, 0xE5, 0x18, 0xF0, 0x9F,
    0xE5, 0x18, 0xF0, 0x9F, 0xE5, 0x00, 0x00, 0xA0, 0xE1, 0x18, 0xF0, 0x9F, 0xE5, 0x18, 0xF0,
    0x9F, 0xE5,
];

/// Installs emulated RAM for the calling thread, unless a previous call already did.
pub(crate) fn setup() {
    if AddressTranslator::try_current().is_none() {
        AddressTranslator::set_current(AddressTranslator::emulated(RAM_BASE, RAM_SIZE));
    }
}

/// The board layout with [`VECTORS`] as its vector image.
pub(crate) fn layout() -> KernelLayout {
    KernelLayout::versatile_express(&VECTORS)
}
