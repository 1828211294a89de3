//! Address types for physical and virtual memory on a 32-bit ARM target.
//!
//! Both address kinds are 32 bits wide regardless of the host the crate is compiled for, so
//! the descriptor encodings stay identical between the hardware build and software emulation.

use core::fmt;
use core::ops::{Add, Sub};

use crate::descriptor;

#[cfg(any(test, feature = "software-emulation"))]
use crate::arch::software::EmulatedMemory;

/// Address translator for reaching physical memory from the running kernel.
///
/// This enum supports two modes:
/// - Hardware: physical memory is visible at a fixed direct-map offset (kernel mode)
/// - Emulated: physical memory is a host buffer (testing mode)
pub enum AddressTranslator {
    /// Hardware translation using a direct-map offset.
    Hardware { direct_map_offset: usize },
    /// Emulated translation using a simulated RAM region.
    #[cfg(any(test, feature = "software-emulation"))]
    Emulated(EmulatedMemory),
}

impl AddressTranslator {
    /// Creates a new hardware translator with the given direct-map offset.
    ///
    /// An identity-mapped kernel uses an offset of zero.
    pub const fn hardware(direct_map_offset: usize) -> Self {
        Self::Hardware { direct_map_offset }
    }

    /// Creates a new emulated translator covering `size` bytes of RAM starting at the
    /// physical address `base`.
    #[cfg(any(test, feature = "software-emulation"))]
    pub fn emulated(base: PhysicalAddress, size: usize) -> Self {
        Self::Emulated(EmulatedMemory::new(base, size))
    }

    /// Sets the global address translator.
    ///
    /// # Panics
    ///
    /// Panics if the translator has already been set.
    pub fn set_current(translator: AddressTranslator) {
        #[cfg(not(any(test, feature = "software-emulation")))]
        {
            if ADDRESS_TRANSLATOR.get().is_some() {
                panic!("address translator already set");
            }
            ADDRESS_TRANSLATOR.call_once(|| translator);
        }

        #[cfg(any(test, feature = "software-emulation"))]
        {
            ADDRESS_TRANSLATOR.with(|t| {
                if t.get().is_some() {
                    panic!("address translator already set");
                }
                t.call_once(|| translator);
            });
        }
    }

    /// Returns a reference to the current global address translator.
    ///
    /// # Panics
    ///
    /// Panics if the translator has not been set yet.
    pub fn current() -> &'static AddressTranslator {
        #[cfg(not(any(test, feature = "software-emulation")))]
        {
            ADDRESS_TRANSLATOR.get().expect(
                "address translator not set; call AddressTranslator::set_current during initialization",
            )
        }

        #[cfg(any(test, feature = "software-emulation"))]
        {
            ADDRESS_TRANSLATOR.with(|t| {
                // SAFETY: Each thread owns its translator and never replaces it once set, so the
                // reference stays valid for as long as the calling thread runs.
                unsafe {
                    &*(t.get().expect(
                        "address translator not set; call AddressTranslator::set_current during initialization",
                    ) as *const AddressTranslator)
                }
            })
        }
    }

    /// Returns the current global address translator if it has been set.
    pub fn try_current() -> Option<&'static AddressTranslator> {
        #[cfg(not(any(test, feature = "software-emulation")))]
        {
            ADDRESS_TRANSLATOR.get()
        }

        #[cfg(any(test, feature = "software-emulation"))]
        {
            ADDRESS_TRANSLATOR.with(|t| {
                t.get().map(|translator| {
                    // SAFETY: Same reasoning as current().
                    unsafe { &*(translator as *const AddressTranslator) }
                })
            })
        }
    }

    /// Translates a physical address to a typed pointer the kernel can dereference.
    pub fn phys_to_ptr<T>(&self, phys: PhysicalAddress) -> *mut T {
        match self {
            Self::Hardware { direct_map_offset } => {
                (phys.as_usize()).wrapping_add(*direct_map_offset) as *mut T
            }
            #[cfg(any(test, feature = "software-emulation"))]
            Self::Emulated(mem) => mem.translate(phys).cast(),
        }
    }

    /// Allocates a block from the emulated RAM (test mode only).
    ///
    /// Returns the physical address of the block, or None when the emulated RAM is exhausted.
    #[cfg(any(test, feature = "software-emulation"))]
    pub fn allocate(&self, size: usize, align: usize) -> Option<PhysicalAddress> {
        match self {
            Self::Hardware { .. } => {
                panic!("cannot allocate from hardware translator")
            }
            Self::Emulated(mem) => mem.allocate(size, align),
        }
    }
}

/// Global address translator.
///
/// Installed once during kernel initialization with the Hardware variant. Under test and
/// software emulation it is thread-local so each test gets its own emulated RAM.
#[cfg(not(any(test, feature = "software-emulation")))]
static ADDRESS_TRANSLATOR: spin::Once<AddressTranslator> = spin::Once::new();

#[cfg(any(test, feature = "software-emulation"))]
std::thread_local! {
    static ADDRESS_TRANSLATOR: spin::Once<AddressTranslator> = spin::Once::new();
}

/// Generates the parts shared by physical and virtual addresses.
macro_rules! impl_address_common {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Creates a new address.
            #[inline]
            pub const fn new(addr: u32) -> Self {
                Self(addr)
            }

            /// Returns the raw 32-bit address.
            #[inline]
            pub const fn as_u32(self) -> u32 {
                self.0
            }

            /// Returns the address widened to `usize`.
            #[inline]
            pub const fn as_usize(self) -> usize {
                self.0 as usize
            }

            /// Checks if the address is aligned to the given alignment.
            ///
            /// # Panics
            ///
            /// Panics if `align` is not a power of two.
            #[inline]
            pub const fn is_aligned(self, align: u32) -> bool {
                assert!(align.is_power_of_two(), "alignment must be a power of two");
                self.0 & (align - 1) == 0
            }

            /// Aligns the address down to the given alignment.
            ///
            /// # Panics
            ///
            /// Panics if `align` is not a power of two.
            #[inline]
            pub const fn align_down(self, align: u32) -> Self {
                assert!(align.is_power_of_two(), "alignment must be a power of two");
                Self(self.0 & !(align - 1))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#010x})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#010x}", self.0)
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(addr: u32) -> Self {
                Self(addr)
            }
        }

        impl Add<u32> for $name {
            type Output = Self;

            #[inline]
            fn add(self, rhs: u32) -> Self::Output {
                Self(self.0.wrapping_add(rhs))
            }
        }

        impl Sub<$name> for $name {
            type Output = u32;

            #[inline]
            fn sub(self, rhs: $name) -> Self::Output {
                self.0 - rhs.0
            }
        }
    };
}

impl_address_common!(
    PhysicalAddress,
    "A 32-bit physical memory address.\n\n\
     Page-table descriptors and the translation table base register hold physical addresses."
);

impl_address_common!(
    VirtualAddress,
    "A 32-bit virtual memory address.\n\n\
     The top 12 bits select a first-level slot, the next 8 bits a second-level slot and the\n\
     low 12 bits the byte within a 4 KiB page."
);

impl VirtualAddress {
    /// Returns the first-level table index (bits 31:20).
    #[inline]
    pub const fn l1_index(self) -> usize {
        descriptor::decompose(self).0
    }

    /// Returns the second-level table index (bits 19:12).
    #[inline]
    pub const fn l2_index(self) -> usize {
        descriptor::decompose(self).1
    }

    /// Returns the byte offset within the 4 KiB page.
    #[inline]
    pub const fn page_offset(self) -> u32 {
        self.0 & (descriptor::PAGE_SIZE as u32 - 1)
    }
}
