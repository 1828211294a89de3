//! The hardware operations the manager issues.
//!
//! Everything the manager needs from the CPU is behind [`TranslationControl`]. The kernel
//! build uses [`crate::arch::armv7::Armv7Control`], tests use the simulator in
//! [`crate::arch::software`].

use core::fmt;

use crate::PhysicalAddress;

/// Access policy of one memory domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainAccess {
    /// Any access faults.
    NoAccess,
    /// Accesses are checked against the access-permission bits of each entry.
    Client,
    /// Accesses are never checked.
    Manager,
}

impl DomainAccess {
    const fn bits(self) -> u32 {
        match self {
            Self::NoAccess => 0b00,
            Self::Client => 0b01,
            Self::Manager => 0b11,
        }
    }

    const fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b01 => Self::Client,
            0b11 => Self::Manager,
            _ => Self::NoAccess,
        }
    }
}

/// Value of the domain access control register (DACR): two bits for each of 16 domains.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct DomainAccessControl(u32);

impl DomainAccessControl {
    /// Number of memory domains.
    pub const DOMAINS: usize = 16;

    /// Every domain set to [`DomainAccess::NoAccess`].
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns a copy with `domain` set to `access`.
    ///
    /// # Panics
    /// Panics if `domain` >= 16.
    pub const fn with_domain(self, domain: usize, access: DomainAccess) -> Self {
        assert!(domain < Self::DOMAINS, "domain out of range");
        let shift = domain * 2;
        Self((self.0 & !(0b11 << shift)) | (access.bits() << shift))
    }

    /// Returns the access policy of `domain`.
    ///
    /// # Panics
    /// Panics if `domain` >= 16.
    pub const fn domain(self, domain: usize) -> DomainAccess {
        assert!(domain < Self::DOMAINS, "domain out of range");
        DomainAccess::from_bits(self.0 >> (domain * 2))
    }

    /// Returns the raw register value.
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for DomainAccessControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DomainAccessControl({:#010x})", self.0)
    }
}

/// The privileged operations that control address translation.
///
/// None of these can fail; a fault here is a fatal hardware fault, not an error the manager
/// could recover from.
pub trait TranslationControl {
    /// Writes the domain access control register.
    fn set_domain_access_control(&mut self, dacr: DomainAccessControl);

    /// Writes the translation table base register. `base` is already masked to the
    /// first-level table alignment.
    fn set_translation_table_base(&mut self, base: PhysicalAddress);

    /// Turns address translation off.
    fn disable_translation(&mut self);

    /// Turns address translation on, discarding any cached translations.
    fn enable_translation(&mut self);
}
