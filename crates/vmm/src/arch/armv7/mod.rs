//! ARMv7-A implementation of [`TranslationControl`] using CP15 register writes.

use core::arch::asm;

use crate::{DomainAccessControl, PhysicalAddress, TranslationControl};

/// SCTLR.M, the MMU enable bit.
const SCTLR_MMU_ENABLE: u32 = 1 << 0;

/// Direct access to the CP15 translation registers of the executing core.
pub struct Armv7Control {
    _private: (),
}

impl Armv7Control {
    /// Creates the backend.
    ///
    /// # Safety
    /// The caller must be running in a privileged mode with local interrupts masked around
    /// every table switch, and must ensure the kernel is mapped identically in every table
    /// that gets loaded.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl TranslationControl for Armv7Control {
    fn set_domain_access_control(&mut self, dacr: DomainAccessControl) {
        // SAFETY: Privileged mode is a precondition of `Armv7Control::new`.
        unsafe {
            asm!(
                "mcr p15, 0, {dacr}, c3, c0, 0",
                "isb",
                dacr = in(reg) dacr.bits(),
                options(nostack, preserves_flags),
            );
        }
    }

    fn set_translation_table_base(&mut self, base: PhysicalAddress) {
        // SAFETY: Privileged mode is a precondition of `Armv7Control::new`. Translation is
        // off while the manager rewrites TTBR0.
        unsafe {
            asm!(
                "mcr p15, 0, {ttb}, c2, c0, 0",
                "isb",
                ttb = in(reg) base.as_u32(),
                options(nostack, preserves_flags),
            );
        }
    }

    fn disable_translation(&mut self) {
        // SAFETY: Privileged mode is a precondition of `Armv7Control::new`. The kernel runs
        // identity mapped, so execution continues at the same address.
        unsafe {
            asm!(
                "mrc p15, 0, {sctlr}, c1, c0, 0",
                "bic {sctlr}, {sctlr}, {mask}",
                "mcr p15, 0, {sctlr}, c1, c0, 0",
                "isb",
                sctlr = out(reg) _,
                mask = in(reg) SCTLR_MMU_ENABLE,
                options(nostack, preserves_flags),
            );
        }
    }

    fn enable_translation(&mut self) {
        // SAFETY: As above. TLBIALL drops every translation cached from the previous table.
        unsafe {
            asm!(
                "mcr p15, 0, {zero}, c8, c7, 0",
                "dsb",
                "mrc p15, 0, {sctlr}, c1, c0, 0",
                "orr {sctlr}, {sctlr}, {mask}",
                "mcr p15, 0, {sctlr}, c1, c0, 0",
                "isb",
                zero = in(reg) 0u32,
                sctlr = out(reg) _,
                mask = in(reg) SCTLR_MMU_ENABLE,
                options(nostack, preserves_flags),
            );
        }
    }
}
