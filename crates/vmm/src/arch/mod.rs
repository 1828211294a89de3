//! Translation control backends.
//!
//! The ARMv7 backend is compiled whenever we build for a 32-bit ARM target. The software
//! backend is compiled for tests and when the `software-emulation` feature is enabled, so
//! host-side tools can drive the manager without hardware.

#[cfg(target_arch = "arm")]
pub mod armv7;

#[cfg(any(test, feature = "software-emulation"))]
pub mod software;
