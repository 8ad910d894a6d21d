//! # Architecture Abstraction Layer
//!
//! The hardware seam for the kernel: the interrupt mask, the deferred
//! context-switch request, the tick timer, and the two exception handlers
//! that do the register-level work. Everything above this module is
//! portable.
//!
//! On the embedded target the Cortex-M4 port is compiled in. Everywhere
//! else (the test host) a mock module with the same surface takes its
//! place, so the portable kernel logic unit-tests on the build machine;
//! the mask and hint operations become no-ops and anything that would
//! touch real hardware is `unimplemented!`.

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod cortex_m4;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use cortex_m4::*;

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
mod host;
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub use host::*;
