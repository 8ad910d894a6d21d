//! Host stand-ins for the Cortex-M4 port.
//!
//! Unit tests run on the build machine, where the ARM assembly and
//! system registers do not exist. The mask and hint operations become
//! no-ops (tests are single-threaded over the state they touch) and the
//! hardware-configuration entry points must never be reached.

use cortex_m::peripheral::{SCB, SYST};

pub fn mask_interrupts() {}

pub fn unmask_interrupts() {}

pub fn spin_hint() {
    core::hint::spin_loop();
}

pub fn request_context_switch() {}

pub fn configure_systick(_syst: &mut SYST) {
    unimplemented!()
}

pub fn set_exception_priorities(_scb: &mut SCB) {
    unimplemented!()
}
