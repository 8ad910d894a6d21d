//! # Cortex-M4 Port Layer
//!
//! Hardware-specific code for the ARM Cortex-M4 (Thumb-2) processor:
//! the BASEPRI interrupt mask, SysTick configuration, and the two-handler
//! context switch.
//!
//! ## Context Switch Mechanism
//!
//! The switch is split across two exceptions:
//!
//! - **SysTick** does no per-task work at all; it pends PendSV and
//!   returns. Pending rather than switching in place guarantees the
//!   switch runs only once every higher-priority interrupt has retired.
//! - **PendSV** runs at the lowest exception priority and performs the
//!   switch. On entry the hardware has already stacked R0-R3, R12, LR,
//!   PC and xPSR onto the running task's stack; the handler stacks the
//!   rest (R4-R11 plus the exception-return word), trades stack pointers
//!   through the scheduler, unstacks the successor's registers, and the
//!   exception return unstacks the successor's hardware frame.
//!
//! Tasks run privileged, in Thread mode, on the **main** stack: each
//! task's stack simply becomes MSP while it runs, and the exception
//! return code is `0xFFFFFFF9` throughout. There is no PSP juggling and
//! no separate first-task trampoline — the very first PendSV finds no
//! current task, skips the save, and adopts the seeded next task.
//!
//! ## Interrupt Priorities
//!
//! - PendSV: lowest priority, so a switch never preempts an ISR.
//! - SysTick: one step above PendSV, so the tick can still fire while a
//!   switch is pending.

use core::arch::naked_asm;

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};

use crate::config::{
    CPU_CLOCK_HZ, MAX_SYSCALL_INTERRUPT_PRIORITY, NVIC_PRIO_BITS, TICK_RATE_HZ,
};
use crate::kernel;

// ---------------------------------------------------------------------------
// Interrupt mask
// ---------------------------------------------------------------------------

/// Raise BASEPRI to the syscall ceiling, masking every exception the
/// kernel synchronizes against. Pairs with [`unmask_interrupts`].
#[inline]
pub fn mask_interrupts() {
    unsafe {
        cortex_m::register::basepri::write(
            MAX_SYSCALL_INTERRUPT_PRIORITY << (8 - NVIC_PRIO_BITS),
        );
    }
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

/// Clear BASEPRI, reopening the mask.
#[inline]
pub fn unmask_interrupts() {
    unsafe {
        cortex_m::register::basepri::write(0);
    }
}

/// A few cycles of nothing, giving a pending tick room to preempt
/// between spin-loop iterations.
#[inline]
pub fn spin_hint() {
    cortex_m::asm::nop();
    cortex_m::asm::nop();
    cortex_m::asm::nop();
}

// ---------------------------------------------------------------------------
// Deferred switch request
// ---------------------------------------------------------------------------

/// Request a context switch by pending the PendSV exception.
///
/// Sets the PENDSVSET bit in the Interrupt Control and State Register;
/// the switch itself runs once every other active exception has retired.
#[inline]
pub fn request_context_switch() {
    // ICSR address: 0xE000_ED04, PENDSVSET = bit 28
    const ICSR: *mut u32 = 0xE000_ED04 as *mut u32;
    unsafe {
        core::ptr::write_volatile(ICSR, 1 << 28);
    }
}

// ---------------------------------------------------------------------------
// Timer and priority configuration
// ---------------------------------------------------------------------------

/// Configure the SysTick timer for the scheduler tick.
///
/// Sets up SysTick to fire at [`TICK_RATE_HZ`] from the processor clock.
pub fn configure_systick(syst: &mut SYST) {
    let reload = CPU_CLOCK_HZ / TICK_RATE_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

/// Put PendSV at the lowest exception priority and SysTick one step
/// above it, so the tick can fire while a switch is pending but the
/// switch itself never preempts anything.
pub fn set_exception_priorities(scb: &mut SCB) {
    unsafe {
        scb.set_priority(SystemHandler::PendSV, 0xFF);
        scb.set_priority(SystemHandler::SysTick, 0xF0);
    }
}

// ---------------------------------------------------------------------------
// Exception handlers
// ---------------------------------------------------------------------------

/// SysTick exception handler. Its sole job is to pend the deferred
/// switch; every scheduling decision happens in PendSV.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn SysTick() {
    request_context_switch();
}

/// PendSV exception handler — the context switch.
///
/// Stacks the software-saved registers on the active (task) stack, hands
/// the stack pointer to [`switch_context`], adopts whatever stack pointer
/// comes back, and unstacks. When the scheduler has not started, or no
/// task can run yet, `switch_context` returns the input pointer and the
/// whole exception is a no-op round trip.
#[unsafe(no_mangle)]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid i",
        "push {{r4-r11, lr}}",
        "mov r0, sp",
        "bl {switch}",
        "mov sp, r0",
        "pop {{r4-r11, lr}}",
        "cpsie i",
        "bx lr",
        switch = sym switch_context,
    );
}

/// The Rust half of PendSV. Receives the active stack pointer (now
/// holding the full 17-word suspended frame) and returns the stack
/// pointer to resume from.
///
/// # Safety
/// Called only from the PendSV handler, which is not preemptible by any
/// other scheduler path.
unsafe extern "C" fn switch_context(sp: *mut u32) -> *mut u32 {
    let sched = match kernel::try_scheduler() {
        Some(sched) => sched,
        None => return sp,
    };
    if !sched.started {
        return sp;
    }
    if sched.current.is_null() {
        // First entry: nothing to save, adopt the task seeded by spawn.
        if sched.next.is_null() {
            return sp;
        }
        sched.current = sched.next;
        return (*sched.current).saved_sp;
    }

    debug_assert!((*sched.current).sp_in_bounds(sp));
    (*sched.current).saved_sp = sp;
    sched.switch_to_next();
    sched.current = sched.next;
    (*sched.current).saved_sp
}
