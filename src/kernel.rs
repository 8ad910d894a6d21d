//! # Kernel
//!
//! Top-level kernel state and the public API: heap adoption, task
//! spawning, and scheduler startup.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init(heap)      ← Adopt the heap region
//!         ├─► kernel::spawn*()        ← Create tasks (×N)
//!         └─► kernel::start()         ← Launch the scheduler (no return)
//!               ├─► Exception priorities (PendSV lowest)
//!               ├─► SysTick at TICK_RATE_HZ
//!               └─► Pend the first switch; PendSV boots the first task
//! ```
//!
//! The globals here — the scheduler record and the kernel heap — are the
//! process-wide mutable state. They are constructed before the scheduler
//! starts and thereafter touched only under the interrupt mask or inside
//! the deferred-switch handler.

use core::ptr::addr_of_mut;

use crate::arch;
use crate::heap::KernelHeap;
use crate::scheduler::Scheduler;
use crate::sync;
use crate::task::TaskEntry;

// ---------------------------------------------------------------------------
// Global kernel state
// ---------------------------------------------------------------------------

/// The one scheduler instance.
static mut SCHEDULER: Scheduler = Scheduler::new();

/// Raw pointer to the scheduler, published by [`init`]. The exception
/// handlers go through this rather than the static so that a switch
/// before `init` resolves to a clean no-op.
static mut SCHEDULER_PTR: *mut Scheduler = core::ptr::null_mut();

/// The heap every TCB, stack, and list node is carved from.
static mut KERNEL_HEAP: KernelHeap = KernelHeap::uninit();

/// The global kernel heap.
///
/// Callers must hold the interrupt mask (or be the deferred-switch
/// handler) for the duration of any allocation.
pub(crate) fn heap() -> &'static mut KernelHeap {
    unsafe { &mut *addr_of_mut!(KERNEL_HEAP) }
}

/// The scheduler, if [`init`] has published it yet.
pub(crate) fn try_scheduler() -> Option<&'static mut Scheduler> {
    unsafe {
        let ptr = *addr_of_mut!(SCHEDULER_PTR);
        if ptr.is_null() {
            None
        } else {
            Some(&mut *ptr)
        }
    }
}

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Initialize the kernel: adopt `heap_region` as the kernel heap and
/// publish a fresh scheduler.
///
/// Must be called exactly once, before any spawn, from the main thread.
pub fn init(heap_region: &'static mut [u8]) {
    #[cfg(feature = "defmt")]
    let heap_bytes = heap_region.len();

    unsafe {
        let heap = &mut *addr_of_mut!(KERNEL_HEAP);
        heap.init(heap_region.as_mut_ptr(), heap_region.len());

        let sched = &mut *addr_of_mut!(SCHEDULER);
        *sched = Scheduler::new();
        *addr_of_mut!(SCHEDULER_PTR) = sched;
    }

    #[cfg(feature = "defmt")]
    defmt::debug!("kernel: adopted {=usize} byte heap", heap_bytes);
}

/// Spawn a background task.
///
/// Allocates the stack and TCB, fabricates the initial frame, and makes
/// the task runnable at `priority` (which must be in `1..NUM_PRIORITIES`
/// — priority 0 belongs to [`spawn_periodic`]). `stack_size` is in bytes,
/// word-multiple, at least [`crate::config::MIN_STACK_SIZE`].
///
/// The whole operation runs with interrupts masked so a tick can never
/// observe a half-built task. Heap exhaustion halts the system: there is
/// nothing to return to before the scheduler starts, and nothing useful
/// to do after.
pub fn spawn(entry: TaskEntry, task_id: u32, stack_size: usize, priority: u32) {
    sync::masked(|| {
        let sched = try_scheduler().expect("kernel::init must run before spawn");
        unsafe { sched.spawn(heap(), entry, task_id, stack_size, priority) };
    });

    #[cfg(feature = "defmt")]
    defmt::debug!(
        "kernel: spawned task {=u32} at priority {=u32}",
        task_id,
        priority
    );
}

/// Spawn a periodic real-time task that becomes due every `period_ms`
/// milliseconds. Periodic tasks live at priority 0 and are dispatched
/// earliest-deadline-first; the period must comfortably exceed the work
/// the task does per activation.
pub fn spawn_periodic(entry: TaskEntry, task_id: u32, stack_size: usize, period_ms: i32) {
    sync::masked(|| {
        let sched = try_scheduler().expect("kernel::init must run before spawn");
        unsafe { sched.spawn_periodic(heap(), entry, task_id, stack_size, period_ms) };
    });

    #[cfg(feature = "defmt")]
    defmt::debug!(
        "kernel: spawned periodic task {=u32}, period {=i32} ms",
        task_id,
        period_ms
    );
}

/// Start the scheduler. **Does not return.**
///
/// Sets the exception priorities, arms SysTick, marks the scheduler
/// started, and pends the first context switch; PendSV then boots into
/// the first spawned task and the boot stack is abandoned.
pub fn start(mut peripherals: cortex_m::Peripherals) -> ! {
    arch::set_exception_priorities(&mut peripherals.SCB);
    arch::configure_systick(&mut peripherals.SYST);

    sync::masked(|| {
        let sched = try_scheduler().expect("kernel::init must run before start");
        assert!(!sched.next.is_null(), "no tasks have been spawned");
        sched.started = true;
    });

    #[cfg(feature = "defmt")]
    defmt::info!("kernel: scheduler started");

    arch::request_context_switch();
    cortex_m::asm::isb();
    // The pended switch fires before execution can fall through.
    unreachable!();
}
