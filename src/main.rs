//! # Chronos Demo Firmware
//!
//! Exercises the kernel with the classic contention scenario: three
//! background workers fighting over one mutex while a periodic task
//! reports progress on a real-time deadline.
//!
//! | Task | Type | Priority | Behavior |
//! |------|------|----------|----------|
//! | `telemetry`    | Periodic | 0 | Due every 200 ms, reads the counter |
//! | `worker_one`   | Worker   | 1 | Bumps the counter under the mutex |
//! | `worker_two`   | Worker   | 1 | Bumps the counter under the mutex |
//! | `worker_three` | Worker   | 1 | Bumps the counter under the mutex |
//!
//! The workers are identical, so round-robin at priority 1 shares the
//! CPU between them while the mutex serializes their counter bursts;
//! the telemetry task preempts whoever is running whenever its deadline
//! comes up. With the `defmt` feature enabled the kernel and the
//! telemetry task log over RTT.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod firmware {
    use core::sync::atomic::{AtomicU32, Ordering};

    use cortex_m_rt::entry;
    use panic_halt as _;

    #[cfg(feature = "defmt")]
    use defmt_rtt as _;

    use chronos::kernel;
    use chronos::sync::Mutex;

    /// Bytes handed to the kernel heap: four TCBs, four stacks, and the
    /// list nodes, with room to spare.
    const HEAP_BYTES: usize = 16 * 1024;

    /// Stack per task, in bytes.
    const TASK_STACK: usize = 512;

    /// Serializes the workers' counter bursts.
    static COUNTER_LOCK: Mutex = Mutex::new();

    /// The contended counter. Each worker adds 100 per mutex hold.
    static SHARED_COUNT: AtomicU32 = AtomicU32::new(0);

    // -----------------------------------------------------------------------
    // Task bodies
    // -----------------------------------------------------------------------

    /// **Periodic telemetry task** (priority 0, period 200 ms).
    ///
    /// Runs whenever its deadline is due, preempting the workers.
    extern "C" fn telemetry() -> ! {
        loop {
            let count = SHARED_COUNT.load(Ordering::Relaxed);
            #[cfg(feature = "defmt")]
            defmt::info!("telemetry: shared count {=u32}", count);
            #[cfg(not(feature = "defmt"))]
            let _ = count;
        }
    }

    /// A worker's life: take the mutex, burst the counter, let go.
    fn worker(task_id: u32) -> ! {
        loop {
            COUNTER_LOCK.acquire(task_id, 1);
            for _ in 0..100 {
                SHARED_COUNT.fetch_add(1, Ordering::Relaxed);
            }
            COUNTER_LOCK.release(task_id, 1);
        }
    }

    extern "C" fn worker_one() -> ! {
        worker(1)
    }

    extern "C" fn worker_two() -> ! {
        worker(2)
    }

    extern "C" fn worker_three() -> ! {
        worker(3)
    }

    // -----------------------------------------------------------------------
    // Entry point
    // -----------------------------------------------------------------------

    /// Report the faulting frame before halting. A bad stack pointer in
    /// a restored context lands here rather than anywhere recoverable.
    #[cfg(feature = "defmt")]
    #[cortex_m_rt::exception]
    unsafe fn HardFault(frame: &cortex_m_rt::ExceptionFrame) -> ! {
        defmt::error!("FAULT: {}", defmt::Debug2Format(frame));
        cortex_m::asm::udf();
    }

    /// Firmware entry point: adopt the heap, spawn the task set, and
    /// hand the CPU to the scheduler.
    #[entry]
    fn main() -> ! {
        static mut HEAP_MEM: [u8; HEAP_BYTES] = [0; HEAP_BYTES];

        let peripherals = cortex_m::Peripherals::take().unwrap();

        kernel::init(HEAP_MEM);

        kernel::spawn_periodic(telemetry, 0, TASK_STACK, 200);
        kernel::spawn(worker_one, 1, TASK_STACK, 1);
        kernel::spawn(worker_two, 2, TASK_STACK, 1);
        kernel::spawn(worker_three, 3, TASK_STACK, 1);

        kernel::start(peripherals)
    }
}

/// The firmware only means something on the target; host builds (unit
/// tests, tooling) get an empty stub.
#[cfg(not(target_os = "none"))]
fn main() {}
