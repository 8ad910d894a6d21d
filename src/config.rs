//! # Kernel Configuration
//!
//! Compile-time constants governing the scheduler and system behavior.
//! All limits are fixed at compile time — the only dynamic allocation is
//! from the kernel heap region handed to [`crate::kernel::init`].

/// System clock frequency in Hz (STM32F4 at 16 MHz HSI).
pub const CPU_CLOCK_HZ: u32 = 16_000_000;

/// SysTick frequency in Hz. Determines scheduler tick granularity.
/// Higher values give finer scheduling precision at the cost of
/// increased interrupt overhead.
pub const TICK_RATE_HZ: u32 = 1_000;

/// Number of priority levels in the ready-list array. Priority 0 is
/// reserved for periodic real-time tasks; background tasks use the
/// remaining levels.
pub const NUM_PRIORITIES: usize = 4;

/// Milliseconds between context switches. Each switch decrements every
/// periodic task's remaining time by this amount, so it must equal the
/// true tick period or deadlines drift.
pub const SWAP_TIME_MS: i32 = (1_000 / TICK_RATE_HZ) as i32;

/// Slack, in milliseconds, around a periodic task's nominal deadline.
/// A priority-0 task whose remaining time has fallen to within this
/// slack is due for execution.
pub const DELTA_REALTIME_MS: i32 = 10;

/// Highest interrupt priority masked by the kernel's BASEPRI-based
/// interrupt mask. Exceptions with this priority value or a numerically
/// greater one cannot preempt a masked region.
pub const MAX_SYSCALL_INTERRUPT_PRIORITY: u8 = 1;

/// Number of implemented NVIC priority bits on the target (STM32F4: 4).
/// Priority values are shifted into the top bits of BASEPRI.
pub const NVIC_PRIO_BITS: u8 = 4;

/// Machine word size in bytes on the target. Task stack sizes must be a
/// multiple of this, and the fabricated initial frame is measured in
/// these units.
pub const WORD_SIZE: usize = 4;

/// Initial program status register for a fresh task: only the Thumb bit
/// is set (the only supported execution state on Armv7-M).
pub const INITIAL_XPSR: u32 = 0x0100_0000;

/// Exception-return code selecting privileged Thread mode on the main
/// stack. Written into a fresh task's frame both as the software-saved
/// LR (consumed by the PendSV exit sequence) and as the hardware frame's
/// LR, so a task body that returned would fault immediately.
pub const INITIAL_EXC_RETURN: u32 = 0xFFFF_FFF9;

/// Words in the fabricated initial stack frame: 8 hardware-stacked
/// exception words plus 9 software-stacked words (R4-R11 and LR).
pub const INITIAL_FRAME_WORDS: usize = 17;

/// Smallest permissible task stack, in bytes: just the initial frame.
/// Real tasks want considerably more; this is the fabrication minimum.
pub const MIN_STACK_SIZE: usize = INITIAL_FRAME_WORDS * WORD_SIZE;
