//! # Task Control Block
//!
//! Defines the task model for the kernel. A task is a function that runs
//! forever on its own stack; the TCB is the kernel's per-task record and
//! the only thing the context switch reads or writes when suspending and
//! resuming a task.
//!
//! ## Stack Image of a Suspended Task
//!
//! ```text
//!  stack_base ──►  (one past the end; stacks grow downward)
//!                  xPSR   (Thumb bit set)
//!                  PC     (resume address; entry point when fresh)
//!                  LR
//!                  R12
//!                  R3
//!                  R2
//!                  R1
//!                  R0     ◄─ hardware-stacked exception frame
//!                  LR     (EXC_RETURN consumed by the switch exit)
//!                  R11
//!                  ...
//!  saved_sp ──►    R4     ◄─ software-stacked by the switch entry
//! ```
//!
//! Spawn fabricates exactly this image so that the first restore resumes
//! the task as if it had just been interrupted at its entry point; the
//! layout must stay in lockstep with the PendSV exit sequence or the
//! first entry into the task faults.

use crate::config::{INITIAL_EXC_RETURN, INITIAL_XPSR, WORD_SIZE};
use crate::list::ListNode;

/// The signature of a task body. Tasks take no arguments and never
/// return; the fabricated link register would send a returning task
/// straight into a fault.
pub type TaskEntry = extern "C" fn() -> !;

// ---------------------------------------------------------------------------
// Task Control Block
// ---------------------------------------------------------------------------

/// One schedulable task.
///
/// TCBs and their stacks are carved from the kernel heap at spawn time
/// and live for the remainder of the program. After spawn the scheduler
/// owns the TCB: `saved_sp` changes on every context switch, `remaining`
/// on every switch for periodic tasks, and nothing else moves.
pub struct Tcb {
    /// Address one past the end of the task's stack region.
    pub(crate) stack_base: *mut u32,
    /// The task's stack pointer while suspended. Always points at the
    /// software-saved R4 of the frame described in the module docs.
    pub(crate) saved_sp: *mut u32,
    /// Ready-list level, `0..NUM_PRIORITIES`. Level 0 is reserved for
    /// periodic real-time tasks.
    pub(crate) priority: u32,
    /// Caller-supplied identifier, unique per task.
    pub(crate) task_id: u32,
    /// Nominal activation interval in milliseconds; 0 for non-periodic
    /// tasks.
    pub(crate) period: i32,
    /// Milliseconds until this periodic task is next due. Decremented by
    /// the scheduler on every context switch, reset to `period` when the
    /// task is selected.
    pub(crate) remaining: i32,
    /// Back-reference to the ready-list node holding this TCB.
    pub(crate) list_entry: *mut ListNode,
    /// Stack region length in bytes.
    pub(crate) stack_size: usize,
}

impl Tcb {
    /// Whether this TCB participates in deadline scheduling.
    pub fn is_periodic(&self) -> bool {
        self.period > 0
    }

    /// Lowest valid stack address for this task.
    pub fn stack_limit(&self) -> *mut u32 {
        let words = self.stack_size / WORD_SIZE;
        self.stack_base.wrapping_sub(words)
    }

    /// Stack containment invariant: a suspended task's stack pointer
    /// lies inside its own stack region.
    pub fn sp_in_bounds(&self, sp: *mut u32) -> bool {
        sp >= self.stack_limit() && sp < self.stack_base
    }
}

// ---------------------------------------------------------------------------
// Initial frame fabrication
// ---------------------------------------------------------------------------

/// Write a fresh task's initial stack image below `stack_base` and
/// return the resulting stack pointer.
///
/// The callee-saved registers carry their own register numbers as
/// values, which makes a mis-restored frame obvious in a debugger. The
/// hardware frame's LR is the exception-return code itself, so a task
/// body that returns takes an immediate fault rather than wandering.
///
/// # Safety
/// `stack_base` must point one past a writable region of at least
/// [`crate::config::INITIAL_FRAME_WORDS`] words.
pub(crate) unsafe fn fabricate_initial_frame(stack_base: *mut u32, entry: TaskEntry) -> *mut u32 {
    // Hardware-stacked exception frame, bottom word first.
    let mut sp = stack_base.sub(8);
    sp.add(0).write(0); // R0
    sp.add(1).write(1); // R1
    sp.add(2).write(2); // R2
    sp.add(3).write(3); // R3
    sp.add(4).write(12); // R12
    sp.add(5).write(INITIAL_EXC_RETURN); // LR
    sp.add(6).write(entry as usize as u32); // PC
    sp.add(7).write(INITIAL_XPSR); // xPSR

    // Software-stacked words, pushed in the order the switch exit pops
    // them back: LR last-pushed-first, then R11 down to R4.
    sp = sp.sub(1);
    sp.write(INITIAL_EXC_RETURN); // LR
    for reg in (4..=11u32).rev() {
        sp = sp.sub(1);
        sp.write(reg); // R4..R11 as literal register numbers
    }
    sp
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::INITIAL_FRAME_WORDS;

    extern "C" fn probe() -> ! {
        loop {}
    }

    #[test]
    fn initial_frame_layout_matches_restore_order() {
        let mut stack = [0u32; 64];
        let base = unsafe { stack.as_mut_ptr().add(64) };
        let sp = unsafe { fabricate_initial_frame(base, probe) };

        assert_eq!(base as usize - sp as usize, INITIAL_FRAME_WORDS * 4);

        let words: Vec<u32> = (0..INITIAL_FRAME_WORDS as isize)
            .map(|i| unsafe { *sp.offset(i) })
            .collect();

        // Software-saved portion: R4..R11 then the EXC_RETURN word.
        assert_eq!(&words[0..8], &[4, 5, 6, 7, 8, 9, 10, 11]);
        assert_eq!(words[8], INITIAL_EXC_RETURN);
        // Hardware frame: R0-R3, R12, LR, PC, xPSR.
        assert_eq!(&words[9..14], &[0, 1, 2, 3, 12]);
        assert_eq!(words[14], INITIAL_EXC_RETURN);
        assert_eq!(words[15], probe as usize as u32);
        assert_eq!(words[16], INITIAL_XPSR);
    }

    #[test]
    fn fabricated_sp_is_contained_in_stack() {
        let mut stack = [0u32; INITIAL_FRAME_WORDS];
        let base = unsafe { stack.as_mut_ptr().add(INITIAL_FRAME_WORDS) };
        let sp = unsafe { fabricate_initial_frame(base, probe) };

        let tcb = Tcb {
            stack_base: base,
            saved_sp: sp,
            priority: 1,
            task_id: 0,
            period: 0,
            remaining: 0,
            list_entry: core::ptr::null_mut(),
            stack_size: INITIAL_FRAME_WORDS * WORD_SIZE,
        };
        assert!(tcb.sp_in_bounds(sp));
        // A minimum-size stack is filled exactly to its limit.
        assert_eq!(sp, tcb.stack_limit());
    }
}
