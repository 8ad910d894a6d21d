//! # Scheduler
//!
//! The kernel record and the scheduling policy: priority round-robin over
//! circular ready lists, with an earliest-deadline-first overlay for the
//! periodic tasks living at priority 0.
//!
//! ## Selection Algorithm
//!
//! On every context switch:
//! 1. **Periodic bookkeeping**: walk the priority-0 list once, decrementing
//!    each task's `remaining` by [`SWAP_TIME_MS`] — exactly once per task
//!    per switch. A task whose `remaining` has fallen to within
//!    [`DELTA_REALTIME_MS`] of its deadline (or past it) is *due*.
//! 2. **Deadline dispatch**: if any task is due, select the one with the
//!    earliest `remaining` and reset its `remaining` to its period.
//! 3. **Round-robin**: otherwise walk the background levels from highest
//!    to lowest; the first non-empty level supplies its head, and the head
//!    is advanced one position so the level's tasks take turns.
//! 4. **Nothing runnable**: keep the current task — there is no idle task.
//!
//! Priority 0 is dispatched exclusively by step 2: a periodic task that is
//! not due is not a round-robin candidate, otherwise the mere existence of
//! a periodic task would starve every background level.
//!
//! The policy mutates nothing beyond the `remaining` bookkeeping and the
//! head advance; ready-list membership only changes during spawn, which
//! runs with interrupts masked.

use crate::config::{
    DELTA_REALTIME_MS, MIN_STACK_SIZE, NUM_PRIORITIES, SWAP_TIME_MS, WORD_SIZE,
};
use crate::heap::KernelHeap;
use crate::list::{self, ListNode};
use crate::task::{self, TaskEntry, Tcb};

// ---------------------------------------------------------------------------
// Kernel record
// ---------------------------------------------------------------------------

/// The central kernel state: the ready-list array and the current/next
/// task slots the context switch trades through. Stored as a global in
/// [`crate::kernel`] and only mutated during spawn (interrupts masked) or
/// inside the deferred-switch handler.
pub struct Scheduler {
    /// One circular list of runnable TCBs per priority level; null when
    /// no task of that level exists. The list pointer itself is the
    /// round-robin head.
    pub(crate) ready: [*mut ListNode; NUM_PRIORITIES],

    /// The running task's TCB; null until the first context switch.
    pub(crate) current: *mut Tcb,

    /// The TCB selected to run next. Seeded by the first spawn so the
    /// first context switch has a task to adopt.
    pub(crate) next: *mut Tcb,

    /// Set by [`crate::kernel::start`]; the deferred-switch handler is a
    /// no-op until then.
    pub(crate) started: bool,
}

impl Scheduler {
    /// An empty scheduler with no tasks and all levels absent.
    pub const fn new() -> Self {
        Self {
            ready: [core::ptr::null_mut(); NUM_PRIORITIES],
            current: core::ptr::null_mut(),
            next: core::ptr::null_mut(),
            started: false,
        }
    }

    // -----------------------------------------------------------------------
    // Spawn
    // -----------------------------------------------------------------------

    /// Create a background task at `priority` and make it runnable.
    ///
    /// # Safety
    /// `heap` must be initialized and the caller must hold the interrupt
    /// mask: a tick between TCB construction and list insertion would let
    /// the switch observe a half-built record.
    pub(crate) unsafe fn spawn(
        &mut self,
        heap: &mut KernelHeap,
        entry: TaskEntry,
        task_id: u32,
        stack_size: usize,
        priority: u32,
    ) {
        debug_assert!(priority > 0, "priority 0 is reserved for periodic tasks");
        self.spawn_common(heap, entry, task_id, stack_size, priority, 0);
    }

    /// Create a periodic real-time task with activation interval
    /// `period_ms`. Periodic tasks always live at priority 0 and are
    /// dispatched by deadline, not round-robin.
    ///
    /// # Safety
    /// As for [`Scheduler::spawn`].
    pub(crate) unsafe fn spawn_periodic(
        &mut self,
        heap: &mut KernelHeap,
        entry: TaskEntry,
        task_id: u32,
        stack_size: usize,
        period_ms: i32,
    ) {
        debug_assert!(period_ms > 0);
        self.spawn_common(heap, entry, task_id, stack_size, 0, period_ms);
    }

    unsafe fn spawn_common(
        &mut self,
        heap: &mut KernelHeap,
        entry: TaskEntry,
        task_id: u32,
        stack_size: usize,
        priority: u32,
        period: i32,
    ) {
        debug_assert!((priority as usize) < NUM_PRIORITIES);
        debug_assert!(stack_size % WORD_SIZE == 0);
        debug_assert!(stack_size >= MIN_STACK_SIZE);

        let stack = heap.alloc(stack_size);
        let stack_base = stack.add(stack_size) as *mut u32;
        let saved_sp = task::fabricate_initial_frame(stack_base, entry);

        let tcb = heap.alloc(core::mem::size_of::<Tcb>()) as *mut Tcb;
        tcb.write(Tcb {
            stack_base,
            saved_sp,
            priority,
            task_id,
            period,
            remaining: period,
            list_entry: core::ptr::null_mut(),
            stack_size,
        });

        let level = priority as usize;
        let node = if self.ready[level].is_null() {
            self.ready[level] = list::new_circular(heap, tcb as *mut ());
            self.ready[level]
        } else {
            let head = list::insert_after(heap, self.ready[level], tcb as *mut ());
            (*head).next
        };
        (*tcb).list_entry = node;

        // The first spawned task is what the first context switch adopts.
        if self.next.is_null() {
            self.next = tcb;
        }
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Pick the task to run after the current one and write it into the
    /// `next` slot. Called from the deferred-switch handler.
    ///
    /// # Safety
    /// Must only run inside the deferred-switch handler (or, in tests,
    /// anywhere nothing else is touching the scheduler).
    pub unsafe fn switch_to_next(&mut self) {
        // Step 1 + 2: periodic bookkeeping and deadline dispatch.
        let mut due: *mut Tcb = core::ptr::null_mut();
        let head = self.ready[0];
        if !head.is_null() {
            let mut node = head;
            loop {
                let tcb = (*node).payload as *mut Tcb;
                debug_assert!((*tcb).is_periodic());
                (*tcb).remaining -= SWAP_TIME_MS;
                if (*tcb).remaining <= DELTA_REALTIME_MS
                    && (due.is_null() || (*tcb).remaining < (*due).remaining)
                {
                    due = tcb;
                }
                node = (*node).next;
                if node == head {
                    break;
                }
            }
        }
        if !due.is_null() {
            (*due).remaining = (*due).period;
            self.next = due;
            return;
        }

        // Step 3: round-robin across the background levels.
        for level in 1..NUM_PRIORITIES {
            let head = self.ready[level];
            if head.is_null() {
                continue;
            }
            self.ready[level] = (*head).next;
            self.next = (*head).payload as *mut Tcb;
            return;
        }

        // Step 4: nothing else is runnable.
        self.next = self.current;
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
