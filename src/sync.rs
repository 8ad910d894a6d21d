//! # Synchronization Primitives
//!
//! The kernel's two locking primitives and the discipline they share:
//!
//! - [`Semaphore`] — a counting semaphore whose `wait` is a spin loop
//!   that briefly opens the interrupt mask on every iteration. There is
//!   no block list; the open window is the only way another task's
//!   `signal` (which runs masked) can become visible, so semaphore
//!   holders must keep critical sections short.
//! - [`Mutex`] — priority-ordered mutual exclusion. Waiters register in
//!   a queue sorted by caller-supplied priority and spin until they are
//!   both at the head and the mutex is free. One global queue semaphore
//!   protects the waiter queues of every mutex in the system.
//!
//! Neither primitive can fail, and neither consults the scheduler: the
//! priority passed to the mutex is whatever the caller claims, and a
//! release does not hand the mutex to anyone — the next waiter discovers
//! the release on its own spin.

use core::cell::UnsafeCell;
use core::ptr::{read_volatile, write_volatile};

use crate::arch;
use crate::heap::KernelHeap;
use crate::kernel;
use crate::list::{self, ListNode};

// ---------------------------------------------------------------------------
// Masked sections
// ---------------------------------------------------------------------------

/// Run `f` with the kernel interrupt mask asserted.
///
/// This is the primary mechanism for safely touching shared kernel state
/// from task level. Keep the enclosed work short: the mask delays the
/// scheduler tick along with everything else at or below the syscall
/// priority ceiling.
#[inline]
pub fn masked<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    arch::mask_interrupts();
    let result = f();
    arch::unmask_interrupts();
    result
}

// ---------------------------------------------------------------------------
// Semaphore
// ---------------------------------------------------------------------------

/// A counting semaphore with a busy-wait acquire.
pub struct Semaphore {
    count: UnsafeCell<u32>,
}

// SAFETY: the counter is only read and written with the interrupt mask
// asserted, which serializes all access on a single core.
unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    /// A semaphore holding `initial` permits.
    pub const fn new(initial: u32) -> Self {
        Self {
            count: UnsafeCell::new(initial),
        }
    }

    /// Take one permit, spinning until one is available.
    ///
    /// The loop re-opens the interrupt mask on every pass so a tick can
    /// preempt to the task that will eventually `signal`.
    pub fn wait(&self) {
        arch::mask_interrupts();
        unsafe {
            while read_volatile(self.count.get()) == 0 {
                arch::unmask_interrupts();
                arch::spin_hint();
                arch::mask_interrupts();
            }
            let count = read_volatile(self.count.get());
            write_volatile(self.count.get(), count - 1);
        }
        arch::unmask_interrupts();
    }

    /// Release one permit.
    pub fn signal(&self) {
        arch::mask_interrupts();
        unsafe {
            let count = read_volatile(self.count.get());
            write_volatile(self.count.get(), count + 1);
        }
        arch::unmask_interrupts();
    }
}

/// Protects the waiter queue of every mutex in the system.
static QUEUE_SEMAPHORE: Semaphore = Semaphore::new(1);

// ---------------------------------------------------------------------------
// Mutex
// ---------------------------------------------------------------------------

/// Pack a waiter into one word: task id in the high half, priority in
/// the low half. The queue stores these words as opaque list payloads.
fn waiter_word(task_id: u32, priority: u32) -> usize {
    debug_assert!(task_id < 1 << 16);
    debug_assert!(priority < 1 << 16);
    ((task_id as usize) << 16) | priority as usize
}

fn waiter_priority(word: usize) -> u32 {
    (word & 0xFFFF) as u32
}

/// Priority-ordered mutual exclusion over a spin-polled waiter queue.
///
/// `const`-constructible so mutexes can live in statics; the queue's
/// backing list is carved from the kernel heap on first use.
pub struct Mutex {
    /// Linear waiter list, lowest priority value (most urgent) at the
    /// head. Null until the first acquire.
    queue: UnsafeCell<*mut ListNode>,
    /// Whether some task currently holds the mutex.
    acquired: UnsafeCell<bool>,
}

// SAFETY: the queue is only touched under the global queue semaphore
// (with the interrupt mask asserted around heap traffic), and `acquired`
// transitions true only under that same semaphore.
unsafe impl Send for Mutex {}
unsafe impl Sync for Mutex {}

impl Mutex {
    /// An unheld mutex with an empty waiter queue.
    pub const fn new() -> Self {
        Self {
            queue: UnsafeCell::new(core::ptr::null_mut()),
            acquired: UnsafeCell::new(false),
        }
    }

    /// Acquire the mutex on behalf of `(task_id, priority)`.
    ///
    /// The caller joins the waiter queue in priority order (lower value =
    /// more urgent = nearer the head; equal priorities keep arrival
    /// order), then spins until it is at the head of the queue while the
    /// mutex is free. Returns holding the mutex.
    pub fn acquire(&self, task_id: u32, priority: u32) {
        let word = waiter_word(task_id, priority);

        QUEUE_SEMAPHORE.wait();
        masked(|| unsafe {
            let heap = kernel::heap();
            let head = if read_volatile(self.queue.get()).is_null() {
                list::new_linear(heap)
            } else {
                read_volatile(self.queue.get())
            };
            write_volatile(self.queue.get(), enqueue_by_priority(heap, head, word));
        });
        QUEUE_SEMAPHORE.signal();

        loop {
            QUEUE_SEMAPHORE.wait();
            let mine = unsafe {
                let head = read_volatile(self.queue.get());
                !read_volatile(self.acquired.get()) && (*head).payload as usize == word
            };
            if mine {
                masked(|| unsafe {
                    write_volatile(self.acquired.get(), true);
                    let heap = kernel::heap();
                    let head = read_volatile(self.queue.get());
                    write_volatile(self.queue.get(), list::remove(heap, head));
                });
                QUEUE_SEMAPHORE.signal();
                return;
            }
            QUEUE_SEMAPHORE.signal();
            arch::spin_hint();
        }
    }

    /// Release the mutex.
    ///
    /// Deliberately does not touch the waiter queue: the next waiter in
    /// line observes the cleared flag on its own spin and takes over.
    pub fn release(&self, _task_id: u32, _priority: u32) {
        unsafe {
            write_volatile(self.acquired.get(), false);
        }
    }
}

/// Insert `word` into a linear waiter list so priority values ascend
/// from the head, preserving arrival order among equals. Walks from the
/// back so a new waiter lands behind everyone at its own priority.
///
/// # Safety
/// `head` must be the head of a live linear list; the caller must hold
/// the queue semaphore and the interrupt mask.
unsafe fn enqueue_by_priority(
    heap: &mut KernelHeap,
    head: *mut ListNode,
    word: usize,
) -> *mut ListNode {
    if (*head).next.is_null() {
        return list::insert_after(heap, head, word as *mut ());
    }

    // Find the last real node (the one just before the dummy tail).
    let mut cur = head;
    while !(*(*cur).next).next.is_null() {
        cur = (*cur).next;
    }

    loop {
        if waiter_priority((*cur).payload as usize) <= waiter_priority(word) {
            list::insert_after(heap, cur, word as *mut ());
            return head;
        }
        if (*cur).prev.is_null() {
            break;
        }
        cur = (*cur).prev;
    }
    list::push_front(heap, head, word as *mut ())
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Serializes tests that touch the global kernel heap.
    static KERNEL_STATE: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn heap_with(buf: &mut [u8]) -> KernelHeap {
        let mut heap = KernelHeap::uninit();
        unsafe { heap.init(buf.as_mut_ptr(), buf.len()) };
        heap
    }

    unsafe fn queue_words(head: *mut ListNode) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cur = head;
        while !(*cur).next.is_null() {
            out.push((*cur).payload as usize);
            cur = (*cur).next;
        }
        out
    }

    #[test]
    fn semaphore_signal_then_wait_is_idempotent() {
        let sem = Semaphore::new(1);
        sem.signal();
        sem.wait();
        // Back to one permit: an immediate wait must not spin.
        sem.wait();
        sem.signal();
    }

    #[test]
    fn waiters_queue_in_priority_order() {
        let mut buf = [0u8; 4096];
        let heap = &mut heap_with(&mut buf);
        unsafe {
            let mut head = list::new_linear(heap);
            // Arrival order 3, 1, 2 — the queue must sort most urgent
            // (lowest value) first.
            for (id, prio) in [(30, 3), (10, 1), (20, 2)] {
                head = enqueue_by_priority(heap, head, waiter_word(id, prio));
            }
            let prios: Vec<u32> = queue_words(head)
                .into_iter()
                .map(waiter_priority)
                .collect();
            assert_eq!(prios, vec![1, 2, 3]);
        }
    }

    #[test]
    fn equal_priorities_keep_arrival_order() {
        let mut buf = [0u8; 4096];
        let heap = &mut heap_with(&mut buf);
        unsafe {
            let mut head = list::new_linear(heap);
            for (id, prio) in [(1, 2), (2, 2), (3, 1), (4, 2)] {
                head = enqueue_by_priority(heap, head, waiter_word(id, prio));
            }
            let ids: Vec<usize> = queue_words(head)
                .into_iter()
                .map(|w| w >> 16)
                .collect();
            assert_eq!(ids, vec![3, 1, 2, 4]);
        }
    }

    #[test]
    fn uncontended_acquire_release_roundtrip() {
        let _guard = KERNEL_STATE.lock().unwrap();
        let region = Box::leak(vec![0u8; 8192].into_boxed_slice());
        crate::kernel::init(region);

        let mutex = Mutex::new();
        mutex.acquire(5, 1);
        unsafe {
            assert!(*mutex.acquired.get());
            // The waiter dequeued itself; only the dummy remains.
            assert!(queue_words(*mutex.queue.get()).is_empty());
        }
        mutex.release(5, 1);
        unsafe {
            assert!(!*mutex.acquired.get());
        }
        // Observationally unchanged: a second acquire succeeds at once.
        mutex.acquire(5, 1);
        mutex.release(5, 1);
    }

    #[test]
    fn released_mutex_goes_to_the_queue_head() {
        let _guard = KERNEL_STATE.lock().unwrap();
        let region = Box::leak(vec![0u8; 8192].into_boxed_slice());
        crate::kernel::init(region);

        let mutex = Mutex::new();
        mutex.acquire(9, 2);
        unsafe {
            // A background-priority waiter arrives while the mutex is
            // held.
            let heap = kernel::heap();
            let head = *mutex.queue.get();
            *mutex.queue.get() = enqueue_by_priority(heap, head, waiter_word(7, 3));
        }
        mutex.release(9, 2);

        // A more urgent caller arriving after the release overtakes the
        // queued waiter and completes without spinning.
        mutex.acquire(8, 1);
        unsafe {
            let remaining = queue_words(*mutex.queue.get());
            assert_eq!(remaining, vec![waiter_word(7, 3)]);
            assert!(*mutex.acquired.get());
        }
    }
}
