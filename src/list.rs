//! # Kernel Lists
//!
//! Doubly-linked lists over opaque payload pointers, with nodes allocated
//! from the kernel heap. Two flavors back the kernel's queues:
//!
//! - **Linear** lists end in a dummy tail node (null payload, null links).
//!   An empty list is just the dummy. The mutex waiter queues are linear.
//! - **Circular** lists are created from their first payload; a singleton
//!   node links to itself. The ready lists are circular, and the scheduler
//!   round-robins by swapping which node it treats as the head.
//!
//! A list is identified by a raw pointer to its head node, exactly as the
//! owning structures store it. All mutation happens with interrupts masked
//! or inside the deferred-switch handler.

use crate::heap::KernelHeap;

/// One list node. The payload is opaque to the list; the kernel stores
/// `Tcb` pointers (ready lists) and packed waiter words (mutex queues).
pub struct ListNode {
    pub(crate) payload: *mut (),
    pub(crate) next: *mut ListNode,
    pub(crate) prev: *mut ListNode,
}

unsafe fn alloc_node(heap: &mut KernelHeap, payload: *mut ()) -> *mut ListNode {
    let node = heap.alloc(core::mem::size_of::<ListNode>()) as *mut ListNode;
    (*node).payload = payload;
    (*node).next = core::ptr::null_mut();
    (*node).prev = core::ptr::null_mut();
    node
}

/// Create an empty linear list: a lone dummy tail node.
///
/// # Safety
/// `heap` must be initialized; the caller must hold the interrupt mask.
pub unsafe fn new_linear(heap: &mut KernelHeap) -> *mut ListNode {
    alloc_node(heap, core::ptr::null_mut())
}

/// Create a circular list holding `payload`; the node is its own
/// neighbor in both directions.
///
/// # Safety
/// `heap` must be initialized; the caller must hold the interrupt mask.
pub unsafe fn new_circular(heap: &mut KernelHeap, payload: *mut ()) -> *mut ListNode {
    let node = alloc_node(heap, payload);
    (*node).next = node;
    (*node).prev = node;
    node
}

/// Insert a new node holding `payload` directly after `node`, and return
/// the list's head on the assumption that `node` was the head.
///
/// On an empty linear list (the dummy) the new node goes in front of the
/// dummy instead and becomes the head.
///
/// # Safety
/// `node` must be a live node of an initialized list; the caller must
/// hold the interrupt mask.
pub unsafe fn insert_after(
    heap: &mut KernelHeap,
    node: *mut ListNode,
    payload: *mut (),
) -> *mut ListNode {
    let fresh = alloc_node(heap, payload);
    if (*node).next.is_null() {
        // Empty linear list: the new node becomes the head, in front of
        // the dummy.
        (*fresh).next = node;
        (*node).prev = fresh;
        return fresh;
    }
    (*fresh).next = (*node).next;
    (*fresh).prev = node;
    (*(*fresh).next).prev = fresh;
    (*node).next = fresh;
    node
}

/// Push `payload` in front of `head` and return the new head.
///
/// # Safety
/// `head` must be the head of a live linear list; the caller must hold
/// the interrupt mask.
pub unsafe fn push_front(
    heap: &mut KernelHeap,
    head: *mut ListNode,
    payload: *mut (),
) -> *mut ListNode {
    let fresh = alloc_node(heap, payload);
    (*fresh).next = head;
    (*head).prev = fresh;
    fresh
}

/// Append `payload` at the back of a linear list (just before the dummy
/// tail) and return the head.
///
/// # Safety
/// `head` must be the head of a live linear list; the caller must hold
/// the interrupt mask.
pub unsafe fn push_back(
    heap: &mut KernelHeap,
    head: *mut ListNode,
    payload: *mut (),
) -> *mut ListNode {
    if (*head).next.is_null() {
        return insert_after(heap, head, payload);
    }
    let mut cur = head;
    while !(*(*cur).next).next.is_null() {
        cur = (*cur).next;
    }
    // `cur` is the last real node; splice in front of the dummy.
    let fresh = alloc_node(heap, payload);
    (*fresh).next = (*cur).next;
    (*fresh).prev = cur;
    (*(*fresh).next).prev = fresh;
    (*cur).next = fresh;
    head
}

/// Unlink and free `node`, returning its successor.
///
/// Returns null when the deletion removed the whole list: the dummy of an
/// empty linear list, or the lone node of a singleton circular list.
///
/// # Safety
/// `node` must be a live node of an initialized list; the caller must
/// hold the interrupt mask.
pub unsafe fn remove(heap: &mut KernelHeap, node: *mut ListNode) -> *mut ListNode {
    if node.is_null() {
        return core::ptr::null_mut();
    }
    if (*node).next.is_null() || (*node).next == node {
        heap.free(node as *mut u8);
        return core::ptr::null_mut();
    }
    if (*node).prev.is_null() {
        (*(*node).next).prev = core::ptr::null_mut();
    } else {
        (*(*node).prev).next = (*node).next;
        (*(*node).next).prev = (*node).prev;
    }
    let successor = (*node).next;
    heap.free(node as *mut u8);
    successor
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn heap_with(buf: &mut [u8]) -> KernelHeap {
        let mut heap = KernelHeap::uninit();
        unsafe { heap.init(buf.as_mut_ptr(), buf.len()) };
        heap
    }

    fn pl(n: usize) -> *mut () {
        n as *mut ()
    }

    /// Collect payloads from head to the dummy tail.
    unsafe fn linear_payloads(head: *mut ListNode) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cur = head;
        while !(*cur).next.is_null() {
            out.push((*cur).payload as usize);
            cur = (*cur).next;
        }
        out
    }

    #[test]
    fn linear_push_front_orders_lifo() {
        let mut buf = [0u8; 4096];
        let heap = &mut heap_with(&mut buf);
        unsafe {
            let mut head = new_linear(heap);
            for n in 1..=3 {
                head = push_front(heap, head, pl(n));
            }
            assert_eq!(linear_payloads(head), vec![3, 2, 1]);
        }
    }

    #[test]
    fn linear_push_back_orders_fifo() {
        let mut buf = [0u8; 4096];
        let heap = &mut heap_with(&mut buf);
        unsafe {
            let mut head = new_linear(heap);
            for n in 1..=3 {
                head = push_back(heap, head, pl(n));
            }
            assert_eq!(linear_payloads(head), vec![1, 2, 3]);
        }
    }

    #[test]
    fn insert_after_on_empty_list_becomes_head() {
        let mut buf = [0u8; 4096];
        let heap = &mut heap_with(&mut buf);
        unsafe {
            let dummy = new_linear(heap);
            let head = insert_after(heap, dummy, pl(7));
            assert_eq!(linear_payloads(head), vec![7]);
            assert_eq!((*head).next, dummy);
            assert_eq!((*dummy).prev, head);
        }
    }

    #[test]
    fn remove_returns_successor_and_relinks() {
        let mut buf = [0u8; 4096];
        let heap = &mut heap_with(&mut buf);
        unsafe {
            let mut head = new_linear(heap);
            for n in [3usize, 2, 1] {
                head = push_front(heap, head, pl(n));
            }
            // 1, 2, 3: drop the middle node.
            let middle = (*head).next;
            let successor = remove(heap, middle);
            assert_eq!((*successor).payload as usize, 3);
            assert_eq!(linear_payloads(head), vec![1, 3]);
            assert_eq!((*successor).prev, head);
        }
    }

    #[test]
    fn remove_head_hands_list_to_successor() {
        let mut buf = [0u8; 4096];
        let heap = &mut heap_with(&mut buf);
        unsafe {
            let mut head = new_linear(heap);
            head = push_front(heap, head, pl(2));
            head = push_front(heap, head, pl(1));
            let new_head = remove(heap, head);
            assert_eq!(linear_payloads(new_head), vec![2]);
            assert!((*new_head).prev.is_null());
        }
    }

    #[test]
    fn circular_singleton_is_self_linked() {
        let mut buf = [0u8; 4096];
        let heap = &mut heap_with(&mut buf);
        unsafe {
            let node = new_circular(heap, pl(9));
            assert_eq!((*node).next, node);
            assert_eq!((*node).prev, node);
            assert!(remove(heap, node).is_null());
        }
    }

    #[test]
    fn circular_insert_after_keeps_cycle() {
        let mut buf = [0u8; 4096];
        let heap = &mut heap_with(&mut buf);
        unsafe {
            let a = new_circular(heap, pl(1));
            insert_after(heap, a, pl(3));
            insert_after(heap, a, pl(2));
            // Walk the cycle once from `a`.
            let mut seen = Vec::new();
            let mut cur = a;
            loop {
                seen.push((*cur).payload as usize);
                cur = (*cur).next;
                if cur == a {
                    break;
                }
            }
            assert_eq!(seen, vec![1, 2, 3]);
            // And backwards.
            let mut back = Vec::new();
            let mut cur = a;
            loop {
                back.push((*cur).payload as usize);
                cur = (*cur).prev;
                if cur == a {
                    break;
                }
            }
            assert_eq!(back, vec![1, 3, 2]);
        }
    }

    #[test]
    fn empty_linear_dummy_removal_yields_null() {
        let mut buf = [0u8; 4096];
        let heap = &mut heap_with(&mut buf);
        unsafe {
            let dummy = new_linear(heap);
            assert!(remove(heap, dummy).is_null());
        }
    }
}
