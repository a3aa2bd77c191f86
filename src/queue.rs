//! Shortest-job-first blocking priority queue.
//!
//! A binary heap under a `parking_lot::Mutex` + `Condvar` pair, ordered
//! ascending by `cost` with FIFO tiebreak at equal cost. `push` never
//! blocks; `pop` blocks until an item is available.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::{Condvar, Mutex};

use crate::wire::Request;

/// What a popped queue item asks a worker to do.
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// Serve this request.
    Dispatch(Request),
    /// Stop: one of these is pushed per worker during an orderly shutdown.
    Shutdown,
}

/// A queued unit of work together with its scheduling cost (file size in
/// bytes for a dispatch; zero for control commands, shutdown, or when the
/// size could not be determined).
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// The work to perform once popped.
    pub item: WorkItem,
    /// Scheduling weight; smaller pops first.
    pub cost: u64,
}

/// Heap entry wrapping a [`QueueItem`] with an insertion sequence number so
/// equal-cost items preserve FIFO order. `BinaryHeap` is a max-heap; `Ord`
/// is implemented reversed on `(cost, seq)` below so the heap's "greatest"
/// element is the smallest-cost, earliest-inserted item.
struct HeapEntry {
    cost: u64,
    seq: u64,
    item: QueueItem,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap pops the maximum, and we want the minimum
        // (cost, seq) pair to come out first.
        (other.cost, other.seq).cmp(&(self.cost, self.seq))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    heap: BinaryHeap<HeapEntry>,
}

/// Blocking multi-producer/multi-consumer priority queue.
pub struct PriorityQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    next_seq: AtomicU64,
}

impl PriorityQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        PriorityQueue {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
            }),
            not_empty: Condvar::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Insert an item, preserving ascending-cost order with FIFO tiebreak.
    /// Never blocks; wakes one blocked consumer.
    pub fn push(&self, item: QueueItem) {
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::SeqCst);
        let mut inner = self.inner.lock();
        inner.heap.push(HeapEntry {
            cost: item.cost,
            seq,
            item,
        });
        self.not_empty.notify_one();
    }

    /// Block until an item is available, then return the one with the
    /// smallest cost (FIFO among equal costs). Never returns spuriously.
    pub fn pop(&self) -> QueueItem {
        let mut inner = self.inner.lock();
        loop {
            if let Some(entry) = inner.heap.pop() {
                return entry.item;
            }
            self.not_empty.wait(&mut inner);
        }
    }

    /// Current number of queued items, for observation only.
    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    /// Whether the queue currently has no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}
