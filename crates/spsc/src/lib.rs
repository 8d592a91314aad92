//! Bounded wait-free single-producer/single-consumer ring for Bookd
//!
//! [`ring`] splits a fixed-capacity queue into a [`Producer`] and a
//! [`Consumer`] handle. Each handle may live on its own thread; neither is
//! cloneable, so the single-producer/single-consumer contract is enforced by
//! the type system rather than by convention.
//!
//! # Design
//!
//! Two monotonically increasing 64-bit indices describe the queue: `size =
//! push_index - pop_index`, and a value's slot is `index % capacity`. The
//! producer publishes a slot *before* advancing `push_index` (release store);
//! the consumer reads `push_index` with acquire before touching the slot, and
//! symmetrically for pop. On top of that, each handle keeps a plain
//! (non-atomic) cache of the opposite index and only re-reads the remote
//! atomic when the cache says the queue is full (producer) or empty
//! (consumer). In the common case a push or pop touches no foreign cache
//! line at all.
//!
//! Both operations return immediately: `try_push` hands the value back when
//! the ring is full, `try_pop` returns `None` when it is empty. There is no
//! blocking, no allocation after construction, and no cancellation - values
//! pushed are either popped or dropped with the ring itself.
//!
//! # Example
//!
//! ```
//! let (mut tx, mut rx) = spsc::ring::<u32>(4);
//!
//! assert!(tx.try_push(7).is_ok());
//! assert_eq!(rx.try_pop(), Some(7));
//! assert_eq!(rx.try_pop(), None);
//! ```

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// Shared ring state. The two indices live on separate cache lines so the
/// producer and consumer never false-share.
struct Inner<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    capacity: u64,
    /// Total values ever pushed; written only by the producer
    push_index: CachePadded<AtomicU64>,
    /// Total values ever popped; written only by the consumer
    pop_index: CachePadded<AtomicU64>,
}

// The index protocol guarantees a slot is accessed by exactly one side at a
// time: the producer only writes slots in [push, pop + capacity), the
// consumer only reads slots in [pop, push).
unsafe impl<T: Send> Sync for Inner<T> {}
unsafe impl<T: Send> Send for Inner<T> {}

impl<T> Inner<T> {
    fn slot(&self, index: u64) -> &UnsafeCell<MaybeUninit<T>> {
        &self.buffer[(index % self.capacity) as usize]
    }

    fn len(&self) -> u64 {
        let pop = self.pop_index.load(Ordering::Relaxed);
        let push = self.push_index.load(Ordering::Relaxed);
        push.saturating_sub(pop)
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        // Both handles are gone, so plain loads are fine here.
        let pop = self.pop_index.load(Ordering::Relaxed);
        let push = self.push_index.load(Ordering::Relaxed);
        for index in pop..push {
            unsafe {
                (*self.slot(index).get()).assume_init_drop();
            }
        }
    }
}

/// Write end of the ring. Owned by exactly one thread.
pub struct Producer<T> {
    inner: Arc<Inner<T>>,
    /// Last observed pop index; refreshed only when the ring looks full
    pop_cache: u64,
}

/// Read end of the ring. Owned by exactly one thread.
pub struct Consumer<T> {
    inner: Arc<Inner<T>>,
    /// Last observed push index; refreshed only when the ring looks empty
    push_cache: u64,
}

/// Create a ring with room for `capacity` values.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn ring<T: Send>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(capacity > 0, "ring capacity must be non-zero");

    let buffer: Box<[UnsafeCell<MaybeUninit<T>>]> = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect();

    let inner = Arc::new(Inner {
        buffer,
        capacity: capacity as u64,
        push_index: CachePadded::new(AtomicU64::new(0)),
        pop_index: CachePadded::new(AtomicU64::new(0)),
    });

    (
        Producer {
            inner: Arc::clone(&inner),
            pop_cache: 0,
        },
        Consumer {
            inner,
            push_cache: 0,
        },
    )
}

impl<T> Producer<T> {
    /// Push a value, or hand it back if the ring is full.
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        // Only the producer writes push_index, so a relaxed load is exact.
        let push = self.inner.push_index.load(Ordering::Relaxed);

        if push - self.pop_cache == self.inner.capacity {
            self.pop_cache = self.inner.pop_index.load(Ordering::Acquire);
            if push - self.pop_cache == self.inner.capacity {
                return Err(value);
            }
        }

        unsafe {
            (*self.inner.slot(push).get()).write(value);
        }
        self.inner.push_index.store(push + 1, Ordering::Release);
        Ok(())
    }

    /// Number of values currently queued
    pub fn len(&self) -> usize {
        self.inner.len() as usize
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the next push would fail
    pub fn is_full(&self) -> bool {
        self.inner.len() == self.inner.capacity
    }

    /// Fixed capacity chosen at construction
    pub fn capacity(&self) -> usize {
        self.inner.capacity as usize
    }
}

impl<T> Consumer<T> {
    /// Pop the oldest value, or `None` if the ring is empty.
    pub fn try_pop(&mut self) -> Option<T> {
        // Only the consumer writes pop_index, so a relaxed load is exact.
        let pop = self.inner.pop_index.load(Ordering::Relaxed);

        if self.push_cache == pop {
            self.push_cache = self.inner.push_index.load(Ordering::Acquire);
            if self.push_cache == pop {
                return None;
            }
        }

        let value = unsafe { (*self.inner.slot(pop).get()).assume_init_read() };
        self.inner.pop_index.store(pop + 1, Ordering::Release);
        Some(value)
    }

    /// Number of values currently queued
    pub fn len(&self) -> usize {
        self.inner.len() as usize
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the ring is at capacity
    pub fn is_full(&self) -> bool {
        self.inner.len() == self.inner.capacity
    }

    /// Fixed capacity chosen at construction
    pub fn capacity(&self) -> usize {
        self.inner.capacity as usize
    }
}
