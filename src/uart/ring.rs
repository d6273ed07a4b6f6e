// Licensed under the Apache-2.0 license

//! Lock-free single-producer/single-consumer circular buffer.
//!
//! One concurrency domain writes `head` (the producer), the other writes
//! `tail` (the consumer); each index has exactly one writer and is only
//! read by the opposite side. Plain atomic load/store with
//! acquire/release ordering is therefore sufficient - no mutex, which
//! keeps both sides callable from a hardware interrupt handler.
//!
//! One slot is sacrificed to distinguish empty (`head == tail`) from full
//! (`(head + 1) % N == tail`) without extra state, so a buffer of size
//! `N` holds `N - 1` bytes. Slot storage itself needs no synchronization:
//! a slot is written by exactly one domain before the index hand-off
//! makes it visible to the other.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

pub struct RingBuffer<const N: usize> {
    head: AtomicUsize,
    tail: AtomicUsize,
    buf: UnsafeCell<[u8; N]>,
}

// Safety: head is written only by the producer, tail only by the
// consumer, and each slot is published through a release store of the
// owning index before the other side may read it.
unsafe impl<const N: usize> Sync for RingBuffer<N> {}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            buf: UnsafeCell::new([0; N]),
        }
    }

    /// Usable capacity; one slot is reserved for the empty/full
    /// distinction.
    #[must_use]
    pub const fn capacity() -> usize {
        N - 1
    }

    /// Number of bytes enqueued and not yet dequeued.
    #[must_use]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (N + head - tail) % N
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        (head + 1) % N == self.tail.load(Ordering::Acquire)
    }

    /// Append one byte. Producer side only.
    ///
    /// Returns false and leaves the buffer untouched when full; a burst
    /// faster than the consumer drains must never corrupt adjacent slots.
    pub fn push(&self, byte: u8) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let next = (head + 1) % N;
        if next == self.tail.load(Ordering::Acquire) {
            return false;
        }
        // Safety: head is in [0, N) and this slot is invisible to the
        // consumer until the store below publishes it.
        unsafe {
            *(*self.buf.get()).as_mut_ptr().add(head) = byte;
        }
        self.head.store(next, Ordering::Release);
        true
    }

    /// Remove the oldest byte. Consumer side only.
    pub fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        // Safety: tail is in [0, N) and the producer published this slot
        // before advancing head past it.
        let byte = unsafe { *(*self.buf.get()).as_ptr().add(tail) };
        self.tail.store((tail + 1) % N, Ordering::Release);
        Some(byte)
    }

    /// Discard everything buffered. Consumer side only.
    pub fn clear(&self) {
        self.tail
            .store(self.head.load(Ordering::Acquire), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_empty() {
        let ring = RingBuffer::<8>::new();
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn fifo_order_through_wraparound() {
        let ring = RingBuffer::<4>::new();
        for round in 0..10u8 {
            assert!(ring.push(round));
            assert!(ring.push(round.wrapping_add(1)));
            assert_eq!(ring.pop(), Some(round));
            assert_eq!(ring.pop(), Some(round.wrapping_add(1)));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn full_buffer_rejects_push_without_corruption() {
        let ring = RingBuffer::<4>::new();
        assert!(ring.push(1));
        assert!(ring.push(2));
        assert!(ring.push(3));
        assert!(ring.is_full());
        assert_eq!(ring.len(), RingBuffer::<4>::capacity());

        assert!(!ring.push(4));
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.pop(), Some(1));
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.pop(), Some(3));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn len_tracks_interleaved_operations() {
        let ring = RingBuffer::<8>::new();
        let mut enqueued = 0usize;
        let mut dequeued = 0usize;
        for step in 0..100usize {
            if step % 3 != 2 {
                if ring.push(step as u8) {
                    enqueued += 1;
                }
            } else if ring.pop().is_some() {
                dequeued += 1;
            }
            assert_eq!(ring.len(), enqueued - dequeued);
            assert!(ring.len() <= RingBuffer::<8>::capacity());
        }
    }

    #[test]
    fn clear_discards_pending_bytes() {
        let ring = RingBuffer::<8>::new();
        ring.push(1);
        ring.push(2);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn concurrent_producer_consumer_preserves_stream() {
        let ring = Arc::new(RingBuffer::<8>::new());
        let producer_ring = Arc::clone(&ring);

        let producer = std::thread::spawn(move || {
            for value in 0..=255u8 {
                while !producer_ring.push(value) {
                    std::thread::yield_now();
                }
            }
        });

        let mut received = Vec::new();
        while received.len() < 256 {
            match ring.pop() {
                Some(byte) => received.push(byte),
                None => std::thread::yield_now(),
            }
        }
        producer.join().unwrap();

        let expected: Vec<u8> = (0..=255u8).collect();
        assert_eq!(received, expected);
    }
}
