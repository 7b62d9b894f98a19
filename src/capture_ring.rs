//! Lock-free single-producer/single-consumer ring moving captured PCM frames
//! from the audio callback thread to the engine tick thread.
//!
//! Two monotonic `u32` cursors (`w`, `r`) with release/acquire fencing: the
//! producer publishes a slot by storing `w` with `Release`; the consumer
//! observes readiness by loading `w` with `Acquire`. Submit drops silently
//! when the ring is full — this type must never block or allocate on the
//! hot path, so a crate-provided MPMC channel (the teacher reaches for
//! `crossbeam-channel` elsewhere) is deliberately not used here; see
//! DESIGN.md.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub const CAPTURE_RING_CAPACITY: usize = 16;
pub const MAX_CAPTURE_SAMPLES: usize = 2880;

struct Slot {
    count: u32,
    samples: [i16; MAX_CAPTURE_SAMPLES],
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            count: 0,
            samples: [0i16; MAX_CAPTURE_SAMPLES],
        }
    }
}

struct Inner {
    w: AtomicU32,
    r: AtomicU32,
    slots: Box<[Cell<Slot>]>,
}

// The ring's invariant (exactly one producer, one consumer, disjoint slot
// access enforced by the cursors) makes cross-thread sharing of `Inner` sound
// even though `Cell` alone is not `Sync`.
unsafe impl Sync for Inner {}
unsafe impl Send for Inner {}

fn slot_index(pos: u32) -> usize {
    pos as usize % CAPTURE_RING_CAPACITY
}

/// Producer endpoint. `Send` but not `Sync`: move it to the one audio
/// callback thread that owns it and never share it further.
pub struct CaptureProducer {
    inner: Arc<Inner>,
    _not_sync: PhantomData<Cell<()>>,
}

/// Consumer endpoint. `Send` but not `Sync`: owned by the single engine tick
/// thread.
pub struct CaptureConsumer {
    inner: Arc<Inner>,
    _not_sync: PhantomData<Cell<()>>,
}

pub fn channel() -> (CaptureProducer, CaptureConsumer) {
    let mut slots = Vec::with_capacity(CAPTURE_RING_CAPACITY);
    for _ in 0..CAPTURE_RING_CAPACITY {
        slots.push(Cell::new(Slot::default()));
    }
    let inner = Arc::new(Inner {
        w: AtomicU32::new(0),
        r: AtomicU32::new(0),
        slots: slots.into_boxed_slice(),
    });
    (
        CaptureProducer {
            inner: inner.clone(),
            _not_sync: PhantomData,
        },
        CaptureConsumer {
            inner,
            _not_sync: PhantomData,
        },
    )
}

impl CaptureProducer {
    /// Submits one PCM frame. Realtime-safe: never blocks, never allocates,
    /// drops the frame silently when the ring is full or the sample count
    /// exceeds the maximum frame size.
    pub fn push(&self, samples: &[i16]) -> bool {
        if samples.is_empty() || samples.len() > MAX_CAPTURE_SAMPLES {
            return false;
        }
        let w = self.inner.w.load(Ordering::Relaxed);
        let r = self.inner.r.load(Ordering::Acquire);
        if w.wrapping_sub(r) as usize >= CAPTURE_RING_CAPACITY {
            return false;
        }

        let idx = slot_index(w);
        // SAFETY: the consumer only touches slot `r % CAP`, and `w - r <
        // CAPACITY` here guarantees this slot isn't the one the consumer is
        // currently reading.
        unsafe {
            let slot = &mut *self.inner.slots[idx].as_ptr();
            slot.count = samples.len() as u32;
            slot.samples[..samples.len()].copy_from_slice(samples);
        }

        self.inner.w.store(w.wrapping_add(1), Ordering::Release);
        true
    }
}

impl CaptureConsumer {
    /// Pops one PCM frame into `out`, returning the sample count, or `None`
    /// if the ring is empty.
    pub fn pop(&self, out: &mut [i16; MAX_CAPTURE_SAMPLES]) -> Option<usize> {
        let r = self.inner.r.load(Ordering::Relaxed);
        let w = self.inner.w.load(Ordering::Acquire);
        if r == w {
            return None;
        }

        let idx = slot_index(r);
        let count = unsafe {
            let slot = &*self.inner.slots[idx].as_ptr();
            out[..slot.count as usize].copy_from_slice(&slot.samples[..slot.count as usize]);
            slot.count as usize
        };

        self.inner.r.store(r.wrapping_add(1), Ordering::Release);
        Some(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_past_capacity_and_preserves_fifo_order() {
        let (tx, rx) = channel();
        for i in 0..CAPTURE_RING_CAPACITY {
            assert!(tx.push(&[i as i16]));
        }
        // K+1th push is dropped.
        assert!(!tx.push(&[999]));

        let mut out = [0i16; MAX_CAPTURE_SAMPLES];
        for i in 0..CAPTURE_RING_CAPACITY {
            let n = rx.pop(&mut out).unwrap();
            assert_eq!(n, 1);
            assert_eq!(out[0], i as i16);
        }
        assert!(rx.pop(&mut out).is_none());
    }

    #[test]
    fn interleaved_push_pop_stays_in_order() {
        let (tx, rx) = channel();
        let mut out = [0i16; MAX_CAPTURE_SAMPLES];

        assert!(tx.push(&[1, 2, 3]));
        assert_eq!(rx.pop(&mut out).unwrap(), 3);
        assert_eq!(&out[..3], &[1, 2, 3]);

        assert!(tx.push(&[4, 5]));
        assert_eq!(rx.pop(&mut out).unwrap(), 2);
        assert_eq!(&out[..2], &[4, 5]);
    }

    #[test]
    fn rejects_oversized_frame() {
        let (tx, _rx) = channel();
        let too_big = vec![0i16; MAX_CAPTURE_SAMPLES + 1];
        assert!(!tx.push(&too_big));
    }
}
