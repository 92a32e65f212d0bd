//! Interrupt-safe edge event queue.
//!
//! The PWM pin ISR produces `(level, timestamp)` pairs; the control loop
//! drains them into the [`PulseAccumulator`](super::pulse::PulseAccumulator)
//! before computing a concentration. Only the loop ever touches the pulse
//! history, so no lock is needed around it.
//!
//! ```text
//! ┌─────────────┐   push    ┌──────────────┐   drain   ┌──────────────┐
//! │ GPIO ISR    │──────────▶│  EdgeQueue   │──────────▶│  Main Loop   │
//! │ (producer)  │           │  (lock-free) │           │  (consumer)  │
//! └─────────────┘           └──────────────┘           └──────────────┘
//! ```
//!
//! Single producer, single consumer. Each slot is one `AtomicU64` holding
//! the level in bit 63 and the millisecond timestamp in the low 63 bits,
//! so no `unsafe` is needed to share the buffer with interrupt context.

use core::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crate::app::ports::EdgeHandler;

/// Ring size. One slot stays empty to tell "full" from "empty".
pub const EDGE_QUEUE_CAP: usize = 256;

const LEVEL_BIT: u64 = 1 << 63;

/// Queue fed by the PWM pin ISR in the firmware binary.
pub static PWM_EDGES: EdgeQueue = EdgeQueue::new();

/// One pin transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub is_high: bool,
    pub at_ms: u64,
}

impl EdgeEvent {
    const fn pack(self) -> u64 {
        let ts = self.at_ms & !LEVEL_BIT;
        if self.is_high { ts | LEVEL_BIT } else { ts }
    }

    const fn unpack(raw: u64) -> Self {
        Self {
            is_high: raw & LEVEL_BIT != 0,
            at_ms: raw & !LEVEL_BIT,
        }
    }
}

pub struct EdgeQueue {
    slots: [AtomicU64; EDGE_QUEUE_CAP],
    head: AtomicUsize,
    tail: AtomicUsize,
    dropped: AtomicU32,
}

impl Default for EdgeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeQueue {
    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicU64::new(0) }; EDGE_QUEUE_CAP],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Push an edge. Safe to call from ISR context (lock-free).
    /// Returns `false` and counts a drop if the queue is full.
    pub fn push(&self, event: EdgeEvent) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let next_head = (head + 1) % EDGE_QUEUE_CAP;

        if next_head == tail {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.slots[head].store(event.pack(), Ordering::Relaxed);
        self.head.store(next_head, Ordering::Release);
        true
    }

    /// Pop the oldest edge. Consumer side only.
    pub fn pop(&self) -> Option<EdgeEvent> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        if tail == head {
            return None;
        }

        let raw = self.slots[tail].load(Ordering::Relaxed);
        self.tail.store((tail + 1) % EDGE_QUEUE_CAP, Ordering::Release);
        Some(EdgeEvent::unpack(raw))
    }

    /// Drain all pending edges in FIFO order. Returns how many were handled.
    pub fn drain(&self, mut handler: impl FnMut(EdgeEvent)) -> usize {
        let mut n = 0;
        while let Some(event) = self.pop() {
            handler(event);
            n += 1;
        }
        n
    }

    /// Number of pending edges.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        (head + EDGE_QUEUE_CAP - tail) % EDGE_QUEUE_CAP
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Edges lost to a full queue since the last call.
    pub fn take_dropped(&self) -> u32 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

impl EdgeHandler for EdgeQueue {
    fn on_edge(&self, is_high: bool, at_ms: u64) {
        self.push(EdgeEvent { is_high, at_ms });
    }
}
