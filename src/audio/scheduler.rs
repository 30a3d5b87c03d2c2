//! Time-ordered queue of pending voices.
//!
//! Shared by the live transport, which pops voices as their time comes due,
//! and the offline renderer, which drains everything at once.

use super::voice::VoiceRequest;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Debug, Clone)]
struct Scheduled {
    fire_time: f64,
    sequence: u64,
    request: VoiceRequest,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fire_time
            .total_cmp(&other.fire_time)
            .then(self.sequence.cmp(&other.sequence))
    }
}

/// Min-priority queue of voice requests keyed by fire time.
///
/// Requests with equal fire times come out in push order.
#[derive(Debug, Clone, Default)]
pub struct VoiceQueue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    next_sequence: u64,
}

impl VoiceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `request` to fire at `fire_time` seconds.
    pub fn push(&mut self, fire_time: f64, request: VoiceRequest) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Reverse(Scheduled {
            fire_time,
            sequence,
            request,
        }));
    }

    /// Fire time of the earliest pending request.
    pub fn peek_time(&self) -> Option<f64> {
        self.heap.peek().map(|Reverse(s)| s.fire_time)
    }

    /// Removes and returns every request due at or before `now`, earliest
    /// first.
    pub fn pop_due(&mut self, now: f64) -> Vec<VoiceRequest> {
        let mut due = Vec::new();
        while self.peek_time().is_some_and(|t| t <= now) {
            if let Some(Reverse(scheduled)) = self.heap.pop() {
                due.push(scheduled.request);
            }
        }
        due
    }

    /// Removes and returns everything, earliest first.
    pub fn drain(&mut self) -> Vec<VoiceRequest> {
        let mut all = Vec::with_capacity(self.heap.len());
        while let Some(Reverse(scheduled)) = self.heap.pop() {
            all.push(scheduled.request);
        }
        all
    }

    /// Cancels every pending request.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
