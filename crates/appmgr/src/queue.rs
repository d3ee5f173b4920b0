//! Bounded FIFO message queues, one per cooperative context.
//!
//! A queue is the only legal way to hand data across a context boundary. The
//! storage is a fixed-capacity `heapless::Deque`, so the memory a queue can
//! consume is decided at compile time.

use core::time::Duration;
use std::time::Instant;

use heapless::Deque;
use parking_lot::Condvar;

use crate::error::QueueError;
use crate::sync::Mutex;
use crate::time::Timeout;

/// Depth of the Main-App queue.
pub const APP_QUEUE_DEPTH: usize = 5;
/// Depth of the overlay queue. Overlay traffic is low-volume and
/// back-pressure is acceptable.
pub const OVERLAY_QUEUE_DEPTH: usize = 1;
/// Depth of the supervisor notification queue.
pub const SUPERVISOR_QUEUE_DEPTH: usize = 4;

pub struct MessageQueue<T, const N: usize> {
    slots: Mutex<Deque<T, N>>,
    not_empty: Condvar,
    not_full: Condvar,
    tick_period: Duration,
}

impl<T, const N: usize> MessageQueue<T, N> {
    /// Creates an empty queue whose tick timeouts are scaled by `tick_period`.
    pub fn new(tick_period: Duration) -> Self {
        Self {
            slots: Mutex::new(Deque::new()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            tick_period,
        }
    }

    /// Appends a message without blocking.
    pub fn try_send(&self, message: T) -> Result<(), QueueError> {
        self.send(message, Timeout::Immediate)
    }

    /// Appends a message, waiting up to `timeout` for a free slot.
    ///
    /// On failure the message is dropped.
    pub fn send(&self, message: T, timeout: Timeout) -> Result<(), QueueError> {
        let deadline = self.deadline(timeout);
        let mut slots = self.slots.lock();

        while slots.is_full() {
            match deadline {
                Some(None) => return Err(QueueError::Full),
                Some(Some(at)) => {
                    if self.not_full.wait_until(&mut slots, at).timed_out() && slots.is_full() {
                        return Err(QueueError::Full);
                    }
                }
                None => self.not_full.wait(&mut slots),
            }
        }

        if slots.push_back(message).is_err() {
            unreachable!("queue has a free slot");
        }
        self.not_empty.notify_one();
        Ok(())
    }

    /// Takes the oldest message, waiting up to `timeout` for one to arrive.
    pub fn recv(&self, timeout: Timeout) -> Result<T, QueueError> {
        let deadline = self.deadline(timeout);
        let mut slots = self.slots.lock();

        loop {
            if let Some(message) = slots.pop_front() {
                self.not_full.notify_one();
                return Ok(message);
            }
            match deadline {
                Some(None) => return Err(QueueError::Empty),
                Some(Some(at)) => {
                    if self.not_empty.wait_until(&mut slots, at).timed_out() && slots.is_empty() {
                        return Err(QueueError::TimedOut);
                    }
                }
                None => self.not_empty.wait(&mut slots),
            }
        }
    }

    /// Drops every queued message and returns how many there were.
    pub fn clear(&self) -> usize {
        let mut slots = self.slots.lock();
        let dropped = slots.len();
        slots.clear();
        self.not_full.notify_all();
        dropped
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.lock().is_full()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// `None`: wait forever. `Some(None)`: do not wait. `Some(Some(t))`: wait
    /// until `t`.
    fn deadline(&self, timeout: Timeout) -> Option<Option<Instant>> {
        match timeout.to_duration(self.tick_period) {
            None => None,
            Some(bound) if bound.is_zero() => Some(None),
            Some(bound) => Some(Some(Instant::now() + bound)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Arc;
    use std::thread;

    fn queue<const N: usize>() -> MessageQueue<u32, N> {
        MessageQueue::new(Duration::from_millis(1))
    }

    #[test]
    fn queue_is_fifo() {
        let q = queue::<4>();
        q.try_send(1).unwrap();
        q.try_send(2).unwrap();
        q.try_send(3).unwrap();

        assert_eq!(q.recv(Timeout::Immediate), Ok(1));
        assert_eq!(q.recv(Timeout::Immediate), Ok(2));
        assert_eq!(q.recv(Timeout::Immediate), Ok(3));
        assert_eq!(q.recv(Timeout::Immediate), Err(QueueError::Empty));
    }

    #[test]
    fn full_queue_rejects_send() {
        let q = queue::<2>();
        q.try_send(1).unwrap();
        q.try_send(2).unwrap();

        assert!(q.is_full());
        assert_eq!(q.try_send(3), Err(QueueError::Full));
        assert_eq!(q.send(3, Timeout::Ticks(5)), Err(QueueError::Full));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn recv_times_out_when_nothing_arrives() {
        let q = queue::<1>();
        assert_eq!(q.recv(Timeout::Ticks(5)), Err(QueueError::TimedOut));
    }

    #[test]
    fn clear_drops_stale_messages() {
        let q = queue::<5>();
        q.try_send(7).unwrap();
        q.try_send(8).unwrap();

        assert_eq!(q.clear(), 2);
        assert!(q.is_empty());
        assert_eq!(q.capacity(), 5);
    }

    #[test]
    fn blocked_sender_resumes_when_slot_frees() {
        let q = Arc::new(queue::<1>());
        q.try_send(1).unwrap();

        let sender = Arc::clone(&q);
        let handle = thread::spawn(move || sender.send(2, Timeout::Forever));

        assert_eq!(q.recv(Timeout::Forever), Ok(1));
        handle.join().unwrap().unwrap();
        assert_eq!(q.recv(Timeout::Ticks(1000)), Ok(2));
    }
}
