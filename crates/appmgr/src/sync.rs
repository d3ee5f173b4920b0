//! Platform abstraction for synchronization primitives.
//!
//! Provides the `Mutex` used for all cross-context state and the binary
//! semaphore used as the overlay draw rendezvous. Both are backed by
//! `parking_lot`, which never poisons: a panic inside a cooperative context is
//! a fatal contract violation, not a state to recover from.

use core::time::Duration;

pub use std::sync::{Arc, Weak};

pub type MutexGuard<'a, T> = parking_lot::MutexGuard<'a, T>;

/// Platform-agnostic mutex wrapper.
pub struct Mutex<T> {
    inner: parking_lot::Mutex<T>,
}

impl<T> Mutex<T> {
    /// Creates a new mutex protecting the given value.
    pub const fn new(value: T) -> Self {
        Self {
            inner: parking_lot::const_mutex(value),
        }
    }

    /// Acquires the mutex, blocking until it becomes available.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }

    /// Acquires the mutex, giving up after `timeout`.
    ///
    /// A zero timeout makes a single attempt.
    pub fn try_lock_for(&self, timeout: Duration) -> Option<MutexGuard<'_, T>> {
        if timeout.is_zero() {
            self.inner.try_lock()
        } else {
            self.inner.try_lock_for(timeout)
        }
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Binary semaphore: a single-slot signal one context blocks on until another
/// announces that a unit of work is complete.
///
/// Signalling an already signalled semaphore is a no-op, so a late `signal`
/// can release at most one future `wait`.
pub struct BinarySemaphore {
    given: parking_lot::Mutex<bool>,
    cond: parking_lot::Condvar,
}

impl BinarySemaphore {
    /// Creates a semaphore in the taken (unsignalled) state.
    pub const fn new() -> Self {
        Self {
            given: parking_lot::const_mutex(false),
            cond: parking_lot::Condvar::new(),
        }
    }

    /// Gives the semaphore and wakes one waiter.
    pub fn signal(&self) {
        let mut given = self.given.lock();
        *given = true;
        self.cond.notify_one();
    }

    /// Takes the semaphore, blocking with no timeout until it is given.
    pub fn wait(&self) {
        let mut given = self.given.lock();
        while !*given {
            self.cond.wait(&mut given);
        }
        *given = false;
    }

    /// Takes the semaphore, giving up after `timeout`.
    ///
    /// Returns `true` if the semaphore was taken.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut given = self.given.lock();
        if !*given {
            let _ = self
                .cond
                .wait_while_for(&mut given, |given| !*given, timeout);
        }
        let taken = *given;
        *given = false;
        taken
    }

    /// Returns true if the semaphore is currently given.
    pub fn is_signalled(&self) -> bool {
        *self.given.lock()
    }
}

impl Default for BinarySemaphore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn semaphore_signal_then_wait() {
        let sem = BinarySemaphore::new();
        assert!(!sem.is_signalled());

        sem.signal();
        assert!(sem.is_signalled());

        sem.wait();
        assert!(!sem.is_signalled());
    }

    #[test]
    fn binary_semaphore_saturates() {
        let sem = BinarySemaphore::new();
        sem.signal();
        sem.signal();

        assert!(sem.wait_timeout(Duration::from_millis(1)));
        assert!(!sem.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn wait_blocks_until_other_thread_signals() {
        let sem = Arc::new(BinarySemaphore::new());
        let giver = Arc::clone(&sem);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            giver.signal();
        });

        sem.wait();
        handle.join().unwrap();
    }

    #[test]
    fn try_lock_for_zero_makes_single_attempt() {
        let mutex = Mutex::new(5u8);
        let guard = mutex.lock();
        assert!(mutex.try_lock_for(Duration::ZERO).is_none());
        drop(guard);
        assert_eq!(*mutex.try_lock_for(Duration::ZERO).unwrap(), 5);
    }
}
