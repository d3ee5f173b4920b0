//! Per-context ordered timer list.
//!
//! Timers are owned by the list they were inserted into and addressed by a
//! [`TimerId`] handle that records which context issued it, so a timer can
//! never sit in two lists and a handle cannot silently remove someone else's
//! timer.

use alloc::collections::VecDeque;
use core::fmt;

use log::error;

use crate::thread::ThreadKind;
use crate::time::Tick;

/// Callback run when a timer expires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    owner: ThreadKind,
    seq: u32,
}

impl TimerId {
    /// Context whose timer list issued this handle.
    pub fn owner(&self) -> ThreadKind {
        self.owner
    }
}

/// A pending timer entry.
pub struct Timer {
    pub id: TimerId,
    pub expires_at: Tick,
    pub callback: Option<TimerCallback>,
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("expires_at", &self.expires_at)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Outcome of firing a detached timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fired {
    /// The callback ran.
    Invoked(TimerId),
    /// The owning context is unloading; the callback was dropped unrun.
    Discarded(TimerId),
    /// The entry had no callback and was dropped.
    Corrupt(TimerId),
}

impl Timer {
    /// Runs the callback unless the owner is shutting down or the entry has
    /// lost its callback.
    pub fn fire(self, shutting_down: bool) -> Fired {
        let Some(callback) = self.callback else {
            error!(target: "timer", "Bad callback on timer {:?}, dropping it", self.id);
            return Fired::Corrupt(self.id);
        };

        if shutting_down {
            return Fired::Discarded(self.id);
        }

        callback();
        Fired::Invoked(self.id)
    }
}

/// Time until the head of a list is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The head is already due.
    Immediate,
    /// The head is due in this many ticks.
    In(u64),
    /// The list is empty: block indefinitely.
    Never,
}

impl Expiry {
    /// Tick delta as the multiplexer sees it; `None` when nothing is pending.
    pub fn ticks(self) -> Option<u64> {
        match self {
            Self::Immediate => Some(0),
            Self::In(ticks) => Some(ticks),
            Self::Never => None,
        }
    }
}

/// Timers sorted ascending by expiry tick.
///
/// Among equal expiries the most recently inserted timer is ordered first.
pub struct TimerList {
    owner: ThreadKind,
    next_seq: u32,
    entries: VecDeque<Timer>,
}

impl TimerList {
    pub fn new(owner: ThreadKind) -> Self {
        Self {
            owner,
            next_seq: 0,
            entries: VecDeque::new(),
        }
    }

    pub fn owner(&self) -> ThreadKind {
        self.owner
    }

    /// Inserts a timer due at `expires_at` and returns its handle.
    pub fn insert(&mut self, expires_at: Tick, callback: TimerCallback) -> TimerId {
        let id = self.allocate_id();
        self.insert_timer(Timer {
            id,
            expires_at,
            callback: Some(callback),
        });
        id
    }

    /// Inserts a pre-built entry.
    ///
    /// # Panics
    ///
    /// If the entry was issued by another context's list.
    pub fn insert_timer(&mut self, timer: Timer) {
        assert_eq!(
            timer.id.owner, self.owner,
            "timer {:?} belongs to another context's list",
            timer.id
        );
        let pos = self
            .entries
            .iter()
            .position(|entry| entry.expires_at >= timer.expires_at)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, timer);
    }

    /// Allocates a handle for an entry built with [`TimerList::insert_timer`].
    pub fn allocate_id(&mut self) -> TimerId {
        let id = TimerId {
            owner: self.owner,
            seq: self.next_seq,
        };
        self.next_seq = self.next_seq.wrapping_add(1);
        id
    }

    /// Unlinks a pending timer, returning the detached entry.
    ///
    /// # Panics
    ///
    /// If the timer is not pending in this list. Callers may only remove
    /// timers they still own that have not fired yet.
    pub fn remove(&mut self, id: TimerId) -> Timer {
        match self.entries.iter().position(|entry| entry.id == id) {
            Some(pos) => self
                .entries
                .remove(pos)
                .unwrap_or_else(|| unreachable!("position {pos} is in bounds")),
            None => panic!("timer {id:?} not found in {:?} timer list", self.owner),
        }
    }

    pub fn next_expiry(&self, now: Tick) -> Expiry {
        match self.entries.front() {
            None => Expiry::Never,
            Some(head) if head.expires_at <= now => Expiry::Immediate,
            Some(head) => Expiry::In(head.expires_at.since(now)),
        }
    }

    /// Detaches the head entry without firing it.
    pub fn pop_head(&mut self) -> Option<Timer> {
        self.entries.pop_front()
    }

    /// Detaches the head entry, then fires it.
    ///
    /// The entry leaves the list before its callback runs, so a callback that
    /// inserts a new head is never mistaken for the entry still pending.
    pub fn pop_and_fire(&mut self, shutting_down: bool) -> Option<Fired> {
        self.pop_head().map(|timer| timer.fire(shutting_down))
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every pending timer without running it.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Pending expiries in firing order.
    pub fn expiries(&self) -> impl Iterator<Item = (TimerId, Tick)> + '_ {
        self.entries.iter().map(|entry| (entry.id, entry.expires_at))
    }
}

impl fmt::Debug for TimerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerList")
            .field("owner", &self.owner)
            .field("pending", &self.entries.len())
            .finish()
    }
}
