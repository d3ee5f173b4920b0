//! Cooperative thread contexts.
//!
//! A [`ThreadContext`] is the bookkeeping for one cooperatively scheduled
//! execution context: its lifecycle status, the application it is running,
//! its timer list and, while unloading, the deadline after which the
//! supervisor may force-terminate it.
//!
//! The status is only ever written by code running inside the context. Other
//! contexts may read it, and the supervisor reads the shutdown deadline.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::sync::{Arc, Mutex, MutexGuard};
use crate::time::Tick;
use crate::timer::{Expiry, Fired, TimerCallback, TimerId, TimerList};

/// Which cooperative context a piece of state belongs to.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum ThreadKind {
    /// The foreground application.
    MainApp,
    /// The overlay manager.
    Overlay,
}

impl fmt::Display for ThreadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MainApp => f.write_str("main-app"),
            Self::Overlay => f.write_str("overlay"),
        }
    }
}

/// Lifecycle of a context.
///
/// `Loading -> Loaded -> Runloop -> Unloading -> Terminated`
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Loading,
    Loaded,
    Runloop,
    Unloading,
    Terminated,
}

pub struct ThreadContext {
    kind: ThreadKind,
    status: Mutex<ThreadStatus>,
    app: Mutex<Option<Arc<dyn App>>>,
    timers: Mutex<TimerList>,
    shutdown_at: Mutex<Option<Tick>>,
}

impl ThreadContext {
    pub fn new(kind: ThreadKind) -> Self {
        Self {
            kind,
            status: Mutex::new(ThreadStatus::Loading),
            app: Mutex::new(None),
            timers: Mutex::new(TimerList::new(kind)),
            shutdown_at: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> ThreadKind {
        self.kind
    }

    pub fn status(&self) -> ThreadStatus {
        *self.status.lock()
    }

    pub(crate) fn set_status(&self, status: ThreadStatus) {
        let mut current = self.status.lock();
        if *current != status {
            log::trace!(target: "runtime", "{} context {:?} -> {:?}", self.kind, *current, status);
            *current = status;
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.status() == ThreadStatus::Unloading
    }

    /// Application currently occupying this context.
    pub fn app(&self) -> Option<Arc<dyn App>> {
        self.app.lock().clone()
    }

    /// Prepares the context for a new occupant.
    pub(crate) fn reset_for(&self, app: Option<Arc<dyn App>>) {
        *self.app.lock() = app;
        self.timers.lock().clear();
        *self.shutdown_at.lock() = None;
        self.set_status(ThreadStatus::Loading);
    }

    /// Tick after which the supervisor may force-terminate this context.
    pub fn shutdown_deadline(&self) -> Option<Tick> {
        *self.shutdown_at.lock()
    }

    pub(crate) fn set_shutdown_deadline(&self, deadline: Tick) {
        *self.shutdown_at.lock() = Some(deadline);
    }

    pub(crate) fn timers(&self) -> MutexGuard<'_, TimerList> {
        self.timers.lock()
    }

    pub(crate) fn add_timer(&self, expires_at: Tick, callback: TimerCallback) -> TimerId {
        self.timers.lock().insert(expires_at, callback)
    }

    pub(crate) fn remove_timer(&self, id: TimerId) {
        drop(self.timers.lock().remove(id));
    }

    pub fn next_expiry(&self, now: Tick) -> Expiry {
        self.timers.lock().next_expiry(now)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.lock().len()
    }

    /// Detaches the head timer and fires it with the list unlocked, so the
    /// callback may add or remove timers on this context.
    pub fn pop_and_fire(&self) -> Option<Fired> {
        let head = self.timers.lock().pop_head()?;
        Some(head.fire(self.is_shutting_down()))
    }
}

impl fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadContext")
            .field("kind", &self.kind)
            .field("status", &self.status())
            .field("timers", &*self.timers.lock())
            .field("shutdown_at", &self.shutdown_deadline())
            .finish()
    }
}
