//! Sharing one countdown between the Main-App and overlay timer lists.
//!
//! Each list knows when its own head is due; the multiplexer programs the
//! single hardware countdown for whichever context needs waking first and
//! remembers who that was so the expiry can be routed back.

use log::{debug, trace};

use crate::sync::{Arc, Mutex};
use crate::thread::ThreadKind;
use crate::time::Countdown;
use crate::timer::Expiry;

/// What a recompute did to the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Neither context has a pending timer.
    Idle,
    /// The countdown was (re)programmed for `thread`.
    Armed { thread: ThreadKind, ticks: u64 },
    /// A sooner deadline was already programmed and left alone.
    Unchanged { thread: ThreadKind },
}

/// Picks the context whose head expires first.
///
/// Ties go to the Main-App context. Deltas of zero are clamped to one tick,
/// the shortest the countdown can be programmed for.
pub fn select(main: Expiry, overlay: Expiry) -> Option<(ThreadKind, u64)> {
    let winner = match (main.ticks(), overlay.ticks()) {
        (None, None) => return None,
        (Some(m), None) => (ThreadKind::MainApp, m),
        (None, Some(o)) => (ThreadKind::Overlay, o),
        (Some(m), Some(o)) if o < m => (ThreadKind::Overlay, o),
        (Some(m), Some(_)) => (ThreadKind::MainApp, m),
    };
    Some((winner.0, winner.1.max(1)))
}

pub struct TimerMultiplexer {
    countdown: Arc<dyn Countdown>,
    // Held across a whole recompute so concurrent callers cannot interleave
    // the inspect-then-program sequence.
    route: Mutex<ThreadKind>,
}

impl TimerMultiplexer {
    pub fn new(countdown: Arc<dyn Countdown>) -> Self {
        Self {
            countdown,
            route: Mutex::new(ThreadKind::MainApp),
        }
    }

    /// Context the next expiry will be delivered to.
    pub fn route(&self) -> ThreadKind {
        *self.route.lock()
    }

    pub fn countdown(&self) -> &dyn Countdown {
        &*self.countdown
    }

    /// Reprograms the countdown from the heads of both timer lists.
    ///
    /// An armed countdown is only ever shortened; if the new winner is due
    /// later than what is programmed, both the countdown and the route are
    /// left as they are.
    pub fn recompute_schedule(&self, main: Expiry, overlay: Expiry) -> Schedule {
        let mut route = self.route.lock();

        let Some((thread, ticks)) = select(main, overlay) else {
            trace!(target: "timer", "no timers pending");
            return Schedule::Idle;
        };

        if self.countdown.is_active() && ticks >= self.countdown.remaining() {
            trace!(target: "timer", "keeping armed countdown for {}", *route);
            return Schedule::Unchanged { thread: *route };
        }

        *route = thread;
        self.countdown.start(ticks);
        debug!(target: "timer", "countdown armed for {thread} in {ticks} ticks");
        Schedule::Armed { thread, ticks }
    }

    /// Called when the countdown fires; returns the context to wake.
    ///
    /// The countdown is one-shot and already idle at this point.
    pub fn expired(&self) -> ThreadKind {
        *self.route.lock()
    }
}
