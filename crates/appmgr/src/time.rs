//! Tick arithmetic, clocks and the shared countdown timer.
//!
//! Everything in the scheduling core measures time in [`Tick`]s. The mapping
//! from ticks to wall time is owned by the [`Clock`] and by the configured tick
//! period; the hardware countdown that wakes a context is abstracted behind
//! [`Countdown`].

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use std::thread;
use std::time::Instant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::sync::{Arc, Mutex};

/// Absolute monotonic tick count.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Self = Self(0);

    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns the tick `ticks` after this one.
    pub const fn after(self, ticks: u64) -> Self {
        Self(self.0.saturating_add(ticks))
    }

    /// Ticks from `earlier` to `self`, zero if `earlier` is later.
    pub const fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl From<u64> for Tick {
    #[inline]
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ticks", self.0)
    }
}

/// How long a blocking receive may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Poll once without blocking.
    Immediate,
    /// Block for at most this many ticks.
    Ticks(u64),
    /// Block until something arrives.
    Forever,
}

impl Timeout {
    /// Wall-clock bound for this timeout, `None` meaning unbounded.
    pub fn to_duration(self, tick_period: Duration) -> Option<Duration> {
        match self {
            Self::Immediate => Some(Duration::ZERO),
            Self::Ticks(ticks) => Some(ticks_to_duration(ticks, tick_period)),
            Self::Forever => None,
        }
    }
}

pub(crate) fn ticks_to_duration(ticks: u64, tick_period: Duration) -> Duration {
    let nanos = u64::try_from(tick_period.as_nanos()).unwrap_or(u64::MAX);
    Duration::from_nanos(nanos.saturating_mul(ticks))
}

fn duration_to_ticks_ceil(duration: Duration, tick_period: Duration) -> u64 {
    let period = tick_period.as_nanos().max(1);
    let ticks = duration.as_nanos().div_ceil(period);
    u64::try_from(ticks).unwrap_or(u64::MAX)
}

/// Source of the current tick.
pub trait Clock: Send + Sync {
    fn now(&self) -> Tick;
}

/// Clock derived from the host's monotonic time.
#[derive(Debug, Clone)]
pub struct SystemClock {
    epoch: Instant,
    tick_period: Duration,
}

impl SystemClock {
    pub fn new(tick_period: Duration) -> Self {
        assert!(!tick_period.is_zero(), "tick period must be non-zero");
        Self {
            epoch: Instant::now(),
            tick_period,
        }
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Tick {
        let elapsed = self.epoch.elapsed().as_nanos() / self.tick_period.as_nanos();
        Tick(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    ticks: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Tick) -> Self {
        Self {
            ticks: AtomicU64::new(start.0),
        }
    }

    pub fn set(&self, now: Tick) {
        self.ticks.store(now.0, Ordering::SeqCst);
    }

    pub fn advance(&self, ticks: u64) -> Tick {
        Tick(self.ticks.fetch_add(ticks, Ordering::SeqCst) + ticks)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        Tick(self.ticks.load(Ordering::SeqCst))
    }
}

/// The single shared countdown timer serviced by the multiplexer.
pub trait Countdown: Send + Sync {
    /// True while a deadline is programmed and has not yet fired.
    fn is_active(&self) -> bool;
    /// Ticks left until the programmed deadline, zero when idle.
    fn remaining(&self) -> u64;
    /// Programs (or reprograms) the countdown to fire after `ticks`.
    fn start(&self, ticks: u64);
    /// Cancels any programmed deadline.
    fn stop(&self);
}

/// Callback run on the countdown worker when the deadline passes.
pub type ExpiryHandler = Box<dyn Fn() + Send + Sync>;

struct OneShotState {
    deadline: Option<Instant>,
    alive: bool,
}

struct OneShotShared {
    state: Mutex<OneShotState>,
    cond: parking_lot::Condvar,
    tick_period: Duration,
    handler: ExpiryHandler,
}

/// Hosted [`Countdown`] backed by a worker thread.
///
/// The worker sleeps until the programmed deadline and then invokes the
/// expiry handler with no locks held. Once fired the timer is idle again until
/// the next `start`.
pub struct OneShotTimer {
    shared: Arc<OneShotShared>,
}

impl OneShotTimer {
    pub fn new(tick_period: Duration, handler: ExpiryHandler) -> std::io::Result<Self> {
        let shared = Arc::new(OneShotShared {
            state: Mutex::new(OneShotState {
                deadline: None,
                alive: true,
            }),
            cond: parking_lot::Condvar::new(),
            tick_period,
            handler,
        });

        let worker = Arc::clone(&shared);
        thread::Builder::new()
            .name("countdown".into())
            .spawn(move || countdown_worker(&worker))?;

        Ok(Self { shared })
    }
}

fn countdown_worker(shared: &OneShotShared) {
    let mut state = shared.state.lock();
    while state.alive {
        match state.deadline {
            None => shared.cond.wait(&mut state),
            Some(deadline) if Instant::now() >= deadline => {
                state.deadline = None;
                drop(state);
                (shared.handler)();
                state = shared.state.lock();
            }
            Some(deadline) => {
                let _ = shared.cond.wait_until(&mut state, deadline);
            }
        }
    }
}

impl Countdown for OneShotTimer {
    fn is_active(&self) -> bool {
        self.shared.state.lock().deadline.is_some()
    }

    fn remaining(&self) -> u64 {
        match self.shared.state.lock().deadline {
            Some(deadline) => duration_to_ticks_ceil(
                deadline.saturating_duration_since(Instant::now()),
                self.shared.tick_period,
            ),
            None => 0,
        }
    }

    fn start(&self, ticks: u64) {
        let mut state = self.shared.state.lock();
        state.deadline = Some(Instant::now() + ticks_to_duration(ticks, self.shared.tick_period));
        self.shared.cond.notify_one();
    }

    fn stop(&self) {
        let mut state = self.shared.state.lock();
        state.deadline = None;
        self.shared.cond.notify_one();
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        // The worker may be the thread dropping us, so it is detached rather
        // than joined.
        let mut state = self.shared.state.lock();
        state.alive = false;
        state.deadline = None;
        self.shared.cond.notify_one();
    }
}
