//! # appmgr
//!
//! Cooperative scheduling core of a smartwatch OS: the per-application
//! run-loop, per-context timers sharing one countdown, message passing
//! between contexts, and an overlay manager that composites windows above the
//! running application.
//!
//! Two cooperative contexts exist. The Main-App context runs the foreground
//! application; the overlay context runs notification-style windows drawn on
//! top. Each owns a bounded message queue and an ordered timer list, and the
//! two meet at the draw rendezvous when a frame is produced.
//!
//! ## Module Overview
//! - [`timer`]       – Ordered per-context timer lists.
//! - [`multiplexer`] – One countdown shared by both timer lists.
//! - [`queue`]       – Bounded message queues.
//! - [`runtime`]     – Contexts, posting, lifecycle and the supervisor port.
//! - [`overlay`]     – The overlay stack and its context.
//! - [`platform`]    – Services consumed from the rest of the OS.

extern crate alloc;

pub mod app;
pub mod config;
mod draw;
pub mod error;
pub mod message;
pub mod multiplexer;
pub mod overlay;
pub mod platform;
pub mod queue;
mod runloop;
pub mod runtime;
pub mod sync;
pub mod thread;
pub mod time;
pub mod timer;
pub mod window;

pub use app::{App, AppKind, Context};
pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use error::{PostError, QueueError, RuntimeError};
pub use message::{ButtonEvent, ButtonId, ClickHandler, Message, SupervisorMessage};
pub use multiplexer::{Schedule, TimerMultiplexer};
pub use overlay::{OverlayContext, OverlayId, OverlayStack, OverlayWindow};
pub use platform::Platform;
pub use runtime::{Runtime, RuntimeBuilder, Supervisor};
pub use thread::{ThreadContext, ThreadKind, ThreadStatus};
pub use time::{Clock, Countdown, ManualClock, OneShotTimer, SystemClock, Tick, Timeout};
pub use timer::{Expiry, Fired, TimerId, TimerList};
pub use window::{Background, Window};

#[cfg(test)]
mod tests;
