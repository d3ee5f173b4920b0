//! Applications and the handle they run against.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PostError;
use crate::overlay::OverlayId;
use crate::runtime::Runtime;
use crate::sync::Arc;
use crate::thread::{ThreadContext, ThreadKind};
use crate::time::Tick;
use crate::timer::TimerId;

/// Class of application, which decides the default click bindings.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppKind {
    /// A watchface: back does nothing, select opens the system app.
    Face,
    /// The system app itself; select is left to the app.
    System,
    #[default]
    Standard,
}

/// An application that can occupy the Main-App context.
pub trait App: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn kind(&self) -> AppKind {
        AppKind::Standard
    }

    /// Entry point. Typically sets up windows and then calls
    /// [`Context::event_loop`], returning once the app has been asked to quit.
    fn main(&self, ctx: &Context);

    /// Runs in the app context after a quit request has been accepted.
    fn on_quit(&self, _ctx: &Context) {}
}

/// Handle to one cooperative context, given to code running inside it.
#[derive(Clone)]
pub struct Context {
    rt: Arc<Runtime>,
    kind: ThreadKind,
}

impl Context {
    pub(crate) fn new(rt: Arc<Runtime>, kind: ThreadKind) -> Self {
        Self { rt, kind }
    }

    pub fn kind(&self) -> ThreadKind {
        self.kind
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.rt
    }

    pub fn thread(&self) -> &ThreadContext {
        self.rt.thread(self.kind)
    }

    pub fn now(&self) -> Tick {
        self.rt.now()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.thread().is_shutting_down()
    }

    /// Schedules `callback` to run in this context after `delay` ticks.
    pub fn add_timer<F>(&self, delay: u64, callback: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        self.add_timer_at(self.now().after(delay), callback)
    }

    /// Schedules `callback` to run in this context at tick `at`.
    pub fn add_timer_at<F>(&self, at: Tick, callback: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.thread().add_timer(at, Box::new(callback));
        self.rt.rearm_timers();
        id
    }

    /// Cancels a pending timer of this context.
    ///
    /// # Panics
    ///
    /// If `id` was issued by another context or is no longer pending.
    pub fn remove_timer(&self, id: TimerId) {
        assert_eq!(
            id.owner(),
            self.kind,
            "timer {id:?} cannot be removed from the {} context",
            self.kind
        );
        self.thread().remove_timer(id);
        self.rt.rearm_timers();
    }

    /// Asks the Main-App context to draw a frame.
    pub fn post_draw_request(&self, force: bool) -> Result<(), PostError> {
        self.rt.post_draw_request(force)
    }

    /// Runs the application event loop until a quit request is handled.
    ///
    /// Only the Main-App context has an event loop; calling this from any
    /// other context logs an error and returns.
    pub fn event_loop(&self) {
        crate::runloop::event_loop(self);
    }

    /// Removes an overlay window.
    ///
    /// On the overlay context the window is destroyed in place; elsewhere a
    /// destroy request is posted to the overlay manager.
    pub fn overlay_remove(&self, id: OverlayId) -> Result<(), PostError> {
        if self.kind == ThreadKind::Overlay {
            crate::overlay::destroy_window(&self.rt, id);
            Ok(())
        } else {
            self.rt.overlay_destroy(id)
        }
    }

    /// Removes the topmost overlay window, if any.
    pub fn overlay_pop_top(&self) -> Result<Option<OverlayId>, PostError> {
        let Some(top) = self.rt.overlay_top_window() else {
            return Ok(None);
        };
        self.overlay_remove(top)?;
        Ok(Some(top))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("kind", &self.kind).finish()
    }
}
