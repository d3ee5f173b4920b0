//! Overlay manager: windows composited above the running application.
//!
//! Overlay windows live on their own stack and are serviced by a dedicated
//! context with its own queue and timer list. Every structural change to the
//! stack happens on that context; other contexts ask for changes by posting
//! messages. Queries (count, top, click ownership) may be made from anywhere.
//!
//! The stack is ordered topmost first. Compositing walks it bottom to top so
//! higher windows paint over lower ones.

use alloc::collections::VecDeque;
use core::any::Any;
use core::fmt;

use log::{debug, info, warn};

use crate::app::Context;
use crate::message::Message;
use crate::runloop::{self, Flow};
use crate::runtime::Runtime;
use crate::sync::Arc;
use crate::thread::{ThreadKind, ThreadStatus};
use crate::time::Timeout;
use crate::timer::Expiry;
use crate::window::Window;

/// Handle to an overlay window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverlayId(u32);

impl OverlayId {
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overlay#{}", self.0)
    }
}

/// Caller-supplied state attached to an overlay window.
pub type OverlayUserContext = Arc<dyn Any + Send + Sync>;

/// Runs on the overlay context to populate a freshly created window before it
/// is pushed.
pub type OverlayCreateCallback = Box<dyn FnOnce(&Context, &mut OverlayWindow) + Send>;

/// Context value handed back to overlay callbacks.
#[derive(Clone)]
pub enum OverlayContext {
    /// No user context was given; the window refers to itself.
    Window(OverlayId),
    User(OverlayUserContext),
}

impl fmt::Debug for OverlayContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Window(id) => f.debug_tuple("Window").field(id).finish(),
            Self::User(_) => f.write_str("User(..)"),
        }
    }
}

/// An entry on the overlay stack.
pub struct OverlayWindow {
    id: OverlayId,
    window: Window,
    context: OverlayContext,
}

impl OverlayWindow {
    pub(crate) fn new(id: OverlayId, user: Option<OverlayUserContext>) -> Self {
        Self {
            id,
            window: Window::overlay(),
            context: user.map_or(OverlayContext::Window(id), OverlayContext::User),
        }
    }

    pub fn id(&self) -> OverlayId {
        self.id
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    pub fn context(&self) -> &OverlayContext {
        &self.context
    }

    pub fn set_context(&mut self, context: OverlayContext) {
        self.context = context;
    }

    /// The user context, if one of type `T` was attached.
    pub fn user_context<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match &self.context {
            OverlayContext::User(user) => Arc::clone(user).downcast::<T>().ok(),
            OverlayContext::Window(_) => None,
        }
    }
}

impl fmt::Debug for OverlayWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayWindow")
            .field("id", &self.id)
            .field("window", &self.window)
            .field("context", &self.context)
            .finish()
    }
}

/// Overlay windows, topmost first.
#[derive(Debug, Default)]
pub struct OverlayStack {
    windows: VecDeque<OverlayWindow>,
    next_id: u32,
}

impl OverlayStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn allocate_id(&mut self) -> OverlayId {
        let id = OverlayId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Pushes `overlay` on top.
    pub fn push(&mut self, overlay: OverlayWindow) {
        self.windows.push_front(overlay);
    }

    /// Detaches a window from the stack.
    ///
    /// # Panics
    ///
    /// If `id` is not on the stack.
    pub fn remove(&mut self, id: OverlayId) -> OverlayWindow {
        let Some(index) = self.windows.iter().position(|w| w.id == id) else {
            panic!("{id} is not on the overlay stack");
        };
        match self.windows.remove(index) {
            Some(overlay) => overlay,
            None => unreachable!("index was just found"),
        }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn contains(&self, id: OverlayId) -> bool {
        self.windows.iter().any(|w| w.id == id)
    }

    pub fn top(&self) -> Option<OverlayId> {
        self.windows.front().map(|w| w.id)
    }

    pub fn get(&self, id: OverlayId) -> Option<&OverlayWindow> {
        self.windows.iter().find(|w| w.id == id)
    }

    /// Topmost window that wants button input.
    pub fn with_click_config(&self) -> Option<&OverlayWindow> {
        self.windows.iter().find(|w| w.window.has_click_config())
    }

    /// Windows in paint order, bottom first.
    pub fn iter_paint_order(&self) -> impl Iterator<Item = &OverlayWindow> {
        self.windows.iter().rev()
    }

    fn iter_paint_order_mut(&mut self) -> impl Iterator<Item = &mut OverlayWindow> {
        self.windows.iter_mut().rev()
    }

    fn drain(&mut self) -> impl Iterator<Item = OverlayWindow> + '_ {
        self.windows.drain(..)
    }
}

/// Body of the overlay context's OS thread.
pub(crate) fn overlay_thread(rt: Arc<Runtime>) {
    let ctx = Context::new(Arc::clone(&rt), ThreadKind::Overlay);
    let thread = ctx.thread();

    info!(target: "overlay", "overlay manager starting");
    rt.platform().init_graphics(ThreadKind::Overlay);
    thread.set_status(ThreadStatus::Loaded);
    rt.rearm_timers();
    rt.overlay_ready().signal();
    thread.set_status(ThreadStatus::Runloop);

    loop {
        let message = match rt.overlay_queue().recv(Timeout::Forever) {
            Ok(message) => message,
            Err(err) => {
                warn!(target: "overlay", "overlay queue receive failed: {err}");
                continue;
            }
        };

        if handle_message(&ctx, message) == Flow::Quit {
            break;
        }
        std::thread::yield_now();
    }

    thread.set_status(ThreadStatus::Terminated);
    release_pending(&rt);
    info!(target: "overlay", "overlay manager stopped");
}

/// Empties the overlay queue after the loop has exited, releasing any draw
/// coordinator that queued a frame behind the quit.
pub(crate) fn release_pending(rt: &Runtime) -> usize {
    let mut dropped = 0;
    while let Ok(message) = rt.overlay_queue().recv(Timeout::Immediate) {
        if let Message::Draw { .. } = message {
            rt.overlay_done().signal();
        }
        debug!(target: "overlay", "dropping {:?} after exit", message.command());
        dropped += 1;
    }
    dropped
}

/// Dispatches one overlay queue message on the overlay context.
pub(crate) fn handle_message(ctx: &Context, message: Message) -> Flow {
    let rt = ctx.runtime();
    debug!(target: "overlay", "overlay message {:?}", message.command());

    match message {
        Message::OverlayCreate { callback, context } => {
            create_window(ctx, callback, context);
            request_redraw(rt);
        }
        Message::OverlayDestroy(id) => {
            destroy_window(rt, id);
            request_redraw(rt);
        }
        Message::Draw { .. } => {
            draw_windows(rt);
            rt.overlay_done().signal();
        }
        Message::Button(event) => event.dispatch(),
        Message::TimerFired => {
            let thread = ctx.thread();
            if thread.next_expiry(rt.now()) == Expiry::Immediate {
                thread.pop_and_fire();
                request_redraw(rt);
            }
            rt.rearm_timers();
        }
        Message::Quit => {
            ctx.thread().set_status(ThreadStatus::Unloading);
            let windows: Vec<OverlayWindow> = rt.overlay_stack().drain().collect();
            for mut overlay in windows {
                overlay.window.unload();
            }
            return Flow::Quit;
        }
    }

    Flow::Continue
}

fn request_redraw(rt: &Runtime) {
    if let Err(err) = rt.post_draw_request(true) {
        debug!(target: "overlay", "redraw not requested: {err}");
    }
}

/// Builds a new overlay window, lets `callback` populate it, then pushes it.
pub(crate) fn create_window(
    ctx: &Context,
    callback: OverlayCreateCallback,
    user: Option<OverlayUserContext>,
) -> OverlayId {
    let rt = ctx.runtime();
    let id = rt.overlay_stack().allocate_id();
    let mut overlay = OverlayWindow::new(id, user);

    callback(ctx, &mut overlay);
    push_window(rt, overlay);
    id
}

fn push_window(rt: &Runtime, mut overlay: OverlayWindow) {
    let id = overlay.id;
    let provider = overlay.window.click_config_provider();
    overlay.window.schedule_render();
    rt.overlay_stack().push(overlay);

    let platform = rt.platform();
    if let Some(provider) = provider {
        platform.unsubscribe_all_buttons();
        provider(platform.as_ref());
    }
    platform.mark_dirty();
    info!(target: "overlay", "{id} pushed");
}

/// Unloads and frees an overlay window, then hands click configuration to
/// whoever should own it now.
///
/// # Panics
///
/// If `id` is not on the overlay stack.
pub(crate) fn destroy_window(rt: &Runtime, id: OverlayId) {
    let mut overlay = rt.overlay_stack().remove(id);
    overlay.window.unload();
    drop(overlay);

    restore_click_config(rt);
    rt.platform().mark_dirty();
    info!(target: "overlay", "{id} destroyed");
}

fn restore_click_config(rt: &Runtime) {
    let provider = rt
        .overlay_stack()
        .with_click_config()
        .and_then(|overlay| overlay.window.click_config_provider());

    let platform = rt.platform();
    platform.unsubscribe_all_buttons();
    match provider {
        Some(provider) => provider(platform.as_ref()),
        None => {
            let main = rt.thread(ThreadKind::MainApp);
            if let Some(app) = main.app() {
                runloop::install_default_bindings(rt, app.kind());
            } else {
                platform.load_main_click_config();
            }
        }
    }
}

/// Paints every overlay window over the current frame. The stack stays
/// locked for the whole pass; see
/// [`Platform::draw_overlay_window`](crate::platform::Platform::draw_overlay_window).
pub(crate) fn draw_windows(rt: &Runtime) {
    let platform = rt.platform();
    let mut stack = rt.overlay_stack();
    for overlay in stack.iter_paint_order_mut() {
        platform.draw_overlay_window(&overlay.window);
        overlay.window.clear_render_scheduled();
    }
}
