//! The Main-App context: application entry, event loop and teardown.

use log::{debug, error, info, trace, warn};

use crate::app::{AppKind, Context};
use crate::draw;
use crate::message::{ButtonId, ClickHandler, Message, SupervisorMessage};
use crate::runtime::Runtime;
use crate::sync::{Arc, Weak};
use crate::thread::{ThreadKind, ThreadStatus};
use crate::time::Timeout;
use crate::timer::Expiry;

/// Whether a run-loop keeps going after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

/// Body of the Main-App context's OS thread.
pub(crate) fn app_main_entry(rt: Arc<Runtime>) {
    let ctx = Context::new(Arc::clone(&rt), ThreadKind::MainApp);
    let thread = ctx.thread();
    thread.set_status(ThreadStatus::Loaded);

    let platform = rt.platform();
    platform.reset_caches();
    platform.unsubscribe_services();
    platform.init_graphics(ThreadKind::MainApp);

    match thread.app() {
        Some(app) => {
            info!(target: "apploop", "starting {}", app.name());
            app.main(&ctx);
        }
        None => error!(target: "apploop", "main-app context started with no app"),
    }

    thread.set_status(ThreadStatus::Unloading);
    let notice = SupervisorMessage::AppQuitClean {
        thread: ThreadKind::MainApp,
    };
    let timeout = Timeout::Ticks(rt.config().supervisor_post_timeout_ticks);
    if let Err(err) = rt.supervisor_queue().send(notice, timeout) {
        warn!(target: "apploop", "supervisor not told about clean quit: {err}");
    }
    debug!(target: "apploop", "app finished, waiting for termination");

    rt.wait_for_termination();
    thread.set_status(ThreadStatus::Terminated);
}

/// Runs the Main-App event loop until a quit request is handled.
pub(crate) fn event_loop(ctx: &Context) {
    if ctx.kind() != ThreadKind::MainApp {
        error!(target: "apploop", "event loop entered from the {} context", ctx.kind());
        return;
    }

    let rt = ctx.runtime();
    let thread = ctx.thread();
    info!(target: "apploop", "app entered event loop");

    let kind = thread.app().map_or(AppKind::Standard, |app| app.kind());
    install_default_bindings(rt, kind);

    let stale = rt.app_queue().clear();
    if stale > 0 {
        debug!(target: "apploop", "dropped {stale} stale messages");
    }

    rt.show_welcome();
    thread.set_status(ThreadStatus::Runloop);

    let runloop = AppRunLoop::new(ctx);
    loop {
        let timeout = runloop.service_timers();
        match rt.app_queue().recv(timeout) {
            Ok(message) => {
                if runloop.dispatch(message) == Flow::Quit {
                    break;
                }
            }
            Err(_) if thread.is_shutting_down() => {
                trace!(target: "apploop", "idle while shutting down");
            }
            Err(_) => {}
        }
        std::thread::yield_now();
    }

    info!(target: "apploop", "app left event loop");
}

/// Installs the default back and select bindings unless an overlay owns the
/// buttons, then reloads the top window's own click configuration.
pub(crate) fn install_default_bindings(rt: &Runtime, kind: AppKind) {
    if rt.overlay_accepts_keypress() {
        debug!(target: "apploop", "overlay owns buttons, skipping default bindings");
        return;
    }

    let platform = rt.platform();
    let weak = rt.weak();

    if kind != AppKind::Face {
        platform.subscribe_click(ButtonId::Back, back_handler(weak.clone()));
    }
    platform.load_main_click_config();
    if kind != AppKind::System {
        platform.subscribe_click(ButtonId::Select, select_handler(weak));
    }
}

fn back_handler(rt: Weak<Runtime>) -> ClickHandler {
    Arc::new(move |_: ButtonId| {
        let Some(rt) = rt.upgrade() else { return };
        let platform = rt.platform();
        platform.pop_window();
        let remaining = platform.window_count();
        debug!(target: "apploop", "back pressed, {remaining} windows left");
        if remaining == 0 {
            rt.request_app_start(&rt.config().system_app);
        }
        platform.mark_dirty();
    })
}

fn select_handler(rt: Weak<Runtime>) -> ClickHandler {
    Arc::new(move |_: ButtonId| {
        if let Some(rt) = rt.upgrade() {
            rt.request_app_start(&rt.config().system_app);
        }
    })
}

/// Message handling for a running Main-App context.
pub(crate) struct AppRunLoop<'a> {
    ctx: &'a Context,
}

impl<'a> AppRunLoop<'a> {
    pub(crate) fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Fires the head timer if it is due and returns how long the queue may
    /// be waited on.
    pub(crate) fn service_timers(&self) -> Timeout {
        let rt = self.ctx.runtime();
        let thread = self.ctx.thread();

        if thread.next_expiry(rt.now()) == Expiry::Immediate {
            thread.pop_and_fire();
            if let Err(err) = rt.post_draw_request(false) {
                trace!(target: "apploop", "timer redraw not requested: {err}");
            }
        }
        rt.rearm_timers();

        match thread.next_expiry(rt.now()) {
            Expiry::Immediate => Timeout::Immediate,
            Expiry::In(ticks) => Timeout::Ticks(ticks),
            Expiry::Never => Timeout::Forever,
        }
    }

    pub(crate) fn dispatch(&self, message: Message) -> Flow {
        let rt = self.ctx.runtime();
        let thread = self.ctx.thread();
        trace!(target: "apploop", "app message {:?}", message.command());

        match message {
            Message::Button(event) => {
                if thread.is_shutting_down() {
                    trace!(target: "apploop", "ignoring button while shutting down");
                } else if rt.overlay_accepts_keypress() {
                    if let Err(err) = rt.overlay_post_button(event) {
                        warn!(target: "apploop", "button not forwarded to overlay: {err}");
                    }
                } else {
                    event.dispatch();
                }
            }
            Message::Quit => {
                self.quit();
                return Flow::Quit;
            }
            Message::Draw { force } => {
                if thread.is_shutting_down() {
                    trace!(target: "apploop", "ignoring draw while shutting down");
                } else {
                    draw::draw_frame(rt, force);
                }
            }
            Message::TimerFired => {}
            other => warn!(target: "apploop", "unexpected {:?} on app queue", other.command()),
        }

        Flow::Continue
    }

    fn quit(&self) {
        let rt = self.ctx.runtime();
        let thread = self.ctx.thread();

        if !thread.is_shutting_down() {
            let deadline = rt.now().after(rt.config().shutdown_grace_ticks);
            thread.set_shutdown_deadline(deadline);
            thread.set_status(ThreadStatus::Unloading);
            debug!(target: "apploop", "quit requested, deadline {deadline}");
        }

        let platform = rt.platform();
        platform.unsubscribe_all_buttons();
        platform.unsubscribe_services();
        thread.set_status(ThreadStatus::Unloading);

        if let Some(app) = thread.app() {
            app.on_quit(self.ctx);
        }
        info!(target: "apploop", "app quit");
    }
}
