//! The process-wide scheduling runtime.
//!
//! [`Runtime`] owns both cooperative contexts, their queues, the shared
//! countdown and the draw rendezvous. It is built once through
//! [`RuntimeBuilder`] and shared as an `Arc`; OS threads for the Main-App and
//! overlay contexts are spawned from it, and the supervisor that owns those
//! threads talks to it through [`Supervisor`].

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::OnceLock;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::app::{App, Context};
use crate::config::RuntimeConfig;
use crate::error::{PostError, QueueError, RuntimeError};
use crate::message::{ButtonEvent, Message, SupervisorMessage};
use crate::multiplexer::{Schedule, TimerMultiplexer};
use crate::overlay::{self, OverlayId, OverlayStack, OverlayUserContext, OverlayWindow};
use crate::platform::Platform;
use crate::queue::{MessageQueue, APP_QUEUE_DEPTH, OVERLAY_QUEUE_DEPTH, SUPERVISOR_QUEUE_DEPTH};
use crate::runloop;
use crate::sync::{Arc, BinarySemaphore, Mutex, MutexGuard, Weak};
use crate::thread::{ThreadContext, ThreadKind, ThreadStatus};
use crate::time::{Clock, Countdown, OneShotTimer, SystemClock, Tick, Timeout};
use crate::timer::Expiry;

const OVERLAY_INIT_POLL: Duration = Duration::from_millis(50);
const OVERLAY_DRAW_POLL: Duration = Duration::from_millis(50);

/// Builder for [`Runtime`].
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    platform: Arc<dyn Platform>,
    clock: Option<Arc<dyn Clock>>,
    countdown: Option<Arc<dyn Countdown>>,
}

impl RuntimeBuilder {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self {
            config: RuntimeConfig::default(),
            platform,
            clock: None,
            countdown: None,
        }
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the host monotonic clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replaces the built-in countdown worker.
    ///
    /// A custom countdown must call [`Runtime::countdown_expired`] itself
    /// when it fires.
    pub fn countdown(mut self, countdown: Arc<dyn Countdown>) -> Self {
        self.countdown = Some(countdown);
        self
    }

    /// Builds the runtime.
    ///
    /// # Panics
    ///
    /// If the configured tick period is zero.
    pub fn build(self) -> Result<Arc<Runtime>, RuntimeError> {
        let tick_period = self.config.tick_period;
        assert!(!tick_period.is_zero(), "tick period must be non-zero");

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock::new(tick_period)),
        };

        let target: Arc<OnceLock<Weak<Runtime>>> = Arc::new(OnceLock::new());
        let countdown: Arc<dyn Countdown> = match self.countdown {
            Some(countdown) => countdown,
            None => {
                let target = Arc::clone(&target);
                Arc::new(OneShotTimer::new(
                    tick_period,
                    Box::new(move || {
                        if let Some(rt) = target.get().and_then(Weak::upgrade) {
                            rt.countdown_expired();
                        }
                    }),
                )?)
            }
        };

        let rt = Arc::new_cyclic(|weak| {
            let _ = target.set(weak.clone());
            Runtime {
                this: weak.clone(),
                clock,
                platform: self.platform,
                main: ThreadContext::new(ThreadKind::MainApp),
                overlay: ThreadContext::new(ThreadKind::Overlay),
                app_queue: MessageQueue::new(tick_period),
                overlay_queue: MessageQueue::new(tick_period),
                supervisor_queue: MessageQueue::new(tick_period),
                multiplexer: TimerMultiplexer::new(countdown),
                overlays: Mutex::new(OverlayStack::new()),
                overlay_done: BinarySemaphore::new(),
                overlay_ready: BinarySemaphore::new(),
                overlay_started: AtomicBool::new(false),
                framebuffer: Mutex::new(()),
                terminate: BinarySemaphore::new(),
                welcomed: AtomicBool::new(false),
                config: self.config,
            }
        });

        info!(target: "runtime", "runtime built, tick period {:?}", tick_period);
        Ok(rt)
    }
}

pub struct Runtime {
    this: Weak<Runtime>,
    config: RuntimeConfig,
    clock: Arc<dyn Clock>,
    platform: Arc<dyn Platform>,
    main: ThreadContext,
    overlay: ThreadContext,
    app_queue: MessageQueue<Message, APP_QUEUE_DEPTH>,
    overlay_queue: MessageQueue<Message, OVERLAY_QUEUE_DEPTH>,
    supervisor_queue: MessageQueue<SupervisorMessage, SUPERVISOR_QUEUE_DEPTH>,
    multiplexer: TimerMultiplexer,
    overlays: Mutex<OverlayStack>,
    // Given by the overlay context once it has painted; taken by the draw
    // coordinator.
    overlay_done: BinarySemaphore,
    overlay_ready: BinarySemaphore,
    overlay_started: AtomicBool,
    framebuffer: Mutex<()>,
    // Releases a Main-App context parked after a clean exit.
    terminate: BinarySemaphore,
    welcomed: AtomicBool,
}

impl Runtime {
    pub fn builder(platform: Arc<dyn Platform>) -> RuntimeBuilder {
        RuntimeBuilder::new(platform)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    pub fn thread(&self, kind: ThreadKind) -> &ThreadContext {
        match kind {
            ThreadKind::MainApp => &self.main,
            ThreadKind::Overlay => &self.overlay,
        }
    }

    /// A handle for code that runs in (or on behalf of) context `kind`.
    pub fn context(self: &Arc<Self>, kind: ThreadKind) -> Context {
        Context::new(Arc::clone(self), kind)
    }

    pub fn multiplexer(&self) -> &TimerMultiplexer {
        &self.multiplexer
    }

    /// Whether the Main-App context is unloading.
    pub fn is_shutting_down(&self) -> bool {
        self.main.is_shutting_down()
    }

    pub(crate) fn weak(&self) -> Weak<Runtime> {
        self.this.clone()
    }

    pub(crate) fn app_queue(&self) -> &MessageQueue<Message, APP_QUEUE_DEPTH> {
        &self.app_queue
    }

    pub(crate) fn overlay_queue(&self) -> &MessageQueue<Message, OVERLAY_QUEUE_DEPTH> {
        &self.overlay_queue
    }

    pub(crate) fn supervisor_queue(
        &self,
    ) -> &MessageQueue<SupervisorMessage, SUPERVISOR_QUEUE_DEPTH> {
        &self.supervisor_queue
    }

    pub(crate) fn overlay_stack(&self) -> MutexGuard<'_, OverlayStack> {
        self.overlays.lock()
    }

    pub(crate) fn overlay_done(&self) -> &BinarySemaphore {
        &self.overlay_done
    }

    pub(crate) fn overlay_ready(&self) -> &BinarySemaphore {
        &self.overlay_ready
    }

    /// True while someone holds the overlay stack lock.
    #[cfg(test)]
    pub(crate) fn overlay_stack_is_locked(&self) -> bool {
        self.overlays.try_lock_for(Duration::ZERO).is_none()
    }

    pub(crate) fn framebuffer(&self) -> &Mutex<()> {
        &self.framebuffer
    }

    // Timers

    /// Reprograms the shared countdown from both timer lists.
    ///
    /// A context only competes for the countdown while it can take delivery
    /// of the wake-up: the Main-App context while its event loop runs, the
    /// overlay context once it has initialised.
    pub fn rearm_timers(&self) -> Schedule {
        let now = self.now();
        let main = match self.main.status() {
            ThreadStatus::Runloop => self.main.next_expiry(now),
            _ => Expiry::Never,
        };
        let overlay = match self.overlay.status() {
            ThreadStatus::Loaded | ThreadStatus::Runloop => self.overlay.next_expiry(now),
            _ => Expiry::Never,
        };
        self.multiplexer.recompute_schedule(main, overlay)
    }

    /// Delivers a countdown expiry to the context it was armed for.
    pub fn countdown_expired(&self) {
        let route = self.multiplexer.expired();
        let delivered = match route {
            // Never waits: the app loop recomputes its deadline every pass.
            ThreadKind::MainApp => self.post_app_message(Message::TimerFired, Timeout::Immediate),
            ThreadKind::Overlay => self.overlay_post(Message::TimerFired),
        };

        if let Err(err) = delivered {
            debug!(target: "timer", "expiry for {route} not delivered: {err}");
            if route == ThreadKind::Overlay {
                self.rearm_timers();
            }
        }
    }

    // Main-App posting

    /// Posts to the Main-App queue. Dropped unless the event loop is running.
    pub(crate) fn post_app_message(
        &self,
        message: Message,
        timeout: Timeout,
    ) -> Result<(), PostError> {
        let status = self.main.status();
        if status != ThreadStatus::Runloop {
            debug!(target: "apploop", "not posting {:?}: app not running", message.command());
            return Err(PostError::NotRunning {
                thread: ThreadKind::MainApp,
                status,
            });
        }

        self.app_queue.send(message, timeout).map_err(|source| {
            warn!(target: "apploop", "app queue rejected message: {source}");
            PostError::Queue {
                thread: ThreadKind::MainApp,
                source,
            }
        })
    }

    /// Posts a recognised click to the running application.
    pub fn post_button_event(&self, event: ButtonEvent) -> Result<(), PostError> {
        self.post_app_message(
            Message::Button(event),
            Timeout::Ticks(self.config.post_timeout_ticks),
        )
    }

    /// Asks the running application to draw a frame.
    ///
    /// Never blocks: this is also called from inside the Main-App context,
    /// which is the only consumer of its own queue.
    pub fn post_draw_request(&self, force: bool) -> Result<(), PostError> {
        self.post_app_message(Message::Draw { force }, Timeout::Immediate)
    }

    /// Asks the running application to quit.
    pub fn post_quit_request(&self) -> Result<(), PostError> {
        self.post_app_message(Message::Quit, Timeout::Ticks(self.config.post_timeout_ticks))
    }

    // Overlay posting

    fn overlay_post(&self, message: Message) -> Result<(), PostError> {
        let status = self.overlay.status();
        if !matches!(status, ThreadStatus::Loaded | ThreadStatus::Runloop) {
            debug!(target: "overlay", "not posting {:?}: overlay not running", message.command());
            return Err(PostError::NotRunning {
                thread: ThreadKind::Overlay,
                status,
            });
        }

        let timeout = Timeout::Ticks(self.config.overlay_post_timeout_ticks);
        self.overlay_queue.send(message, timeout).map_err(|source| {
            warn!(target: "overlay", "overlay queue rejected message: {source}");
            PostError::Queue {
                thread: ThreadKind::Overlay,
                source,
            }
        })
    }

    /// Spawns the overlay context and blocks until it has initialised.
    pub fn start_overlay(self: &Arc<Self>) -> Result<JoinHandle<()>, RuntimeError> {
        if self.overlay_started.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::OverlayAlreadyStarted);
        }

        self.overlay.reset_for(None);
        let rt = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("overlay".into())
            .spawn(move || overlay::overlay_thread(rt))
            .map_err(|err| {
                self.overlay_started.store(false, Ordering::SeqCst);
                err
            })?;

        while !self.overlay_ready.wait_timeout(OVERLAY_INIT_POLL) {
            if handle.is_finished() {
                return Err(RuntimeError::OverlayInitFailed);
            }
        }
        info!(target: "overlay", "overlay manager ready");
        Ok(handle)
    }

    /// Asks the overlay context to unload its windows and exit.
    pub fn stop_overlay(&self) -> Result<(), PostError> {
        self.overlay_post(Message::Quit)
    }

    /// Creates an overlay window; `callback` populates it on the overlay
    /// context before it is pushed. The window's context refers to itself.
    pub fn overlay_create<F>(&self, callback: F) -> Result<(), PostError>
    where
        F: FnOnce(&Context, &mut OverlayWindow) + Send + 'static,
    {
        self.overlay_post(Message::OverlayCreate {
            callback: Box::new(callback),
            context: None,
        })
    }

    /// Like [`overlay_create`](Self::overlay_create), attaching `context` to
    /// the new window.
    pub fn overlay_create_with_context<F>(
        &self,
        callback: F,
        context: OverlayUserContext,
    ) -> Result<(), PostError>
    where
        F: FnOnce(&Context, &mut OverlayWindow) + Send + 'static,
    {
        self.overlay_post(Message::OverlayCreate {
            callback: Box::new(callback),
            context: Some(context),
        })
    }

    /// Asks the overlay context to destroy a window.
    pub fn overlay_destroy(&self, id: OverlayId) -> Result<(), PostError> {
        self.overlay_post(Message::OverlayDestroy(id))
    }

    /// Has the overlay context paint over the current frame, blocking until
    /// it has. Only the draw coordinator on the Main-App context may call
    /// this.
    ///
    /// The wait has no deadline while the overlay context is alive. Once it
    /// is unloading it will never paint, so the wait is abandoned.
    pub(crate) fn overlay_draw(&self) -> Result<(), PostError> {
        self.overlay_post(Message::Draw { force: true })?;
        while !self.overlay_done.wait_timeout(OVERLAY_DRAW_POLL) {
            let status = self.overlay.status();
            if matches!(status, ThreadStatus::Unloading | ThreadStatus::Terminated) {
                // A late signal from the exiting context may still land.
                if self.overlay_done.wait_timeout(Duration::ZERO) {
                    return Ok(());
                }
                warn!(target: "draw", "overlay stopped before painting the frame");
                return Err(PostError::NotRunning {
                    thread: ThreadKind::Overlay,
                    status,
                });
            }
        }
        Ok(())
    }

    /// Hands a click to the overlay that owns the buttons.
    pub fn overlay_post_button(&self, event: ButtonEvent) -> Result<(), PostError> {
        self.overlay_post(Message::Button(event))
    }

    // Overlay queries

    pub fn overlay_count(&self) -> usize {
        self.overlays.lock().len()
    }

    pub fn overlay_contains(&self, id: OverlayId) -> bool {
        self.overlays.lock().contains(id)
    }

    pub fn overlay_top_window(&self) -> Option<OverlayId> {
        self.overlays.lock().top()
    }

    /// Topmost overlay window with a click configuration.
    pub fn overlay_window_with_click_config(&self) -> Option<OverlayId> {
        self.overlays.lock().with_click_config().map(OverlayWindow::id)
    }

    /// Whether button input should go to the overlay context.
    pub fn overlay_accepts_keypress(&self) -> bool {
        self.overlays.lock().with_click_config().is_some()
    }

    /// Runs `f` against an overlay window with the stack locked.
    pub fn with_overlay_window<R>(
        &self,
        id: OverlayId,
        f: impl FnOnce(&OverlayWindow) -> R,
    ) -> Option<R> {
        self.overlays.lock().get(id).map(f)
    }

    // Application lifecycle

    /// Installs `app` in the Main-App context and spawns its thread.
    ///
    /// # Panics
    ///
    /// If a previous application still occupies the context. Join the
    /// previous thread after [`Supervisor::terminate_app`] first.
    pub fn launch_app(
        self: &Arc<Self>,
        app: Arc<dyn App>,
    ) -> Result<JoinHandle<()>, RuntimeError> {
        let status = self.main.status();
        assert!(
            matches!(status, ThreadStatus::Loading | ThreadStatus::Terminated),
            "cannot launch {} while the main-app context is {status:?}",
            app.name()
        );

        // A termination left over from the previous occupant must not release
        // the new one.
        self.terminate.wait_timeout(Duration::ZERO);
        let name = format!("app:{}", app.name());
        self.main.reset_for(Some(app));

        let rt = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || runloop::app_main_entry(rt))?;
        Ok(handle)
    }

    pub(crate) fn request_app_start(&self, name: &str) {
        let message = SupervisorMessage::StartApp { name: name.into() };
        if let Err(err) = self.supervisor_queue.try_send(message) {
            warn!(target: "runtime", "start of {name} not requested: {err}");
        }
    }

    pub(crate) fn show_welcome(&self) {
        if let Some(message) = &self.config.welcome_message {
            if !self.welcomed.swap(true, Ordering::SeqCst) {
                self.platform.show_small_message(message);
            }
        }
    }

    pub(crate) fn wait_for_termination(&self) {
        self.terminate.wait();
    }

    /// The supervisor's side of the runtime.
    pub fn supervisor(&self) -> Supervisor<'_> {
        Supervisor { rt: self }
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("main", &self.main)
            .field("overlay", &self.overlay)
            .field("overlays", &self.overlay_count())
            .finish_non_exhaustive()
    }
}

/// Operations reserved for the code that owns the context threads.
pub struct Supervisor<'a> {
    rt: &'a Runtime,
}

impl Supervisor<'_> {
    /// Waits for the next notification from the contexts.
    pub fn recv(&self, timeout: Timeout) -> Result<SupervisorMessage, QueueError> {
        self.rt.supervisor_queue.recv(timeout)
    }

    pub fn app_status(&self) -> ThreadStatus {
        self.rt.main.status()
    }

    pub fn shutdown_deadline(&self) -> Option<Tick> {
        self.rt.main.shutdown_deadline()
    }

    /// True once an unloading application has used up its grace period.
    pub fn is_overdue(&self) -> bool {
        self.shutdown_deadline()
            .is_some_and(|deadline| self.rt.now() >= deadline)
    }

    /// Releases a Main-App context parked after its clean exit.
    pub fn terminate_app(&self) {
        debug!(target: "runtime", "terminating main-app context");
        self.rt.terminate.signal();
    }
}
