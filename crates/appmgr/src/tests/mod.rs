use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::config::RuntimeConfig;
use crate::message::{ButtonId, ClickHandler};
use crate::platform::Platform;
use crate::runtime::Runtime;
use crate::sync::Arc;
use crate::thread::ThreadKind;
use crate::time::{Countdown, ManualClock, Tick};
use crate::window::{Background, Window};

mod multiplexer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    PopWindow,
    MarkDirty,
    DrawStack,
    DrawOverlay(Background),
    Flush,
    Subscribe(ButtonId),
    UnsubscribeAll,
    LoadMainClicks,
    ResetCaches,
    UnsubscribeServices,
    InitGraphics(ThreadKind),
    Banner(String),
}

/// Platform double that records every call.
pub(crate) struct RecordingPlatform {
    calls: Mutex<Vec<Call>>,
    clicks: Mutex<HashMap<ButtonId, ClickHandler>>,
    windows: AtomicUsize,
    stack_changed: AtomicBool,
}

impl RecordingPlatform {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            clicks: Mutex::new(HashMap::new()),
            windows: AtomicUsize::new(1),
            stack_changed: AtomicBool::new(true),
        })
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn take_calls(&self) -> Vec<Call> {
        core::mem::take(&mut *self.calls.lock())
    }

    pub(crate) fn count(&self, call: &Call) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub(crate) fn is_bound(&self, button: ButtonId) -> bool {
        self.clicks.lock().contains_key(&button)
    }

    /// Runs the handler bound to `button`, as the click recogniser would.
    pub(crate) fn press(&self, button: ButtonId) {
        let handler = self.clicks.lock().get(&button).cloned();
        if let Some(handler) = handler {
            handler(button);
        }
    }

    pub(crate) fn set_window_count(&self, count: usize) {
        self.windows.store(count, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl Platform for RecordingPlatform {
    fn window_count(&self) -> usize {
        self.windows.load(Ordering::SeqCst)
    }

    fn pop_window(&self) {
        let _ = self
            .windows
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        self.record(Call::PopWindow);
    }

    fn mark_dirty(&self) {
        self.record(Call::MarkDirty);
    }

    fn draw_window_stack(&self) -> bool {
        self.record(Call::DrawStack);
        self.stack_changed.load(Ordering::SeqCst)
    }

    fn draw_overlay_window(&self, window: &Window) {
        self.record(Call::DrawOverlay(window.background()));
    }

    fn flush_display(&self) {
        self.record(Call::Flush);
    }

    fn subscribe_click(&self, button: ButtonId, handler: ClickHandler) {
        self.clicks.lock().insert(button, handler);
        self.record(Call::Subscribe(button));
    }

    fn unsubscribe_all_buttons(&self) {
        self.clicks.lock().clear();
        self.record(Call::UnsubscribeAll);
    }

    fn load_main_click_config(&self) {
        self.record(Call::LoadMainClicks);
    }

    fn reset_caches(&self) {
        self.record(Call::ResetCaches);
    }

    fn unsubscribe_services(&self) {
        self.record(Call::UnsubscribeServices);
    }

    fn init_graphics(&self, thread: ThreadKind) {
        self.record(Call::InitGraphics(thread));
    }

    fn show_small_message(&self, text: &str) {
        self.record(Call::Banner(text.into()));
    }
}

/// Countdown double that only fires when told to.
#[derive(Default)]
pub(crate) struct FakeCountdown {
    armed: Mutex<Option<u64>>,
    starts: Mutex<Vec<u64>>,
}

impl FakeCountdown {
    pub(crate) fn starts(&self) -> Vec<u64> {
        self.starts.lock().clone()
    }

    /// Simulates the deadline passing.
    pub(crate) fn elapse(&self) {
        *self.armed.lock() = None;
    }
}

impl Countdown for FakeCountdown {
    fn is_active(&self) -> bool {
        self.armed.lock().is_some()
    }

    fn remaining(&self) -> u64 {
        self.armed.lock().unwrap_or(0)
    }

    fn start(&self, ticks: u64) {
        *self.armed.lock() = Some(ticks);
        self.starts.lock().push(ticks);
    }

    fn stop(&self) {
        *self.armed.lock() = None;
    }
}

pub(crate) struct Harness {
    pub rt: Arc<Runtime>,
    pub platform: Arc<RecordingPlatform>,
    pub clock: Arc<ManualClock>,
    pub countdown: Arc<FakeCountdown>,
}

/// A runtime with no threads running, a manual clock at tick 1000 and a fake
/// countdown.
pub(crate) fn harness() -> Harness {
    harness_with(RuntimeConfig::builder().welcome_message(None).build())
}

pub(crate) fn harness_with(config: RuntimeConfig) -> Harness {
    let platform = RecordingPlatform::new();
    let clock = Arc::new(ManualClock::new(Tick(1000)));
    let countdown = Arc::new(FakeCountdown::default());
    let rt = Runtime::builder(platform.clone())
        .config(config)
        .clock(clock.clone())
        .countdown(countdown.clone())
        .build()
        .unwrap();

    Harness {
        rt,
        platform,
        clock,
        countdown,
    }
}
