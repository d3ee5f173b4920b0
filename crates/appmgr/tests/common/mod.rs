#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use appmgr::{ButtonId, ClickHandler, Platform, ThreadKind, Window};
use log::{Level, Log, Metadata, Record};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DrawStack,
    DrawOverlay,
    Flush,
    MarkDirty,
    Banner(String),
    InitGraphics(ThreadKind),
}

/// Records the calls the runtime makes and the click bindings it installs.
#[derive(Default)]
pub struct RecordingPlatform {
    calls: Mutex<Vec<Call>>,
    clicks: Mutex<HashMap<ButtonId, ClickHandler>>,
}

impl RecordingPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn handler(&self, button: ButtonId) -> Option<ClickHandler> {
        self.clicks.lock().get(&button).cloned()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl Platform for RecordingPlatform {
    fn window_count(&self) -> usize {
        1
    }

    fn pop_window(&self) {}

    fn mark_dirty(&self) {
        self.record(Call::MarkDirty);
    }

    fn draw_window_stack(&self) -> bool {
        self.record(Call::DrawStack);
        true
    }

    fn draw_overlay_window(&self, _window: &Window) {
        self.record(Call::DrawOverlay);
    }

    fn flush_display(&self) {
        self.record(Call::Flush);
    }

    fn subscribe_click(&self, button: ButtonId, handler: ClickHandler) {
        self.clicks.lock().insert(button, handler);
    }

    fn unsubscribe_all_buttons(&self) {
        self.clicks.lock().clear();
    }

    fn init_graphics(&self, thread: ThreadKind) {
        self.record(Call::InitGraphics(thread));
    }

    fn show_small_message(&self, text: &str) {
        self.record(Call::Banner(text.into()));
    }
}

/// Polls `condition` until it holds or two seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

pub struct CapturingLogger {
    records: Mutex<Vec<(Level, String, String)>>,
}

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records.lock().push((
            record.level(),
            record.target().to_owned(),
            record.args().to_string(),
        ));
    }

    fn flush(&self) {}
}

pub static LOGGER: Lazy<CapturingLogger> = Lazy::new(|| CapturingLogger {
    records: Mutex::new(Vec::new()),
});

/// Installs the capturing logger once per test binary.
pub fn init_logger() -> &'static CapturingLogger {
    let _ = log::set_logger(&*LOGGER);
    log::set_max_level(log::LevelFilter::Trace);
    &LOGGER
}

impl CapturingLogger {
    pub fn contains(&self, target: &str, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|(_, t, message)| t == target && message.contains(needle))
    }
}
