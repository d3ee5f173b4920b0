//! The slice of a UI window the scheduling core needs to see.
//!
//! Rasterising a window is the platform's job; the core only tracks whether
//! a window is scheduled for render, whether it claims click configuration,
//! and what to run when it is unloaded.

use core::fmt;

use crate::platform::Platform;
use crate::sync::Arc;

/// Installs a window's click bindings through the platform.
pub type ClickConfigProvider = Arc<dyn Fn(&dyn Platform) + Send + Sync>;

/// Runs when a window is torn down.
pub type UnloadHandler = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Background {
    #[default]
    Clear,
    Solid(u8),
}

#[derive(Default)]
pub struct Window {
    background: Background,
    is_overlay: bool,
    render_scheduled: bool,
    click_config_provider: Option<ClickConfigProvider>,
    unload: Option<UnloadHandler>,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transparent overlay window already scheduled for render.
    pub(crate) fn overlay() -> Self {
        Self {
            background: Background::Clear,
            is_overlay: true,
            render_scheduled: true,
            ..Self::default()
        }
    }

    pub fn background(&self) -> Background {
        self.background
    }

    pub fn set_background(&mut self, background: Background) {
        self.background = background;
    }

    pub fn is_overlay(&self) -> bool {
        self.is_overlay
    }

    pub fn is_render_scheduled(&self) -> bool {
        self.render_scheduled
    }

    pub fn schedule_render(&mut self) {
        self.render_scheduled = true;
    }

    pub(crate) fn clear_render_scheduled(&mut self) {
        self.render_scheduled = false;
    }

    pub fn set_click_config_provider(&mut self, provider: ClickConfigProvider) {
        self.click_config_provider = Some(provider);
    }

    pub fn clear_click_config_provider(&mut self) {
        self.click_config_provider = None;
    }

    /// Whether this window wants button input.
    pub fn has_click_config(&self) -> bool {
        self.click_config_provider.is_some()
    }

    pub fn click_config_provider(&self) -> Option<ClickConfigProvider> {
        self.click_config_provider.clone()
    }

    pub fn set_unload_handler(&mut self, handler: UnloadHandler) {
        self.unload = Some(handler);
    }

    /// Runs the unload hook, at most once.
    pub(crate) fn unload(&mut self) {
        if let Some(handler) = self.unload.take() {
            handler();
        }
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("background", &self.background)
            .field("is_overlay", &self.is_overlay)
            .field("render_scheduled", &self.render_scheduled)
            .field("has_click_config", &self.has_click_config())
            .finish()
    }
}
