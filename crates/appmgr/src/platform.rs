//! Services the scheduling core consumes from the rest of the system.
//!
//! The window stack, click recogniser, graphics context and display driver
//! all live outside this crate. [`Platform`] is the seam through which the
//! run-loops reach them. Housekeeping hooks have no-op defaults; everything
//! involved in producing a frame must be provided.

use crate::message::{ButtonId, ClickHandler};
use crate::thread::ThreadKind;
use crate::window::Window;

pub trait Platform: Send + Sync + 'static {
    /// Number of windows on the main application's stack.
    fn window_count(&self) -> usize;

    /// Pops the top window of the main stack.
    fn pop_window(&self);

    /// Marks the whole main stack as needing a repaint.
    fn mark_dirty(&self);

    /// Draws the main stack; returns true if anything changed.
    fn draw_window_stack(&self) -> bool;

    /// Rasterises one overlay window on top of the current frame.
    ///
    /// Runs on the overlay context with the overlay stack locked. The
    /// implementation must not call back into the runtime's overlay queries
    /// (`overlay_count`, `overlay_top_window`, `overlay_accepts_keypress` and
    /// the like) or it will deadlock.
    fn draw_overlay_window(&self, window: &Window);

    /// Flushes the composited frame to the display.
    fn flush_display(&self);

    /// Binds `handler` to single clicks of `button`.
    fn subscribe_click(&self, button: ButtonId, handler: ClickHandler);

    /// Drops every click binding.
    fn unsubscribe_all_buttons(&self);

    /// Reinstalls the click configuration of the top main-stack window.
    fn load_main_click_config(&self) {}

    /// Drops cached font and shape data that may point into a previous
    /// occupant's heap.
    fn reset_caches(&self) {}

    /// Drops passive data subscriptions (tick service, connection service).
    fn unsubscribe_services(&self) {}

    /// (Re)initialises the graphics context for a context.
    fn init_graphics(&self, _thread: ThreadKind) {}

    /// Shows a short notification banner.
    fn show_small_message(&self, _text: &str) {}
}
