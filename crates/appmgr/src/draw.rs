//! Frame production on the Main-App context.
//!
//! The application's window stack is drawn first. When overlays exist the
//! overlay context is asked to paint over it and the Main-App context blocks
//! on the draw rendezvous until it has, so the flushed frame always contains
//! both.

use log::{debug, trace, warn};

use crate::runtime::Runtime;
use crate::time::ticks_to_duration;

/// Draws and flushes one frame. Returns true if the display was flushed.
///
/// If the framebuffer cannot be acquired within the configured wait, the
/// frame is skipped.
pub(crate) fn draw_frame(rt: &Runtime, force: bool) -> bool {
    let config = rt.config();
    let wait = ticks_to_duration(config.framebuffer_wait_ticks, config.tick_period);
    let Some(_framebuffer) = rt.framebuffer().try_lock_for(wait) else {
        debug!(target: "draw", "framebuffer busy, skipping frame");
        return false;
    };

    let platform = rt.platform();
    if force {
        platform.mark_dirty();
    }
    let mut changed = platform.draw_window_stack();

    if rt.overlay_count() > 0 {
        match rt.overlay_draw() {
            Ok(()) => changed = true,
            Err(err) => warn!(target: "draw", "overlay draw not requested: {err}"),
        }
    }

    if changed {
        platform.flush_display();
        trace!(target: "draw", "frame flushed");
    }
    changed
}
