//! Messages exchanged between cooperative contexts.
//!
//! Payloads move with the message: the sender gives up the closure, button
//! event or window handle, and the receiving context owns it from then on.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::overlay::{OverlayCreateCallback, OverlayId, OverlayUserContext};
use crate::sync::Arc;
use crate::thread::ThreadKind;

/// Physical buttons.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonId {
    Back,
    Up,
    Select,
    Down,
}

/// Handler bound to a button by a click configuration.
pub type ClickHandler = Arc<dyn Fn(ButtonId) + Send + Sync>;

/// A recognised click together with the handler bound to it.
#[derive(Clone)]
pub struct ButtonEvent {
    pub button: ButtonId,
    pub handler: ClickHandler,
}

impl ButtonEvent {
    pub fn new(button: ButtonId, handler: ClickHandler) -> Self {
        Self { button, handler }
    }

    /// Runs the bound handler.
    pub fn dispatch(&self) {
        (self.handler)(self.button);
    }
}

impl fmt::Debug for ButtonEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ButtonEvent")
            .field("button", &self.button)
            .finish_non_exhaustive()
    }
}

/// Command tag of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Button,
    Quit,
    Draw,
    TimerFired,
    OverlayCreate,
    OverlayDestroy,
}

/// A message posted to exactly one context's queue.
pub enum Message {
    Button(ButtonEvent),
    Quit,
    /// Draw a frame; `force` repaints the whole window stack.
    Draw { force: bool },
    /// The shared countdown fired on behalf of the receiving context.
    TimerFired,
    OverlayCreate {
        callback: OverlayCreateCallback,
        context: Option<OverlayUserContext>,
    },
    OverlayDestroy(OverlayId),
}

impl Message {
    pub fn command(&self) -> Command {
        match self {
            Self::Button(_) => Command::Button,
            Self::Quit => Command::Quit,
            Self::Draw { .. } => Command::Draw,
            Self::TimerFired => Command::TimerFired,
            Self::OverlayCreate { .. } => Command::OverlayCreate,
            Self::OverlayDestroy(_) => Command::OverlayDestroy,
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Button(event) => f.debug_tuple("Button").field(event).finish(),
            Self::Quit => f.write_str("Quit"),
            Self::Draw { force } => f.debug_struct("Draw").field("force", force).finish(),
            Self::TimerFired => f.write_str("TimerFired"),
            Self::OverlayCreate { context, .. } => f
                .debug_struct("OverlayCreate")
                .field("has_context", &context.is_some())
                .finish_non_exhaustive(),
            Self::OverlayDestroy(id) => f.debug_tuple("OverlayDestroy").field(id).finish(),
        }
    }
}

/// Notifications for the supervisor that owns the OS threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorMessage {
    /// The context finished teardown and is parked awaiting termination.
    AppQuitClean { thread: ThreadKind },
    /// A default click binding asked for another application to be started.
    StartApp { name: String },
}
