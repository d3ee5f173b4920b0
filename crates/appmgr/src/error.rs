//! Recoverable error types.
//!
//! Contract violations by callers are not represented here: they panic at the
//! point of detection.

use thiserror::Error;

use crate::thread::{ThreadKind, ThreadStatus};

/// Errors from a bounded message queue.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("message queue is full")]
    Full,
    #[error("message queue is empty")]
    Empty,
    #[error("timed out waiting for a message")]
    TimedOut,
}

/// Why a posted message was dropped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostError {
    #[error("{thread} context is not accepting messages (status {status:?})")]
    NotRunning {
        thread: ThreadKind,
        status: ThreadStatus,
    },
    #[error("{thread} queue rejected message: {source}")]
    Queue {
        thread: ThreadKind,
        #[source]
        source: QueueError,
    },
}

/// Errors raised while bringing contexts up.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("failed to spawn context thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("overlay manager already started")]
    OverlayAlreadyStarted,
    #[error("overlay manager exited before finishing initialisation")]
    OverlayInitFailed,
}
