//! Runtime configuration.

use core::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the scheduling runtime.
///
/// Timeouts are expressed in ticks of `tick_period`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Wall time of one tick.
    pub tick_period: Duration,
    /// Grace period an unloading application gets before the supervisor may
    /// force-terminate it.
    pub shutdown_grace_ticks: u64,
    /// How long a poster waits for room in the Main-App queue.
    pub post_timeout_ticks: u64,
    /// How long a poster waits for room in the overlay queue.
    pub overlay_post_timeout_ticks: u64,
    /// How long the draw coordinator waits for the framebuffer.
    pub framebuffer_wait_ticks: u64,
    /// How long an exiting application waits for room in the supervisor queue.
    pub supervisor_post_timeout_ticks: u64,
    /// Application launched by the default select and back bindings.
    pub system_app: String,
    /// Banner shown the first time any application enters its run-loop.
    pub welcome_message: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(1),
            shutdown_grace_ticks: 5000,
            post_timeout_ticks: 1000,
            overlay_post_timeout_ticks: 1000,
            framebuffer_wait_ticks: 0,
            supervisor_post_timeout_ticks: 100,
            system_app: "System".into(),
            welcome_message: Some("Welcome".into()),
        }
    }
}

impl RuntimeConfig {
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }
}

/// Builder for [`RuntimeConfig`].
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    /// Sets the tick period. Must be non-zero.
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.config.tick_period = period;
        self
    }

    pub fn shutdown_grace_ticks(mut self, ticks: u64) -> Self {
        self.config.shutdown_grace_ticks = ticks;
        self
    }

    pub fn post_timeout_ticks(mut self, ticks: u64) -> Self {
        self.config.post_timeout_ticks = ticks;
        self
    }

    pub fn overlay_post_timeout_ticks(mut self, ticks: u64) -> Self {
        self.config.overlay_post_timeout_ticks = ticks;
        self
    }

    pub fn framebuffer_wait_ticks(mut self, ticks: u64) -> Self {
        self.config.framebuffer_wait_ticks = ticks;
        self
    }

    pub fn supervisor_post_timeout_ticks(mut self, ticks: u64) -> Self {
        self.config.supervisor_post_timeout_ticks = ticks;
        self
    }

    pub fn system_app(mut self, name: impl Into<String>) -> Self {
        self.config.system_app = name.into();
        self
    }

    /// Sets the first-run banner; `None` disables it.
    pub fn welcome_message(mut self, message: Option<String>) -> Self {
        self.config.welcome_message = message;
        self
    }

    pub fn build(self) -> RuntimeConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_watch_firmware() {
        let config = RuntimeConfig::default();
        assert_eq!(config.tick_period, Duration::from_millis(1));
        assert_eq!(config.shutdown_grace_ticks, 5000);
        assert_eq!(config.framebuffer_wait_ticks, 0);
        assert_eq!(config.system_app, "System");
        assert_eq!(config.welcome_message.as_deref(), Some("Welcome"));
    }

    #[test]
    fn builder_overrides_fields() {
        let config = RuntimeConfig::builder()
            .tick_period(Duration::from_micros(500))
            .shutdown_grace_ticks(10)
            .system_app("Launcher")
            .welcome_message(None)
            .build();

        assert_eq!(config.tick_period, Duration::from_micros(500));
        assert_eq!(config.shutdown_grace_ticks, 10);
        assert_eq!(config.system_app, "Launcher");
        assert!(config.welcome_message.is_none());
        assert_eq!(config.post_timeout_ticks, 1000);
    }
}
