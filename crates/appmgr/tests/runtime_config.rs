//! Tests for RuntimeConfig and how the runtime applies it.

mod common;

use std::time::Duration;

use appmgr::{ManualClock, Runtime, RuntimeConfig, Tick};
use common::RecordingPlatform;
use std::sync::Arc;

#[test]
fn runtime_config_builder() {
    let config = RuntimeConfig::builder()
        .tick_period(Duration::from_millis(10))
        .shutdown_grace_ticks(500)
        .post_timeout_ticks(20)
        .overlay_post_timeout_ticks(30)
        .framebuffer_wait_ticks(2)
        .supervisor_post_timeout_ticks(5)
        .system_app("Launcher")
        .welcome_message(Some("Hi".into()))
        .build();

    assert_eq!(config.tick_period, Duration::from_millis(10));
    assert_eq!(config.shutdown_grace_ticks, 500);
    assert_eq!(config.post_timeout_ticks, 20);
    assert_eq!(config.overlay_post_timeout_ticks, 30);
    assert_eq!(config.framebuffer_wait_ticks, 2);
    assert_eq!(config.supervisor_post_timeout_ticks, 5);
    assert_eq!(config.system_app, "Launcher");
    assert_eq!(config.welcome_message.as_deref(), Some("Hi"));
}

#[test]
fn runtime_with_custom_config_and_clock() {
    let config = RuntimeConfig::builder().system_app("Launcher").build();
    let clock = Arc::new(ManualClock::new(Tick(42)));

    let rt = Runtime::builder(RecordingPlatform::new())
        .config(config)
        .clock(clock.clone())
        .build()
        .unwrap();

    assert_eq!(rt.config().system_app, "Launcher");
    assert_eq!(rt.now(), Tick(42));
    clock.advance(8);
    assert_eq!(rt.now(), Tick(50));
    assert_eq!(rt.overlay_count(), 0);
    assert!(!rt.is_shutting_down());
}

#[test]
#[should_panic(expected = "tick period must be non-zero")]
fn zero_tick_period_is_rejected() {
    let config = RuntimeConfig::builder()
        .tick_period(Duration::ZERO)
        .build();
    let _ = Runtime::builder(RecordingPlatform::new()).config(config).build();
}
