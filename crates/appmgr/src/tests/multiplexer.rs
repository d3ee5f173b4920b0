use std::time::{Duration, Instant};

use crate::config::RuntimeConfig;
use crate::message::Message;
use crate::multiplexer::Schedule;
use crate::tests::{harness, harness_with};
use crate::thread::{ThreadKind, ThreadStatus};
use crate::time::{Countdown, Timeout};

fn running(h: &crate::tests::Harness) {
    h.rt.thread(ThreadKind::MainApp).set_status(ThreadStatus::Runloop);
    h.rt.thread(ThreadKind::Overlay).set_status(ThreadStatus::Runloop);
}

#[test]
fn sooner_overlay_timer_takes_the_countdown() {
    let h = harness();
    running(&h);
    let now = h.rt.now();

    h.rt.thread(ThreadKind::MainApp).add_timer(now.after(200), Box::new(|| {}));
    h.rt.thread(ThreadKind::Overlay).add_timer(now.after(80), Box::new(|| {}));

    assert_eq!(
        h.rt.rearm_timers(),
        Schedule::Armed {
            thread: ThreadKind::Overlay,
            ticks: 80
        }
    );
    assert_eq!(h.rt.multiplexer().route(), ThreadKind::Overlay);
    assert_eq!(h.countdown.starts(), [80]);
}

#[test]
fn armed_countdown_is_only_shortened() {
    let h = harness();
    running(&h);
    let ctx = h.rt.context(ThreadKind::MainApp);
    let overlay = h.rt.context(ThreadKind::Overlay);

    ctx.add_timer(100, || {});
    assert_eq!(h.countdown.starts(), [100]);

    overlay.add_timer(150, || {});
    assert_eq!(
        h.rt.rearm_timers(),
        Schedule::Unchanged {
            thread: ThreadKind::MainApp
        }
    );
    assert_eq!(h.countdown.starts(), [100]);

    overlay.add_timer(30, || {});
    assert_eq!(h.countdown.starts(), [100, 30]);
    assert_eq!(h.rt.multiplexer().route(), ThreadKind::Overlay);
}

#[test]
fn equal_deadlines_route_to_main_app() {
    let h = harness();
    running(&h);
    let now = h.rt.now();

    h.rt.thread(ThreadKind::Overlay).add_timer(now.after(50), Box::new(|| {}));
    h.rt.thread(ThreadKind::MainApp).add_timer(now.after(50), Box::new(|| {}));

    assert_eq!(
        h.rt.rearm_timers(),
        Schedule::Armed {
            thread: ThreadKind::MainApp,
            ticks: 50
        }
    );
}

#[test]
fn due_timer_arms_for_one_tick() {
    let h = harness();
    running(&h);
    let now = h.rt.now();
    h.rt.thread(ThreadKind::MainApp).add_timer(now, Box::new(|| {}));

    assert_eq!(
        h.rt.rearm_timers(),
        Schedule::Armed {
            thread: ThreadKind::MainApp,
            ticks: 1
        }
    );
}

#[test]
fn removing_timer_rearms_for_the_next_head() {
    let h = harness();
    running(&h);
    let ctx = h.rt.context(ThreadKind::Overlay);

    let soon = ctx.add_timer(10, || {});
    ctx.add_timer(70, || {});
    assert_eq!(h.countdown.starts(), [10]);

    h.countdown.elapse();
    ctx.remove_timer(soon);
    assert_eq!(h.countdown.starts(), [10, 70]);
}

#[test]
#[should_panic(expected = "cannot be removed from the main-app context")]
fn removing_another_contexts_timer_panics() {
    let h = harness();
    running(&h);
    let overlay_timer = h.rt.context(ThreadKind::Overlay).add_timer(10, || {});
    h.rt.context(ThreadKind::MainApp).remove_timer(overlay_timer);
}

#[test]
fn contexts_that_cannot_be_woken_are_ignored() {
    let h = harness();
    let now = h.rt.now();
    h.rt.thread(ThreadKind::MainApp).set_status(ThreadStatus::Loaded);
    h.rt.thread(ThreadKind::MainApp).add_timer(now.after(5), Box::new(|| {}));

    assert_eq!(h.rt.rearm_timers(), Schedule::Idle);
    assert!(!h.countdown.is_active());
}

#[test]
fn expiry_wakes_the_routed_context() {
    let h = harness();
    running(&h);
    h.rt.context(ThreadKind::Overlay).add_timer(5, || {});

    h.countdown.elapse();
    h.rt.countdown_expired();

    assert!(matches!(
        h.rt.overlay_queue().recv(Timeout::Immediate),
        Ok(Message::TimerFired)
    ));
    assert!(h.rt.app_queue().is_empty());
}

#[test]
fn undeliverable_overlay_expiry_is_rearmed() {
    let h = harness_with(
        RuntimeConfig::builder()
            .welcome_message(None)
            .overlay_post_timeout_ticks(1)
            .build(),
    );
    running(&h);
    let ctx = h.rt.context(ThreadKind::Overlay);
    ctx.add_timer(5, || {});
    // Occupy the single overlay slot so delivery fails.
    h.rt.overlay_queue().try_send(Message::Draw { force: false }).unwrap();

    h.countdown.elapse();
    h.clock.advance(5);
    h.rt.countdown_expired();

    assert_eq!(h.countdown.starts(), [5, 1]);
    assert_eq!(h.rt.multiplexer().route(), ThreadKind::Overlay);
}

#[test]
fn app_wake_never_waits_for_a_full_queue() {
    let h = harness();
    running(&h);
    h.rt.context(ThreadKind::MainApp).add_timer(5, || {});
    while !h.rt.app_queue().is_full() {
        h.rt.app_queue().try_send(Message::Draw { force: false }).unwrap();
    }

    h.countdown.elapse();
    let started = Instant::now();
    h.rt.countdown_expired();

    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(h.rt.app_queue().len(), h.rt.app_queue().capacity());
    assert!(!matches!(
        h.rt.app_queue().recv(Timeout::Immediate),
        Ok(Message::TimerFired)
    ));
}
