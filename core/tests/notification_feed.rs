//! The notification feed is decoration: it posts on its own timer,
//! stops at completion and never moves the simulation.

use std::sync::{Arc, Mutex};

use stagesim_core::{
    collaborator::NotificationSink,
    config::SimConfig,
    engine::SimEngine,
    event::SimEvent,
    notification::{Notification, NotificationSettings},
    types::Direction,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Test timings with a feed that posts every 2 ticks.
fn feed_config(enabled: bool) -> SimConfig {
    SimConfig {
        notifications: NotificationSettings { enabled, interval_ms: 200, probability: 1.0 },
        ..SimConfig::default_test()
    }
}

fn make_engine(run_id: &str, seed: u64, enabled: bool) -> SimEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    SimEngine::build(run_id.into(), seed, feed_config(enabled)).unwrap()
}

fn play_through(engine: &mut SimEngine) -> Vec<SimEvent> {
    let budget = engine.stage_tick_budget();
    let mut events = engine.start().unwrap();
    for stage in 0..engine.stage_count() {
        if stage % 2 == 1 {
            events.extend(engine.make_selection(Direction::Down).unwrap());
        }
        events.extend(engine.run_until_settled(budget).unwrap());
        events.extend(engine.acknowledge_stage_complete().unwrap());
    }
    events
}

fn posted(events: &[SimEvent]) -> Vec<Notification> {
    events
        .iter()
        .filter_map(|e| match e {
            SimEvent::NotificationPosted { notification, .. } => Some(notification.clone()),
            _ => None,
        })
        .collect()
}

#[derive(Clone, Default)]
struct Sink {
    received: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationSink for Sink {
    fn post(&mut self, notification: &Notification) {
        self.received.lock().unwrap().push(notification.clone());
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// While a settled stage waits for acknowledgement only the feed is
/// running. It posts on schedule and the state does not move.
#[test]
fn feed_never_changes_simulation_state() {
    let mut engine = make_engine("feed-state", 17, true);
    let budget = engine.stage_tick_budget();
    engine.start().unwrap();
    engine.run_until_settled(budget).unwrap();
    assert!(engine.state().stage_complete);

    let before = engine.state().clone();
    let wager = engine.current_wager();

    let events = engine.run_ticks(40).unwrap();
    assert_eq!(posted(&events).len(), 20);
    assert!(events.iter().all(|e| matches!(e, SimEvent::NotificationPosted { .. })));

    assert_eq!(*engine.state(), before);
    assert_eq!(engine.current_wager(), wager);
    assert_eq!(engine.pending_timers(), 1, "only the feed timer should be armed");
}

#[test]
fn feed_stops_at_completion() {
    let mut engine = make_engine("feed-stop", 5, true);
    let events = play_through(&mut engine);
    assert!(engine.state().simulation_complete);
    assert!(!posted(&events).is_empty());

    assert_eq!(engine.pending_timers(), 0);
    assert!(engine.run_ticks(100).unwrap().is_empty());
    assert_eq!(
        engine.event_log().count_of("notification_posted"),
        posted(&events).len()
    );
}

/// Same seed with the feed on and off: every non-feed event matches.
#[test]
fn enabling_feed_leaves_results_and_charts_untouched() {
    let strip = |engine: &SimEngine| -> Vec<String> {
        engine
            .event_log()
            .entries()
            .iter()
            .filter(|e| e.event_type != "notification_posted")
            .map(|e| e.payload.clone())
            .collect()
    };

    let mut with_feed = make_engine("feed-compare", 99, true);
    play_through(&mut with_feed);
    let mut without_feed = make_engine("feed-compare", 99, false);
    play_through(&mut without_feed);

    assert!(with_feed.event_log().count_of("notification_posted") > 0);
    assert_eq!(without_feed.event_log().count_of("notification_posted"), 0);
    assert_eq!(strip(&with_feed), strip(&without_feed));
    assert_eq!(with_feed.state(), without_feed.state());
}

#[test]
fn sink_receives_every_posted_notification() {
    let mut engine = make_engine("feed-sink", 3, true);
    let sink = Sink::default();
    engine.set_notification_sink(Box::new(sink.clone()));

    let events = play_through(&mut engine);
    assert_eq!(*sink.received.lock().unwrap(), posted(&events));
}

#[test]
fn restart_and_teardown_manage_the_feed_timer() {
    let mut engine = make_engine("feed-restart", 8, true);
    engine.start().unwrap();
    engine.run_ticks(1).unwrap();
    assert_eq!(engine.pending_timers(), 2, "countdown and feed");

    let events = engine.restart().unwrap();
    assert!(matches!(
        events.first(),
        Some(SimEvent::SimulationRestarted { cancelled_timers: 2, .. })
    ));
    assert_eq!(engine.pending_timers(), 2, "feed must be re-armed exactly once");

    assert_eq!(engine.teardown(), 2);
    assert!(engine.run_ticks(20).unwrap().is_empty());
}

#[test]
fn same_seed_posts_the_same_feed() {
    let mut a = make_engine("feed-det", 1234, true);
    let mut b = make_engine("feed-det", 1234, true);
    assert_eq!(posted(&play_through(&mut a)), posted(&play_through(&mut b)));
}
