// tests/watcher_factory.rs

use std::error::Error;
use std::time::Duration;

use sequencer::errors::SequencerError;
use sequencer::types::WatcherKind;
use sequencer::watch::event_support_available;
use sequencer::WatcherFactory;
use sequencer_test_utils::{init_tracing, SequenceDir};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn unnamed_watcher_prefers_events_when_available() -> TestResult {
    init_tracing();
    let factory = WatcherFactory::new();
    let expected = if event_support_available() {
        WatcherKind::Event
    } else {
        WatcherKind::Polling
    };

    assert_eq!(factory.preferred_kind(), expected);
    let watcher = factory.create(None, None)?;
    assert_eq!(watcher.kind(), expected);
    assert!(!watcher.is_watching());
    Ok(())
}

#[test]
fn unnamed_watcher_falls_back_to_polling() -> TestResult {
    init_tracing();
    let factory = WatcherFactory::without_event_support();
    assert!(!factory.event_available());

    let watcher = factory.create(None, None)?;
    assert_eq!(watcher.kind(), WatcherKind::Polling);
    Ok(())
}

#[test]
fn names_and_aliases_select_the_strategy() -> TestResult {
    init_tracing();
    let factory = WatcherFactory::without_event_support();

    assert_eq!(factory.create(Some("polling"), None)?.kind(), WatcherKind::Polling);
    assert_eq!(factory.create(Some("standalone"), None)?.kind(), WatcherKind::Polling);

    if event_support_available() {
        let factory = WatcherFactory::new();
        assert_eq!(factory.create(Some("event"), None)?.kind(), WatcherKind::Event);
        assert_eq!(factory.create(Some("inotify"), None)?.kind(), WatcherKind::Event);
    }
    Ok(())
}

#[test]
fn unknown_name_is_rejected() {
    init_tracing();
    let err = WatcherFactory::new()
        .create(Some("carrier-pigeon"), None)
        .expect_err("unknown watcher");
    match err {
        SequencerError::UnknownWatcher(name) => assert_eq!(name, "carrier-pigeon"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn event_watcher_without_backend_is_rejected() {
    init_tracing();
    let err = WatcherFactory::without_event_support()
        .create(Some("event"), None)
        .expect_err("event backend disabled");
    assert!(matches!(err, SequencerError::EventWatcherUnavailable), "got {err:?}");
}

#[test]
fn paths_seed_and_start_the_watcher() -> TestResult {
    init_tracing();
    let dir = SequenceDir::new();
    let a = dir.write("a", "fn a() { 1 }\n");
    let b = dir.write("b", "fn b() { 2 }\n");

    let factory = WatcherFactory::without_event_support().with_poll_interval(Duration::from_millis(5));
    assert_eq!(factory.poll_interval(), Duration::from_millis(5));

    let mut watcher = factory.create(Some("polling"), Some(&[b.clone(), a.clone()]))?;
    assert!(watcher.is_watching());
    assert_eq!(watcher.watched_files(), vec![a, b]);

    watcher.stop()?;
    Ok(())
}
