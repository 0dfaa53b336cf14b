// tests/watch_queue.rs

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use sequencer::WatchQueue;

#[test]
fn duplicate_pushes_are_reported_once() {
    let queue = WatchQueue::new();

    assert!(queue.push("/tmp/a.rhai"));
    assert!(!queue.push("/tmp/a.rhai"));
    assert!(queue.push("/tmp/b.rhai"));

    assert_eq!(queue.len(), 2);
    assert!(queue.contains(&PathBuf::from("/tmp/a.rhai")));
}

#[test]
fn drain_empties_the_queue_and_allows_requeueing() {
    let queue = WatchQueue::new();
    queue.push("/tmp/a.rhai");
    queue.push("/tmp/b.rhai");

    let drained = queue.drain();
    assert_eq!(
        drained,
        vec![PathBuf::from("/tmp/a.rhai"), PathBuf::from("/tmp/b.rhai")]
    );
    assert!(queue.is_empty());
    assert!(queue.drain().is_empty());

    // Once drained, the same path is queued again.
    assert!(queue.push("/tmp/a.rhai"));
    assert_eq!(queue.len(), 1);
}

#[test]
fn concurrent_producers_never_duplicate_paths() {
    let queue = Arc::new(WatchQueue::new());

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..50 {
                    queue.push(format!("/tmp/file_{}.rhai", i % 10));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().expect("producer panicked");
    }

    let drained = queue.drain();
    let distinct: HashSet<_> = drained.iter().cloned().collect();
    assert_eq!(drained.len(), 10);
    assert_eq!(distinct.len(), 10);
}

proptest! {
    #[test]
    fn drain_returns_distinct_paths_in_first_arrival_order(
        pushes in proptest::collection::vec(0..8usize, 0..40)
    ) {
        let queue = WatchQueue::new();
        for i in &pushes {
            queue.push(format!("/watched/{i}.rhai"));
        }

        let mut expected: Vec<PathBuf> = Vec::new();
        for i in &pushes {
            let path = PathBuf::from(format!("/watched/{i}.rhai"));
            if !expected.contains(&path) {
                expected.push(path);
            }
        }

        prop_assert_eq!(queue.drain(), expected);
        prop_assert!(queue.is_empty());
    }
}
