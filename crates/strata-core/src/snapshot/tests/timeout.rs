use std::sync::Barrier;
use std::thread;

use super::*;

const SHORT: Duration = Duration::from_millis(20);

fn unavailable_scope(result: SnapshotResult<Vec<TopicStats>>) -> String {
    match result {
        Err(SnapshotError::Unavailable { scope, waited }) => {
            assert_eq!(waited, SHORT);
            scope
        }
        Ok(stats) => panic!("expected timeout, got {} topics", stats.len()),
    }
}

#[test]
fn held_daemon_lock_times_out() {
    let daemon = test_daemon();
    daemon.get_or_create_topic("t");

    let _guard = daemon.topics.write();
    assert_eq!(unavailable_scope(daemon.try_get_stats(SHORT)), "daemon");
}

#[test]
fn held_topic_lock_times_out() {
    let daemon = test_daemon();
    let topic = daemon.get_or_create_topic("t");

    let _guard = topic.state.write();
    assert_eq!(unavailable_scope(daemon.try_get_stats(SHORT)), "topic t");
}

#[test]
fn held_channel_lock_times_out() {
    let daemon = test_daemon();
    let channel = daemon
        .get_or_create_topic("t")
        .get_or_create_channel("c")
        .unwrap();

    let _guard = channel.state.write();
    assert_eq!(unavailable_scope(daemon.try_get_stats(SHORT)), "channel t/c");
}

#[test]
fn timeout_discards_partial_results() {
    let daemon = test_daemon();
    daemon.get_or_create_topic("a").get_or_create_channel("x").unwrap();
    let blocked = daemon.get_or_create_topic("b");

    let guard = blocked.state.write();
    assert!(daemon.try_get_stats(SHORT).is_err());
    drop(guard);

    let stats = daemon.try_get_stats(SHORT).unwrap();
    assert_eq!(stats.len(), 2);
}

#[test]
fn blocking_collection_cannot_fail() {
    let daemon = test_daemon();
    for name in ["a", "b", "c"] {
        daemon.get_or_create_topic(name).get_or_create_channel("x").unwrap();
    }

    // The error type is uninhabited: a blocking walk always yields records
    let collected: Result<Vec<TopicStats>, Infallible> = daemon.collect(&Blocking);
    let topics = match collected {
        Ok(topics) => topics,
        Err(never) => match never {},
    };
    assert_eq!(topics.len(), 3);
    assert_eq!(topics, daemon.get_stats());
}

#[test]
fn uncontended_timed_snapshot_matches_blocking() {
    let daemon = test_daemon();
    let topic = daemon.get_or_create_topic("t");
    let channel = topic.get_or_create_channel("c").unwrap();
    connect(&channel, 1, "consumer");
    publish(&topic, 3);

    assert_eq!(daemon.try_get_stats(Duration::from_secs(1)).unwrap(), daemon.get_stats());
}

#[test]
fn snapshot_uses_configured_timeout() {
    let config = StatsConfig::from_toml_str("[snapshot]\nlock_timeout_ms = 20\n").unwrap();
    let daemon = Daemon::new(config);
    let topic = daemon.get_or_create_topic("t");

    let guard = topic.state.write();
    assert_eq!(unavailable_scope(daemon.snapshot()), "topic t");
    drop(guard);

    assert_eq!(daemon.snapshot().unwrap().len(), 1);
}

#[test]
fn snapshot_without_configured_timeout_blocks() {
    let daemon = test_daemon();
    daemon.get_or_create_topic("t");
    assert_eq!(daemon.snapshot().unwrap(), daemon.get_stats());
}

#[test]
fn blocking_snapshot_waits_for_writer() {
    let daemon = test_daemon();
    let channel = daemon
        .get_or_create_topic("t")
        .get_or_create_channel("c")
        .unwrap();
    let held = Barrier::new(2);

    thread::scope(|s| {
        s.spawn(|| {
            let mut state = channel.state.write();
            held.wait();
            thread::sleep(Duration::from_millis(50));
            state.paused = true;
        });

        held.wait();
        let stats = daemon.get_stats();
        // The writer's change is visible: the read waited for the lock
        assert!(stats[0].channels[0].paused);
    });
}
