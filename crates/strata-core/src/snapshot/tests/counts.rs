use super::*;

#[test]
fn channel_with_idle_clients_reports_zero_counts() {
    let daemon = test_daemon();
    let channel = daemon
        .get_or_create_topic("t")
        .get_or_create_channel("c")
        .unwrap();
    for id in 1..=3 {
        connect(&channel, id, &format!("client-{id}"));
    }

    let stats = daemon.get_stats();
    let channel = &stats[0].channels[0];
    assert_eq!(channel.message_count, 0);
    assert_eq!(channel.depth, 0);
    assert_eq!(channel.clients.len(), 3);
    let names: Vec<&str> = channel.clients.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["client-1", "client-2", "client-3"]);
}

#[test]
fn counters_match_live_state() {
    let daemon = test_daemon();
    let topic = daemon.get_or_create_topic("t");
    let channel = topic.get_or_create_channel("c").unwrap();
    connect(&channel, 1, "consumer");

    publish(&topic, 6);

    // 3 deliveries: one finished, one requeued with delay, one requeued now
    let a = channel.start_in_flight(1).unwrap().unwrap();
    let b = channel.start_in_flight(1).unwrap().unwrap();
    let c = channel.start_in_flight(1).unwrap().unwrap();
    channel.finish_message(a.id).unwrap();
    channel.requeue_message(b.id, Duration::from_secs(60)).unwrap();
    channel.requeue_message(c.id, Duration::ZERO).unwrap();

    // One more delivery that times out
    channel.start_in_flight(1).unwrap().unwrap();
    let later = Instant::now() + Duration::from_secs(120);
    assert_eq!(channel.process_in_flight(later, Duration::from_secs(60)), 1);

    // And one left in flight
    channel.start_in_flight(1).unwrap().unwrap();

    let stats = daemon.get_stats();
    let topic_stats = &stats[0];
    let channel_stats = &topic_stats.channels[0];

    assert_eq!(topic_stats.message_count, 6);
    assert_eq!(topic_stats.message_count, topic.message_count());
    assert_eq!(topic_stats.depth, topic.depth());
    assert_eq!(channel_stats.message_count, 6);
    assert_eq!(channel_stats.requeue_count, 2);
    assert_eq!(channel_stats.timeout_count, 1);
    assert_eq!(channel_stats.in_flight_count, 1);
    assert_eq!(channel_stats.in_flight_count, channel.in_flight_count());
    assert_eq!(channel_stats.deferred_count, 1);
    assert_eq!(channel_stats.deferred_count, channel.deferred_count());
    assert_eq!(channel_stats.depth, channel.depth());
    // 6 published - 1 finished - 1 deferred - 1 in flight
    assert_eq!(channel_stats.depth, 3);
}

#[test]
fn messages_before_first_channel_count_as_topic_depth() {
    let daemon = test_daemon();
    let topic = daemon.get_or_create_topic("t");
    publish(&topic, 2);

    let stats = daemon.get_stats();
    assert_eq!(stats[0].depth, 2);
    assert_eq!(stats[0].message_count, 2);
    assert!(stats[0].channels.is_empty());
}

#[test]
fn backend_depths_are_reported() {
    let backends = Arc::new(FixedBackends {
        topic: Arc::new(CountingBackend::new(0)),
        channel: Arc::new(CountingBackend::new(0)),
    });
    let daemon = Daemon::new(StatsConfig::default()).with_backends(backends.clone());
    daemon
        .get_or_create_topic("t")
        .get_or_create_channel("c")
        .unwrap();

    backends.topic.set_depth(120);
    backends.channel.set_depth(45);

    let stats = daemon.get_stats();
    assert_eq!(stats[0].backend_depth, 120);
    assert_eq!(stats[0].channels[0].backend_depth, 45);
}

#[test]
fn paused_channel_reported_regardless_of_counts() {
    let daemon = test_daemon();
    let topic = daemon.get_or_create_topic("t");
    let paused = topic.get_or_create_channel("paused").unwrap();
    topic.get_or_create_channel("running").unwrap();
    paused.pause().unwrap();

    let stats = daemon.get_stats();
    assert!(stats[0].channels[0].paused);
    assert_eq!(stats[0].channels[0].message_count, 0);
    assert!(!stats[0].channels[1].paused);

    publish(&topic, 3);
    let stats = daemon.get_stats();
    assert!(stats[0].channels[0].paused);
    assert_eq!(stats[0].channels[0].message_count, 3);

    paused.unpause().unwrap();
    assert!(!daemon.get_stats()[0].channels[0].paused);
}

#[test]
fn client_stats_pass_through() {
    let daemon = test_daemon();
    let channel = daemon
        .get_or_create_topic("t")
        .get_or_create_channel("c")
        .unwrap();
    let client = connect(&channel, 9, "worker");
    client.set_state(crate::registry::ClientState::Subscribed);
    client.set_ready_count(25);
    client.sending_message();
    client.sending_message();
    client.finished_message();

    let stats = daemon.get_stats();
    let reported = &stats[0].channels[0].clients[0];
    assert_eq!(reported, &client.stats());
    assert_eq!(reported.state, 3);
    assert_eq!(reported.ready_count, 25);
    assert_eq!(reported.in_flight_count, 1);
    assert_eq!(reported.message_count, 2);
    assert_eq!(reported.finish_count, 1);
    assert_eq!(reported.remote_address, "127.0.0.1:40009");
}

#[test]
fn snapshot_is_a_copy() {
    let daemon = test_daemon();
    let topic = daemon.get_or_create_topic("t");
    topic.get_or_create_channel("c").unwrap();

    let before = daemon.get_stats();
    publish(&topic, 4);

    assert_eq!(before[0].message_count, 0);
    assert_eq!(before[0].channels[0].depth, 0);
    assert_eq!(daemon.get_stats()[0].channels[0].depth, 4);
}

#[test]
fn client_counters_follow_channel_delivery() {
    let daemon = test_daemon();
    let topic = daemon.get_or_create_topic("t");
    let channel = topic.get_or_create_channel("c").unwrap();
    connect(&channel, 1, "consumer");
    publish(&topic, 3);

    deliver_and_finish(&channel, 1, 2);
    channel.start_in_flight(1).unwrap().unwrap();
    let later = Instant::now() + Duration::from_secs(120);
    assert_eq!(channel.process_in_flight(later, Duration::from_secs(60)), 1);

    let stats = daemon.get_stats();
    let channel_stats = &stats[0].channels[0];
    let client = &channel_stats.clients[0];
    assert_eq!(channel_stats.message_count, 3);
    assert_eq!(channel_stats.timeout_count, 1);
    assert_eq!(client.message_count, 3);
    assert_eq!(client.finish_count, 2);
    assert_eq!(client.in_flight_count, 0);
    assert_eq!(client.in_flight_count, channel_stats.in_flight_count as i64);
}

#[test]
fn client_in_flight_matches_channel_per_client() {
    let daemon = test_daemon();
    let topic = daemon.get_or_create_topic("t");
    let channel = topic.get_or_create_channel("c").unwrap();
    connect(&channel, 1, "a");
    connect(&channel, 2, "b");
    publish(&topic, 5);

    channel.start_in_flight(1).unwrap().unwrap();
    channel.start_in_flight(2).unwrap().unwrap();
    let requeued = channel.start_in_flight(2).unwrap().unwrap();
    channel
        .requeue_message(requeued.id, Duration::from_secs(30))
        .unwrap();

    let stats = daemon.get_stats();
    let channel_stats = &stats[0].channels[0];
    let per_client: i64 = channel_stats.clients.iter().map(|c| c.in_flight_count).sum();
    assert_eq!(per_client, channel_stats.in_flight_count as i64);
    assert_eq!(channel_stats.clients[1].message_count, 2);
    assert_eq!(channel_stats.clients[1].requeue_count, 1);
}
