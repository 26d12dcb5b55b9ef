use super::*;

pub(super) fn test_daemon() -> Daemon {
    Daemon::new(StatsConfig::default())
}

/// Helper: subscribe a new client connection and return it.
pub(super) fn connect(channel: &Channel, id: ClientId, name: &str) -> Arc<ClientConnection> {
    let client = Arc::new(ClientConnection::new(
        id,
        "V2",
        format!("127.0.0.1:{}", 40_000 + id),
        name,
    ));
    channel.add_client(client.clone()).unwrap();
    client
}

/// Helper: publish `n` messages to a topic.
pub(super) fn publish(topic: &Topic, n: usize) {
    for i in 0..n {
        topic.put_message(Message::new(vec![i as u8])).unwrap();
    }
}

/// Helper: deliver `n` queued messages to a client and acknowledge them.
pub(super) fn deliver_and_finish(channel: &Channel, client_id: ClientId, n: usize) {
    for _ in 0..n {
        let msg = channel.start_in_flight(client_id).unwrap().unwrap();
        channel.finish_message(msg.id).unwrap();
    }
}

/// Helper: find a topic record by name.
pub(super) fn find_topic<'a>(stats: &'a [TopicStats], name: &str) -> &'a TopicStats {
    stats
        .iter()
        .find(|t| t.name == name)
        .unwrap_or_else(|| panic!("topic {name} missing from snapshot"))
}

/// Backend provider returning fixed depths for every topic and channel.
pub(super) struct FixedBackends {
    pub(super) topic: Arc<CountingBackend>,
    pub(super) channel: Arc<CountingBackend>,
}

impl BackendProvider for FixedBackends {
    fn topic_backend(&self, _topic: &str) -> Arc<dyn BackendQueue> {
        self.topic.clone()
    }

    fn channel_backend(&self, _topic: &str, _channel: &str) -> Arc<dyn BackendQueue> {
        self.channel.clone()
    }
}
