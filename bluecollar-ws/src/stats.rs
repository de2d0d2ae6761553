use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters exposed by the WS gateway process (§4.7 "Stats
/// counters"). `connections_handled` is monotonic; the others track the
/// current live count and go up and down with connect/disconnect.
#[derive(Default)]
pub struct Stats {
    connections_handled: AtomicU64,
    connections_open: AtomicU64,
    pubsub_connections_open: AtomicU64,
    pubsub_events_forwarded: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connect(&self) {
        self.connections_handled.fetch_add(1, Ordering::Relaxed);
        self.connections_open.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnect(&self) {
        self.connections_open.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_pubsub_open(&self) {
        self.pubsub_connections_open.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pubsub_close(&self) {
        self.pubsub_connections_open.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_event_forwarded(&self) {
        self.pubsub_events_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connections_handled(&self) -> u64 {
        self.connections_handled.load(Ordering::Relaxed)
    }

    pub fn connections_open(&self) -> u64 {
        self.connections_open.load(Ordering::Relaxed)
    }

    pub fn pubsub_connections_open(&self) -> u64 {
        self.pubsub_connections_open.load(Ordering::Relaxed)
    }

    pub fn pubsub_events_forwarded(&self) -> u64 {
        self.pubsub_events_forwarded.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connections_handled_is_monotonic_across_disconnects() {
        let stats = Stats::new();
        stats.record_connect();
        stats.record_disconnect();
        stats.record_connect();
        assert_eq!(stats.connections_handled(), 2);
        assert_eq!(stats.connections_open(), 1);
    }
}
