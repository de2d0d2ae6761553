//! In-memory `Broker` implementation.
//!
//! Used by the integration test suite and by any single-process demo that
//! doesn't want a Redis dependency. Lists use a `Mutex<VecDeque>` + `Notify`
//! pair per key; pub/sub is a single broadcast bus shared by every handle,
//! with each handle filtering to its own subscribed channel set — simpler
//! than per-channel receivers and behaviorally equivalent for our purposes.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex, Notify};

use crate::error::BrokerError;
use crate::traits::{Broker, PubSub, PubSubMessage};

const BUS_CAPACITY: usize = 4096;

struct ListEntry {
    queue: Mutex<VecDeque<Vec<u8>>>,
    notify: Notify,
}

impl ListEntry {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }
}

/// An in-process stand-in for Redis. Cloning shares state (it's an `Arc`
/// internally via its maps and bus).
pub struct InMemoryBroker {
    lists: DashMap<String, Arc<ListEntry>>,
    sets: DashMap<String, HashSet<String>>,
    bus: broadcast::Sender<PubSubMessage>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        let (bus, _rx) = broadcast::channel(BUS_CAPACITY);
        Self {
            lists: DashMap::new(),
            sets: DashMap::new(),
            bus,
        }
    }

    fn list_entry(&self, key: &str) -> Arc<ListEntry> {
        self.lists
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(ListEntry::new()))
            .clone()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn push(&self, key: &str, value: Vec<u8>) -> Result<(), BrokerError> {
        let entry = self.list_entry(key);
        entry.queue.lock().await.push_back(value);
        entry.notify.notify_waiters();
        Ok(())
    }

    async fn push_with_expiry(
        &self,
        key: &str,
        value: Vec<u8>,
        _ttl: Duration,
    ) -> Result<(), BrokerError> {
        // No background reaper in-process; orphaned reply channels just sit
        // in the map until the process exits. Fine for tests.
        self.push(key, value).await
    }

    async fn blocking_pop(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, BrokerError> {
        let entry = self.list_entry(key);
        let deadline = Instant::now() + timeout;
        loop {
            let notified = entry.notify.notified();
            if let Some(v) = entry.queue.lock().await.pop_front() {
                return Ok(Some(v));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), BrokerError> {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), BrokerError> {
        if let Some(mut set) = self.sets.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, BrokerError> {
        Ok(self
            .sets
            .get(key)
            .map(|set| set.contains(member))
            .unwrap_or(false))
    }

    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        // No subscribers is not an error — `send` failing just means nobody
        // is listening right now, matching Redis PUBLISH semantics.
        let _ = self.bus.send(PubSubMessage {
            channel: channel.to_string(),
            payload,
        });
        Ok(())
    }

    async fn subscribe(&self, channels: &[String]) -> Result<Box<dyn PubSub>, BrokerError> {
        let mut handle = InMemoryPubSub {
            subscribed: HashSet::new(),
            receiver: self.bus.subscribe(),
        };
        for channel in channels {
            handle.subscribed.insert(channel.clone());
        }
        Ok(Box::new(handle))
    }
}

struct InMemoryPubSub {
    subscribed: HashSet<String>,
    receiver: broadcast::Receiver<PubSubMessage>,
}

#[async_trait]
impl PubSub for InMemoryPubSub {
    async fn subscribe(&mut self, channel: &str) -> Result<(), BrokerError> {
        self.subscribed.insert(channel.to_string());
        Ok(())
    }

    async fn unsubscribe(&mut self, channel: &str) -> Result<(), BrokerError> {
        self.subscribed.remove(channel);
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<PubSubMessage>, BrokerError> {
        if self.subscribed.is_empty() {
            return Ok(None);
        }
        loop {
            match self.receiver.recv().await {
                Ok(msg) if self.subscribed.contains(&msg.channel) => return Ok(Some(msg)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }
}
