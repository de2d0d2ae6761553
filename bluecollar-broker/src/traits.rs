use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrokerError;

/// A message received on a subscribed pub/sub channel.
#[derive(Debug, Clone)]
pub struct PubSubMessage {
    pub channel: String,
    pub payload: Vec<u8>,
}

/// A live pub/sub handle for one client.
///
/// One of these lives per connected WebSocket client (§4.7). Subscribing and
/// unsubscribing mutate the same handle; `next_message` is called from the
/// client's pump task in a loop.
#[async_trait]
pub trait PubSub: Send {
    async fn subscribe(&mut self, channel: &str) -> Result<(), BrokerError>;
    async fn unsubscribe(&mut self, channel: &str) -> Result<(), BrokerError>;

    /// Wait for the next message on any subscribed channel. Returns `Ok(None)`
    /// only if the handle has no subscriptions at all and should not be polled.
    async fn next_message(&mut self) -> Result<Option<PubSubMessage>, BrokerError>;
}

/// Thin wrapper over the queue/set/pub-sub primitives BlueCollar needs from
/// its broker (§1, §6). The reference broker is Redis; the contract is what
/// matters, so every gateway and worker is written against this trait rather
/// than a concrete client.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Push a value onto the tail of a list (work queue or reply channel).
    async fn push(&self, key: &str, value: Vec<u8>) -> Result<(), BrokerError>;

    /// Push a value onto a list and set the list to expire after `ttl`.
    /// Used for reply channels so orphaned ones (gateway gave up) are
    /// eventually reaped by the broker itself (§7 "Orphan reply channels").
    async fn push_with_expiry(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), BrokerError>;

    /// Block popping the head of a list for up to `timeout`. `Ok(None)` means
    /// the timeout elapsed with nothing to pop.
    async fn blocking_pop(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, BrokerError>;

    /// Add `member` to a set (worker roster registration).
    async fn set_add(&self, key: &str, member: &str) -> Result<(), BrokerError>;

    /// Remove `member` from a set (worker roster deregistration).
    async fn set_remove(&self, key: &str, member: &str) -> Result<(), BrokerError>;

    /// Test set membership (roster liveness check before each poll).
    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, BrokerError>;

    /// Publish a payload to a channel; delivered to every current subscriber.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BrokerError>;

    /// Obtain a fresh pub/sub handle, already subscribed to `channels`.
    async fn subscribe(&self, channels: &[String]) -> Result<Box<dyn PubSub>, BrokerError>;
}
