//! Redis-backed `Broker`.
//!
//! The reference broker (§1). Ordinary commands go through a
//! `ConnectionManager`, which reconnects transparently; pub/sub needs its own
//! dedicated connection since a subscribed connection can't run other
//! commands.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::BrokerError;
use crate::traits::{Broker, PubSub, PubSubMessage};

/// Talks to a real Redis (or Redis-protocol-compatible) broker.
pub struct RedisBroker {
    client: redis::Client,
    conn: ConnectionManager,
}

impl RedisBroker {
    /// Connect to `url` (e.g. `redis://localhost:6379/0`) and establish the
    /// managed connection used for every non-pub/sub command.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let client = redis::Client::open(url).map_err(BrokerError::from)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(BrokerError::from)?;
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn push(&self, key: &str, value: Vec<u8>) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(key, value)
            .await
            .map_err(BrokerError::from)
    }

    async fn push_with_expiry(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(key, value)
            .await
            .map_err(BrokerError::from)?;
        conn.expire::<_, ()>(key, ttl.as_secs().max(1) as i64)
            .await
            .map_err(BrokerError::from)
    }

    async fn blocking_pop(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, BrokerError> {
        let mut conn = self.conn.clone();
        let reply: Option<(String, Vec<u8>)> = conn
            .blpop(key, timeout.as_secs_f64())
            .await
            .map_err(BrokerError::from)?;
        Ok(reply.map(|(_key, value)| value))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(key, member)
            .await
            .map_err(BrokerError::from)
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(key, member)
            .await
            .map_err(BrokerError::from)
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, BrokerError> {
        let mut conn = self.conn.clone();
        conn.sismember(key, member).await.map_err(BrokerError::from)
    }

    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(channel, payload)
            .await
            .map_err(BrokerError::from)
    }

    async fn subscribe(&self, channels: &[String]) -> Result<Box<dyn PubSub>, BrokerError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(BrokerError::from)?;
        for channel in channels {
            pubsub.subscribe(channel).await.map_err(BrokerError::from)?;
        }
        Ok(Box::new(RedisPubSub { conn: pubsub }))
    }
}

struct RedisPubSub {
    conn: redis::aio::PubSub,
}

#[async_trait]
impl PubSub for RedisPubSub {
    async fn subscribe(&mut self, channel: &str) -> Result<(), BrokerError> {
        self.conn.subscribe(channel).await.map_err(BrokerError::from)
    }

    async fn unsubscribe(&mut self, channel: &str) -> Result<(), BrokerError> {
        self.conn
            .unsubscribe(channel)
            .await
            .map_err(BrokerError::from)
    }

    async fn next_message(&mut self) -> Result<Option<PubSubMessage>, BrokerError> {
        let mut stream = self.conn.on_message();
        match stream.next().await {
            Some(msg) => {
                let channel = msg.get_channel_name().to_string();
                let payload: Vec<u8> = msg.get_payload_bytes().to_vec();
                Ok(Some(PubSubMessage { channel, payload }))
            }
            None => Ok(None),
        }
    }
}
