use std::time::Duration;

use bluecollar_core::config::{env_string, env_u16, env_u64};
use bluecollar_core::{BrokerLocation, ConfigError, QueueNames};

/// Plain-HTTP gateway configuration (§4.5, §6).
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub broker: BrokerLocation,
    pub queues: QueueNames,
    pub bind_host: String,
    pub bind_port: u16,
    /// Path prefix every request must start with (`BC_HTTP_PREFIX`,
    /// default `/`, mirroring the original's WSGI app).
    pub prefix: String,
    pub request_timeout: Duration,
    pub reply_prefix: String,
}

impl HttpConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            broker: BrokerLocation::from_env_with_prefix("BC")?,
            queues: QueueNames::from_env(),
            bind_host: env_string("BC_HTTP_HOST", "0.0.0.0"),
            bind_port: env_u16("BC_HTTP_PORT", 8001)?,
            prefix: env_string("BC_HTTP_PREFIX", "/"),
            request_timeout: Duration::from_secs(env_u64("BC_HTTP_TIMEOUT", 300)?),
            reply_prefix: env_string("BC_HTTP_REPLY_PREFIX", "bc"),
        })
    }
}
