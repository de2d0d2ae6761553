use std::time::Duration;

use bluecollar_core::config::{env_opt_string, env_string, env_u16, env_u64};
use bluecollar_core::{BrokerLocation, ConfigError, QueueNames};

/// REST gateway configuration (§4.6, §6).
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub broker: BrokerLocation,
    pub queues: QueueNames,
    pub bind_host: String,
    pub bind_port: u16,
    pub prefix: String,
    pub request_timeout: Duration,
    pub reply_prefix: String,
    /// `BC_REST_ERROR_DOC_URL` — if set, error bodies carry a `more_info`
    /// link built from this base plus the urlencoded error message.
    pub error_doc_url: Option<String>,
}

impl RestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            broker: BrokerLocation::from_env_with_prefix("BC")?,
            queues: QueueNames::from_env(),
            bind_host: env_string("BC_REST_HOST", "0.0.0.0"),
            bind_port: env_u16("BC_REST_PORT", 8002)?,
            prefix: env_string("BC_REST_PREFIX", "/"),
            request_timeout: Duration::from_secs(env_u64("BC_REST_TIMEOUT", 300)?),
            reply_prefix: env_string("BC_REST_REPLY_PREFIX", "bc"),
            error_doc_url: env_opt_string("BC_REST_ERROR_DOC_URL"),
        })
    }
}
