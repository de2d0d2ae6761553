use std::time::Duration;

use bluecollar_core::config::{env_string, env_u64};
use bluecollar_core::{BrokerLocation, ConfigError, QueueNames};

/// Worker process configuration, assembled entirely from the environment
/// (§6, §4.9 — the worker binary takes no config besides the exposed
/// package's registry, built at compile time).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub broker: BrokerLocation,
    pub queues: QueueNames,
    /// How long a single `blocking_pop` on the work queue waits before
    /// returning to `Poll` (§4.3, default 5s).
    pub poll_timeout: Duration,
    /// TTL applied to a reply channel when the worker pushes a reply, so a
    /// gateway that gave up doesn't leave it dangling forever (§9 "Orphan
    /// reply channels"). The worker has no way to learn the gateway's
    /// per-request timeout from the envelope, so this is a fixed fallback
    /// rather than `request timeout + slack` computed per request.
    pub reply_ttl: Duration,
    /// This process's identity in the worker roster set — the OS pid,
    /// stringified, matching the original's `os.getpid()`-keyed roster.
    pub worker_id: String,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            broker: BrokerLocation::from_env_with_prefix("BC")?,
            queues: QueueNames::from_env(),
            poll_timeout: Duration::from_secs(env_u64("BC_POLL_TIMEOUT", 5)?),
            reply_ttl: Duration::from_secs(env_u64("BC_REPLY_TTL", 330)?),
            worker_id: env_string("BC_WORKER_ID", &std::process::id().to_string()),
        })
    }
}
