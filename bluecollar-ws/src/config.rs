use std::time::Duration;

use bluecollar_core::config::{env_opt_string, env_string, env_u16, env_u64};
use bluecollar_core::{BrokerLocation, ConfigError, QueueNames};

/// How the gateway handles a request that isn't a WebSocket upgrade
/// (`BC_WS_FALLBACK`). Mirrors the original's `_WS_FALLBACK` env var.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Respond 400; the default when `BC_WS_FALLBACK` is unset or unrecognized.
    None,
    /// Hand the request to a plain HTTP gateway instance.
    Http,
    /// Hand the request to a REST gateway instance.
    Rest,
}

impl Fallback {
    fn from_env() -> Self {
        match env_opt_string("BC_WS_FALLBACK").as_deref() {
            Some("http") => Fallback::Http,
            Some("rest") => Fallback::Rest,
            _ => Fallback::None,
        }
    }
}

/// WebSocket gateway configuration (§4.7, §6).
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub broker: BrokerLocation,
    pub queues: QueueNames,
    pub bind_host: String,
    pub bind_port: u16,
    pub request_timeout: Duration,
    pub reply_prefix: String,
    pub fallback: Fallback,
    /// `BC_WS_SKIP_LONGPOLLING` — if truthy, the `*/xhr/` endpoint is not
    /// served even when no fallback is configured for it.
    pub skip_longpolling: bool,
    /// Whether a failed auth predicate aborts the subscribe (§4.8), mirroring
    /// the original's `authenticate(stop_on_fail=True)` default. When false,
    /// a failed check is logged but the subscribe proceeds anyway.
    pub auth_stop_on_fail: bool,
}

impl WsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            broker: ws_broker_location()?,
            queues: QueueNames::from_env(),
            bind_host: env_string("BC_WS_HOST", "0.0.0.0"),
            bind_port: env_u16("BC_WS_PORT", 8003)?,
            request_timeout: Duration::from_secs(env_u64("BC_WS_TIMEOUT", 300)?),
            reply_prefix: env_string("BC_WS_REPLY_PREFIX", "bc"),
            fallback: Fallback::from_env(),
            skip_longpolling: truthy(env_opt_string("BC_WS_SKIP_LONGPOLLING")),
            auth_stop_on_fail: env_opt_string("BC_WS_AUTH_STOP_ON_FAIL")
                .map(|v| truthy(Some(v)))
                .unwrap_or(true),
        })
    }
}

/// The WS gateway's broker location can be overridden independently of the
/// shared `BC_REDISHOST`/`PORT`/`DB` via `BC_WS_REDISHOST`/`PORT`/`DB`,
/// falling back to the shared settings when its own variables are unset.
fn ws_broker_location() -> Result<BrokerLocation, ConfigError> {
    let host = env_opt_string("BC_WS_REDISHOST").unwrap_or_else(|| env_string("BC_REDISHOST", "localhost"));
    let port = match env_opt_string("BC_WS_REDISPORT") {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError {
            key: "BC_WS_REDISPORT",
            message: format!("`{raw}` is not a valid port number"),
        })?,
        None => env_u16("BC_REDISPORT", 6379)?,
    };
    let db = match env_opt_string("BC_WS_REDISDB") {
        Some(raw) => {
            let value: i64 = raw.trim().parse().map_err(|_| ConfigError {
                key: "BC_WS_REDISDB",
                message: format!("`{raw}` is not an integer"),
            })?;
            if !(0..=15).contains(&value) {
                return Err(ConfigError {
                    key: "BC_WS_REDISDB",
                    message: "Redis DBs must be 0-15".to_string(),
                });
            }
            value
        }
        None => BrokerLocation::from_env_with_prefix("BC")?.db,
    };
    Ok(BrokerLocation { host, port, db })
}

fn truthy(value: Option<String>) -> bool {
    match value {
        None => false,
        Some(v) => !v.is_empty() && v != "0" && v.to_lowercase() != "false",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_parses_known_values() {
        std::env::set_var("BC_WS_FALLBACK", "rest");
        assert_eq!(Fallback::from_env(), Fallback::Rest);
        std::env::set_var("BC_WS_FALLBACK", "http");
        assert_eq!(Fallback::from_env(), Fallback::Http);
        std::env::remove_var("BC_WS_FALLBACK");
        assert_eq!(Fallback::from_env(), Fallback::None);
    }

    #[test]
    fn ws_broker_location_falls_back_to_shared_settings() {
        std::env::remove_var("BC_WS_REDISHOST");
        std::env::remove_var("BC_REDISHOST");
        let loc = ws_broker_location().unwrap();
        assert_eq!(loc.host, "localhost");
    }
}
