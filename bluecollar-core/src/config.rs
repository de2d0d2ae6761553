//! Environment-variable configuration helpers.
//!
//! BlueCollar has no shared application state to inject config into — each
//! process (worker, HTTP gateway, REST gateway, WS gateway) is configured
//! independently from its own slice of environment variables, per §6 of the
//! spec. These helpers parse that slice with the same "log and exit 1 on bad
//! config" discipline as the original source's `abs(int(os.environ.get(...)))`
//! guards.

use std::env;
use std::fmt;

/// Failure to parse a configuration value from the environment.
#[derive(Debug)]
pub struct ConfigError {
    pub key: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for {}: {}", self.key, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Read a string env var, falling back to `default` when unset.
pub fn env_string(key: &'static str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an optional string env var.
pub fn env_opt_string(key: &'static str) -> Option<String> {
    env::var(key).ok()
}

/// Read a `u16` env var, falling back to `default`. Mirrors the original's
/// `abs(int(os.environ.get(...)))` pattern: negative input is an error here
/// rather than silently absolute-valued, since a Rust `u16` can't represent
/// a sign in the first place.
pub fn env_u16(key: &'static str, default: u16) -> Result<u16, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError {
            key,
            message: format!("`{raw}` is not a valid port number"),
        }),
    }
}

/// Read a `u64` env var (used for timeouts in seconds), falling back to `default`.
pub fn env_u64(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError {
            key,
            message: format!("`{raw}` is not a valid non-negative integer"),
        }),
    }
}

/// Read a Redis logical database index (0-15), falling back to `default`.
pub fn env_redis_db(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    let value = match env::var(key) {
        Err(_) => return Ok(default),
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError {
                key,
                message: format!("`{raw}` is not an integer"),
            })?,
    };
    if !(0..=15).contains(&value) {
        return Err(ConfigError {
            key,
            message: "Redis DBs must be 0-15".to_string(),
        });
    }
    Ok(value)
}

/// True if `DEBUG` is set to a truthy value, matching the original's
/// `os.environ.get('DEBUG')` truthiness check.
pub fn debug_enabled() -> bool {
    env::var("DEBUG")
        .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
        .unwrap_or(false)
}

/// Location of the broker, shared by every process that talks to it.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerLocation {
    pub host: String,
    pub port: u16,
    pub db: i64,
}

impl BrokerLocation {
    pub fn from_env_with_prefix(prefix: &'static str) -> Result<Self, ConfigError> {
        // Only BC_REDISHOST/PORT/DB are read here; the WS gateway's
        // BC_WS_REDISHOST/PORT/DB override is handled by its own config
        // struct falling back to these.
        let _ = prefix;
        Ok(Self {
            host: env_string("BC_REDISHOST", "localhost"),
            port: env_u16("BC_REDISPORT", 6379)?,
            db: env_redis_db("BC_REDISDB", 0)?,
        })
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

/// The work queue and worker roster key names, shared across every process.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueNames {
    pub work_queue: String,
    pub worker_list: String,
}

impl QueueNames {
    pub fn from_env() -> Self {
        Self {
            work_queue: env_string("BC_QUEUE", "list_bcqueue"),
            worker_list: env_string("BC_WORKERLIST", "list_bcworkers"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_u16_falls_back_to_default_when_unset() {
        assert_eq!(env_u16("BC_TEST_DOES_NOT_EXIST_PORT", 8001).unwrap(), 8001);
    }

    #[test]
    fn env_redis_db_rejects_out_of_range() {
        std::env::set_var("BC_TEST_REDIS_DB", "99");
        let err = env_redis_db("BC_TEST_REDIS_DB", 0).unwrap_err();
        assert!(err.message.contains("0-15"));
        std::env::remove_var("BC_TEST_REDIS_DB");
    }

    #[test]
    fn debug_enabled_recognizes_common_truthy_values() {
        std::env::set_var("DEBUG", "1");
        assert!(debug_enabled());
        std::env::set_var("DEBUG", "false");
        assert!(!debug_enabled());
        std::env::remove_var("DEBUG");
        assert!(!debug_enabled());
    }
}
