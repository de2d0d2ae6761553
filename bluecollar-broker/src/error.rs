use thiserror::Error;

/// Failures talking to the broker. Every gateway and worker treats
/// `ConnectionLost` as fatal: log, sleep 5s, exit 1.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker connection lost: {0}")]
    ConnectionLost(String),

    #[error("broker command failed: {0}")]
    Command(String),
}

impl From<redis::RedisError> for BrokerError {
    fn from(err: redis::RedisError) -> Self {
        classify(err)
    }
}

fn classify(err: redis::RedisError) -> BrokerError {
    if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
        BrokerError::ConnectionLost(err.to_string())
    } else {
        BrokerError::Command(err.to_string())
    }
}
