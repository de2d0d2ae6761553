//! The WebSocket gateway (§4.7): one socket multiplexes request/reply
//! alongside pub/sub subscribe/unsubscribe, with an XHR long-poll endpoint
//! and a configurable fallback to the HTTP or REST gateway when the
//! incoming request isn't a WebSocket upgrade at all.

mod auth;
mod config;
mod gateway;
mod stats;
mod xhr;

pub use auth::{allow_all, AuthPredicate};
pub use config::{Fallback, WsConfig};
pub use gateway::{router, GatewayState};
pub use stats::Stats;
