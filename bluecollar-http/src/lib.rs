//! The plain HTTP gateway (§4.5): `GET <prefix>/<method>/<args>/...?kw=v` or
//! `POST <prefix>/` with a JSON envelope body, both rendezvousing on a fresh
//! reply channel.

mod config;
mod gateway;

pub use config::HttpConfig;
pub use gateway::{router, GatewayState};
