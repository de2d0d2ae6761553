//! The REST gateway (§4.6): resource discovery by walking the path against
//! `no_exec` probes, with a process-local method cache, deflate+JSONP output
//! encoding, and the `supress_response_codes` (sic) status-folding flag.

mod config;
mod gateway;
mod method_cache;

pub use config::RestConfig;
pub use gateway::{router, GatewayState};
pub use method_cache::MethodCache;
