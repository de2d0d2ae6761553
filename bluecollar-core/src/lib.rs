//! Wire types, configuration, and logging shared by every BlueCollar process.
//!
//! This crate owns the envelope/reply codec (§4.1, §9) and the small pile of
//! environment-variable parsing every gateway and worker binary needs. It has
//! no broker dependency and no async runtime dependency — just serde and
//! stdlib.

pub mod channel;
pub mod config;
pub mod envelope;
pub mod logging;
pub mod reply;

pub use channel::new_reply_channel;
pub use config::{BrokerLocation, ConfigError, QueueNames};
pub use envelope::{Envelope, EnvelopeError};
pub use logging::init_tracing;
pub use reply::{ErrorRecord, PresenceRecord, Reply};
