//! The worker loop: Register → Poll → Reap → Yield → Dequeue → Parse →
//! Resolve → Materialize → No-exec branch / Spawn executor (§4.3, §4.4).

mod cache;
mod config;
mod executor;
mod worker;

pub use cache::{ExecutableCache, InstanceCache};
pub use config::WorkerConfig;
pub use executor::{execute, Dispatch};
pub use worker::{Worker, WorkerExit};
