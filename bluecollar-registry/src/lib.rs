//! The resource registry: a compile-time replacement for the original
//! source's reflective `route_to_class_or_function` (§3, §4.2). The exposed
//! package builds one of these with [`RegistryBuilder`] and hands the
//! finished [`Registry`] to a worker binary's `main()`.

mod builder;
mod model;
mod registry;

pub use builder::{RegistryBuilder, TypeBuilder};
pub use model::{Args, CallResult, FunctionEntry, InstancePolicy, Kwargs, Node, TypeEntry};
pub use registry::{ResolveError, Resolved, Registry};
