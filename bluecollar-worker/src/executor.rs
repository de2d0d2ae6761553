use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use bluecollar_registry::{Args, CallResult, FunctionEntry, Kwargs, TypeEntry};

/// What one executor actually invokes, fully materialized (§4.3
/// "Materialize"): either a bare function, or a type method bound to a
/// concrete instance (from the instance cache for `Singleton` types, freshly
/// constructed otherwise).
pub enum Dispatch {
    Function(Arc<FunctionEntry>),
    Method {
        type_entry: Arc<TypeEntry>,
        instance: Arc<dyn Any + Send + Sync>,
        method: String,
    },
}

/// Run one envelope to completion (§4.4): invoke the callable, time it, and
/// hand back the result for the caller to encode and push.
pub async fn execute(dispatch: Dispatch, args: Args, kwargs: Kwargs) -> CallResult {
    let start = Instant::now();
    let result = match dispatch {
        Dispatch::Function(f) => f.call(args, kwargs).await,
        Dispatch::Method {
            type_entry,
            instance,
            method,
        } => type_entry.call(instance, &method, args, kwargs).await,
    };
    tracing::debug!(elapsed_ms = start.elapsed().as_millis(), "executor finished");
    result
}
