use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};

/// Positional arguments decoded from an envelope.
pub type Args = Vec<Value>;
/// Keyword arguments decoded from an envelope.
pub type Kwargs = Map<String, Value>;
/// A boxed, type-erased future — every handler returns one of these.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
/// The result of invoking a callable: the JSON value to reply with, or a
/// human-readable error string to stringify back to the caller (§4.4).
pub type CallResult = Result<Value, String>;

/// Whether a registered type's instance is shared across every call
/// (`Singleton`, created lazily and cached for the worker's lifetime) or
/// constructed fresh per invocation (`PerCall`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstancePolicy {
    Singleton,
    PerCall,
}

pub(crate) type FunctionHandler =
    Arc<dyn Fn(Args, Kwargs) -> BoxFuture<'static, CallResult> + Send + Sync>;
pub(crate) type MethodHandler = Arc<
    dyn Fn(Arc<dyn Any + Send + Sync>, Args, Kwargs) -> BoxFuture<'static, CallResult>
        + Send
        + Sync,
>;
pub(crate) type Constructor = Arc<dyn Fn() -> Arc<dyn Any + Send + Sync> + Send + Sync>;

/// A bare function registered at a dotted path (e.g. `calculator.ping`).
pub struct FunctionEntry {
    pub(crate) handler: FunctionHandler,
}

impl FunctionEntry {
    pub async fn call(&self, args: Args, kwargs: Kwargs) -> CallResult {
        (self.handler)(args, kwargs).await
    }
}

/// A registered type: its construction policy and its method table.
pub struct TypeEntry {
    pub policy: InstancePolicy,
    pub(crate) constructor: Constructor,
    pub(crate) methods: HashMap<String, MethodHandler>,
}

impl TypeEntry {
    pub fn construct(&self) -> Arc<dyn Any + Send + Sync> {
        (self.constructor)()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub async fn call(
        &self,
        instance: Arc<dyn Any + Send + Sync>,
        method: &str,
        args: Args,
        kwargs: Kwargs,
    ) -> CallResult {
        let handler = self
            .methods
            .get(method)
            .expect("caller must check has_method before call");
        (handler)(instance, args, kwargs).await
    }
}

/// A terminal node in the registry: either a bare function or a type with
/// methods. Both variants are `Arc`-wrapped so a resolution result can be
/// cached cheaply by the worker's executable cache.
pub enum Node {
    Function(Arc<FunctionEntry>),
    Type(Arc<TypeEntry>),
}
