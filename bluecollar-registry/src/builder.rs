use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::model::{
    Args, BoxFuture, CallResult, Constructor, FunctionEntry, InstancePolicy, Kwargs,
    MethodHandler, Node, TypeEntry,
};
use crate::registry::Registry;

/// Fluent construction of a [`TypeEntry`]'s method table. Obtained from
/// [`RegistryBuilder::type_`] and folded back in via [`RegistryBuilder::register_type`].
pub struct TypeBuilder {
    path: String,
    policy: InstancePolicy,
    constructor: Constructor,
    methods: HashMap<String, MethodHandler>,
}

impl TypeBuilder {
    pub fn new<C>(path: impl Into<String>, policy: InstancePolicy, constructor: C) -> Self
    where
        C: Fn() -> Arc<dyn Any + Send + Sync> + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            policy,
            constructor: Arc::new(constructor),
            methods: HashMap::new(),
        }
    }

    /// Register a method taking `Arc<T>` as `self`. `T` must match the
    /// concrete type produced by the constructor passed to [`Self::new`] —
    /// a mismatch panics at call time via a failed downcast, the same class
    /// of programming error as wiring the wrong handler to a route.
    pub fn method<T, F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>, Args, Kwargs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        let handler: MethodHandler =
            Arc::new(move |instance: Arc<dyn Any + Send + Sync>, args, kwargs| {
                let instance = instance
                    .downcast::<T>()
                    .unwrap_or_else(|_| panic!("registry: instance type mismatch for a method"));
                Box::pin(handler(instance, args, kwargs)) as BoxFuture<'static, CallResult>
            });
        self.methods.insert(name.into(), handler);
        self
    }

    fn build(self) -> (String, Node) {
        let entry = TypeEntry {
            policy: self.policy,
            constructor: self.constructor,
            methods: self.methods,
        };
        (self.path, Node::Type(Arc::new(entry)))
    }
}

/// Builds the process-local [`Registry`] a worker dispatches against. The
/// exposed package constructs one of these in its own crate and hands the
/// finished [`Registry`] to the worker binary's `main()`.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<String, Node>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bare function at `path` (e.g. `"calculator.ping"`).
    pub fn function<F, Fut>(mut self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Args, Kwargs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        let handler: crate::model::FunctionHandler =
            Arc::new(move |args, kwargs| Box::pin(handler(args, kwargs)) as BoxFuture<'static, CallResult>);
        self.entries.insert(
            path.into(),
            Node::Function(Arc::new(FunctionEntry { handler })),
        );
        self
    }

    /// Fold a finished [`TypeBuilder`] into the registry.
    pub fn register_type(mut self, builder: TypeBuilder) -> Self {
        let (path, node) = builder.build();
        self.entries.insert(path, node);
        self
    }

    pub fn build(self) -> Registry {
        Registry::new(self.entries)
    }
}
