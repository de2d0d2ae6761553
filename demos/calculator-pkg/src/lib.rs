//! A small exposed package for manual exercising and integration tests,
//! playing the role of the original's `examples/calculator.py` (the
//! `Calculator(Cacheable)` singleton) and `examples/restapp.py` (the
//! `Resource`/`Item` REST resource-discovery demo).
//!
//! A compiled worker has no dynamic import to target a "root package" by
//! name (spec.md §6 "CLI"); this crate is that root package, and
//! [`registry`] is what a worker binary hands to [`bluecollar_worker::Worker`].

use std::any::Any;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bluecollar_registry::{InstancePolicy, Registry, RegistryBuilder, TypeBuilder};
use serde_json::{json, Value};

struct Calculator {
    last_result: AtomicI64,
}

impl Calculator {
    fn new() -> Self {
        Self {
            last_result: AtomicI64::new(0),
        }
    }
}

/// Path args arrive as JSON strings from the HTTP/REST gateways (path
/// segments) but as real numbers over the WebSocket gateway (client sends a
/// JSON envelope directly) — accept either.
fn as_i64(value: Option<&Value>) -> Option<i64> {
    value.and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

const ITEMS: &[(i64, &str)] = &[(1, "Thing A"), (2, "Thing B"), (3, "Thing C")];

fn item_record(id: i64) -> Option<Value> {
    ITEMS
        .iter()
        .find(|(item_id, _)| *item_id == id)
        .map(|(id, name)| json!({"id": id, "name": name}))
}

/// Build the demo registry. `Calculator` is `Singleton` (it keeps
/// `last_result` between calls, the original's `Cacheable` marker); `Resource`
/// is `PerCall` since it carries no state of its own between requests.
pub fn registry() -> Registry {
    RegistryBuilder::new()
        .register_type(
            TypeBuilder::new("Calculator", InstancePolicy::Singleton, || {
                Arc::new(Calculator::new()) as Arc<dyn Any + Send + Sync>
            })
            .method::<Calculator, _, _>("add", |instance, args, _kwargs| async move {
                let op1 =
                    as_i64(args.first()).ok_or_else(|| "add() requires op1".to_string())?;
                let op2 = as_i64(args.get(1))
                    .unwrap_or_else(|| instance.last_result.load(Ordering::SeqCst));
                let result = op1 + op2;
                instance.last_result.store(result, Ordering::SeqCst);
                Ok(json!(result))
            })
            .method::<Calculator, _, _>("subtract", |instance, args, _kwargs| async move {
                let op1 = as_i64(args.first())
                    .ok_or_else(|| "subtract() requires op1".to_string())?;
                // Mirrors the original's `if not op2:` — a zero-or-absent
                // second operand both fall back to `last_result - op1`.
                let result = match as_i64(args.get(1)) {
                    Some(op2) if op2 != 0 => op1 - op2,
                    _ => instance.last_result.load(Ordering::SeqCst) - op1,
                };
                instance.last_result.store(result, Ordering::SeqCst);
                Ok(json!(result))
            })
            .method::<Calculator, _, _>("one_minute", |_instance, _args, _kwargs| async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Value::Null)
            }),
        )
        .register_type(
            TypeBuilder::new("Resource", InstancePolicy::PerCall, || {
                Arc::new(()) as Arc<dyn Any + Send + Sync>
            })
            .method::<(), _, _>("http_get", |_instance, args, _kwargs| async move {
                match as_i64(args.first()) {
                    Some(id) => item_record(id).ok_or_else(|| format!("No such item: {id}")),
                    None => Ok(Value::Array(
                        ITEMS.iter().map(|(id, _)| json!(id)).collect(),
                    )),
                }
            }),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluecollar_registry::Resolved;

    #[tokio::test]
    async fn calculator_add_defaults_second_operand_to_last_result() {
        let registry = registry();
        let Resolved::Method {
            type_entry, method, ..
        } = registry.resolve("Calculator.add").unwrap()
        else {
            panic!("expected a method");
        };
        let instance = type_entry.construct();
        let first = type_entry
            .call(instance.clone(), &method, vec![json!(2), json!(3)], Default::default())
            .await
            .unwrap();
        assert_eq!(first, json!(5));
        let second = type_entry
            .call(instance, &method, vec![json!(10)], Default::default())
            .await
            .unwrap();
        assert_eq!(second, json!(15));
    }

    #[tokio::test]
    async fn resource_lists_items_with_no_args_and_fetches_one_with_an_id() {
        let registry = registry();
        let Resolved::Method {
            type_entry, method, ..
        } = registry.resolve("Resource.http_get").unwrap()
        else {
            panic!("expected a method");
        };
        let list = type_entry
            .call(type_entry.construct(), &method, vec![], Default::default())
            .await
            .unwrap();
        assert_eq!(list, json!([1, 2, 3]));
        let item = type_entry
            .call(
                type_entry.construct(),
                &method,
                vec![json!("2")],
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(item, json!({"id": 2, "name": "Thing B"}));
    }
}
