use std::sync::Arc;

use serde_json::{Map, Value};

/// A pluggable predicate gating the subscribe flow (§4.7, §9 "Design Notes"
/// supplements). Grounded in the original's `bluecollar.auth.authenticate`
/// decorator: there, the stub predicate always returns `authenticated: False`
/// and `stop_on_fail=True` denies by default. BlueCollar takes the predicate
/// as an injected collaborator instead of hardcoding that policy, so the
/// default here is the permissive `allow_all` — callers wire in their own
/// check the way the original wired in `authenticate()`.
pub type AuthPredicate = Arc<dyn Fn(&Map<String, Value>) -> bool + Send + Sync>;

/// Admits every subscribe request. The default when no predicate is
/// supplied; equivalent to the original decorator's `stop_on_fail=False`.
pub fn allow_all() -> AuthPredicate {
    Arc::new(|_: &Map<String, Value>| true)
}
