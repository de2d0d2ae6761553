//! Reply channel naming.
//!
//! A reply channel is a broker list created per request: `<prefix>_<hex>`.
//! The gateway creates the name, pushes the envelope, and blocks on a timed
//! pop of that name; the worker never needs to parse it, only echo it back.

use uuid::Uuid;

/// Generate a fresh reply channel name under `prefix` (default `bc`, per
/// `BC_*_REPLY_PREFIX`).
pub fn new_reply_channel(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_unique_and_prefixed() {
        let a = new_reply_channel("bc");
        let b = new_reply_channel("bc");
        assert_ne!(a, b);
        assert!(a.starts_with("bc_"));
    }
}
