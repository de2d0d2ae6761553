use dashmap::DashMap;

/// Process-local cache mapping a dotted resource prefix to either "yes, and
/// the first argument segment is index k" or "no, keep walking" (§4.6).
/// At most one of the two is ever stored for a given prefix.
#[derive(Default)]
pub struct MethodCache {
    entries: DashMap<String, Option<usize>>,
}

impl MethodCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` means "not yet known"; `Some(None)` means "known not to be a
    /// resource"; `Some(Some(k))` means "is a resource, args start at k".
    pub fn get(&self, prefix: &str) -> Option<Option<usize>> {
        self.entries.get(prefix).map(|entry| *entry)
    }

    pub fn mark_resource(&self, prefix: &str, first_arg_index: usize) {
        self.entries
            .insert(prefix.to_string(), Some(first_arg_index));
    }

    pub fn mark_absent(&self, prefix: &str) {
        self.entries.insert(prefix.to_string(), None);
    }
}
