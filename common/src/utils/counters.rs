use std::collections::HashMap;
use std::sync::Mutex;

/// Operations a host-side rate limiter may want to scope by user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Ingest,
    ContentList,
    ContentGet,
    Search,
    QaSearch,
}

/// Per-user, per-operation counters. Rate limiting itself is policy at the
/// host boundary; the core only exposes the counts.
#[derive(Debug, Default)]
pub struct OperationCounters {
    counts: Mutex<HashMap<(String, Operation), u64>>,
}

impl OperationCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, user_id: &str, operation: Operation) {
        let mut counts = self.counts.lock().expect("counter lock poisoned");
        *counts
            .entry((user_id.to_owned(), operation))
            .or_insert(0) += 1;
    }

    pub fn count(&self, user_id: &str, operation: Operation) -> u64 {
        let counts = self.counts.lock().expect("counter lock poisoned");
        counts
            .get(&(user_id.to_owned(), operation))
            .copied()
            .unwrap_or(0)
    }
}
