use std::collections::HashSet;

/// Post ids already evaluated during the current session.
///
/// Append-only: ids are never evicted, and the whole ledger is dropped when
/// the sessions are rebuilt. Memory grows with the number of distinct posts
/// seen between reconnects.
#[derive(Debug, Default)]
pub struct SeenLedger {
    seen: HashSet<String>,
}

impl SeenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn mark_seen(&mut self, id: impl Into<String>) {
        self.seen.insert(id.into());
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remembers_marked_ids() {
        let mut ledger = SeenLedger::new();
        assert!(!ledger.has_seen("a1"));

        ledger.mark_seen("a1");
        ledger.mark_seen("a1");

        assert!(ledger.has_seen("a1"));
        assert!(!ledger.has_seen("A1"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn starts_empty() {
        assert!(SeenLedger::new().is_empty());
    }
}
