//! Call identifier generation

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Mints call identifiers. Every id returned must be unique for the lifetime
/// of the session that uses the generator.
pub trait IdGenerator: Send + Sync + 'static {
    fn next_id(&self) -> String;
}

/// Random 128-bit identifiers rendered as hyphenated UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `<prefix>-<n>` identifiers, starting at 1.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| RandomIds.next_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIds::new("call");
        assert_eq!(ids.next_id(), "call-1");
        assert_eq!(ids.next_id(), "call-2");
    }
}
