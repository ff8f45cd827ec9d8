use std::collections::BTreeMap;

use crate::operation::{Operation, OperationId, OperationPatch, OperationStatus};

/// Keyed table of operations currently observed by the UI.
///
/// Entries leave only through [`OperationRegistry::unregister`]; a running operation is never
/// dropped implicitly.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<OperationId, Operation>,
}

/// Status of an entry before and after an update was merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub before: OperationStatus,
    pub after: OperationStatus,
}

impl StatusChange {
    pub fn became_terminal(&self) -> bool {
        !self.before.is_terminal() && self.after.is_terminal()
    }
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `id`.
    pub fn register(&mut self, id: impl Into<OperationId>, operation: Operation) {
        self.operations.insert(id.into(), operation);
    }

    /// Merges `patch` into the entry for `id`.
    ///
    /// Unknown ids are a no-op: late poll responses may arrive after the caller stopped
    /// observing. Returns the status change when the entry exists and something changed.
    pub fn update(&mut self, id: &str, patch: OperationPatch) -> Option<StatusChange> {
        let operation = self.operations.get_mut(id)?;
        let before = operation.status;
        if operation.apply_patch(patch) {
            Some(StatusChange {
                before,
                after: operation.status,
            })
        } else {
            None
        }
    }

    pub fn unregister(&mut self, id: &str) -> Option<Operation> {
        self.operations.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Operation> {
        self.operations.get(id)
    }

    /// Operations in ascending id order.
    pub fn list(&self) -> Vec<&Operation> {
        self.operations.values().collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.operations
            .values()
            .filter(|operation| !operation.is_terminal())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationKind;

    fn scan(id: &str) -> Operation {
        Operation::new(id, OperationKind::ContinuationScan, OperationStatus::Pending)
    }

    #[test]
    fn update_after_unregister_is_noop() {
        let mut registry = OperationRegistry::new();
        registry.register("a", scan("a"));
        assert!(registry.unregister("a").is_some());

        let change = registry.update(
            "a",
            OperationPatch {
                progress: Some(50),
                ..OperationPatch::default()
            },
        );
        assert_eq!(change, None);
        assert!(registry.is_empty());
    }

    #[test]
    fn update_reports_terminal_transition_once() {
        let mut registry = OperationRegistry::new();
        registry.register("a", scan("a"));
        let done = OperationPatch {
            status: Some(OperationStatus::Completed),
            ..OperationPatch::default()
        };

        let change = registry.update("a", done.clone()).expect("changed");
        assert!(change.became_terminal());
        assert_eq!(registry.update("a", done), None);
    }

    #[test]
    fn list_is_ordered_and_counts_active() {
        let mut registry = OperationRegistry::new();
        registry.register("b", scan("b"));
        registry.register("a", scan("a"));
        registry.update(
            "b",
            OperationPatch {
                status: Some(OperationStatus::Error),
                ..OperationPatch::default()
            },
        );

        let ids: Vec<_> = registry.list().iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(registry.active_count(), 1);
    }
}
