use async_trait::async_trait;
use dashmap::DashMap;
use rewriter_core::source::Result;
use rewriter_core::{ItemId, RuleRecord, RuleSource, StorageError};

/// In-memory storage entry for an item and its ordered children.
#[derive(Debug, Clone)]
struct Entry {
    record: RuleRecord,
    parent: Option<ItemId>,
    children: Vec<ItemId>,
}

/// In-memory implementation of the [`RuleSource`] trait using DashMap.
///
/// Items form a tree; children keep their insertion order, which is the
/// order [`RuleSource::descendants`] reports them in.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRuleSource {
    storage: DashMap<ItemId, Entry>,
}

impl InMemoryRuleSource {
    /// Creates a new, empty rule source.
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
        }
    }

    /// Inserts an item below `parent`, or as a root item when `parent` is `None`.
    ///
    /// Fails if the id is already taken or the parent does not exist.
    pub fn insert(&self, parent: Option<&ItemId>, record: RuleRecord) -> Result<()> {
        let id = record.id.clone();

        if self.storage.contains_key(&id) {
            return Err(StorageError::Operation(format!("item '{id}' already exists")));
        }

        if let Some(parent) = parent {
            let Some(mut parent_entry) = self.storage.get_mut(parent) else {
                return Err(StorageError::InvalidData(format!(
                    "parent item '{parent}' does not exist"
                )));
            };
            parent_entry.children.push(id.clone());
        }

        self.storage.insert(
            id,
            Entry {
                record,
                parent: parent.cloned(),
                children: Vec::new(),
            },
        );
        Ok(())
    }

    /// Removes an item and all of its descendants.
    /// Returns `true` if the item existed.
    pub fn remove(&self, id: &ItemId) -> bool {
        let Some((_, entry)) = self.storage.remove(id) else {
            return false;
        };

        if let Some(parent) = entry.parent {
            if let Some(mut parent_entry) = self.storage.get_mut(&parent) {
                parent_entry.children.retain(|child| child != id);
            }
        }

        let mut pending = entry.children;
        while let Some(child) = pending.pop() {
            if let Some((_, removed)) = self.storage.remove(&child) {
                pending.extend(removed.children);
            }
        }
        true
    }

    /// Returns the number of stored items.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    fn children(&self, id: &ItemId) -> Vec<ItemId> {
        self.storage
            .get(id)
            .map(|entry| entry.children.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RuleSource for InMemoryRuleSource {
    async fn item(&self, id: &ItemId) -> Result<Option<RuleRecord>> {
        Ok(self.storage.get(id).map(|entry| entry.record.clone()))
    }

    async fn descendants(&self, id: &ItemId) -> Result<Vec<RuleRecord>> {
        let mut records = Vec::new();
        let mut stack: Vec<ItemId> = self.children(id).into_iter().rev().collect();

        while let Some(current) = stack.pop() {
            let Some(entry) = self.storage.get(&current) else {
                // Concurrently inserted or removed.
                continue;
            };
            records.push(entry.record.clone());
            stack.extend(entry.children.iter().rev().cloned());
        }

        Ok(records)
    }
}
