use crate::error::StorageError;
use crate::item::ItemId;
use crate::record::RuleRecord;
use async_trait::async_trait;

/// Result type for rule source operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A read-only view of the hierarchical repository that defines rewrite rules.
///
/// The rewriter never writes rules; it only reads a snapshot of them when
/// the rule cache is (re)loaded.
#[async_trait]
pub trait RuleSource: Send + Sync + 'static {
    /// Retrieves a single item. Returns `None` if it does not exist.
    async fn item(&self, id: &ItemId) -> Result<Option<RuleRecord>>;

    /// Returns all descendants of an item in depth-first document order.
    ///
    /// Returns an empty list if the item has no children or does not exist.
    async fn descendants(&self, id: &ItemId) -> Result<Vec<RuleRecord>>;
}

#[async_trait]
impl<T: RuleSource + ?Sized> RuleSource for std::sync::Arc<T> {
    async fn item(&self, id: &ItemId) -> Result<Option<RuleRecord>> {
        (**self).item(id).await
    }

    async fn descendants(&self, id: &ItemId) -> Result<Vec<RuleRecord>> {
        (**self).descendants(id).await
    }
}
