use rewriter_core::{ItemId, RecordKind, RuleRecord, StorageError};
use rewriter_storage::InMemoryRuleSource;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Kind of the folder item created for the in-memory backend.
const RULES_FOLDER_KIND: &str = "RewriteRulesFolder";

/// One item of a seed file. Items are inserted in file order, so parents
/// must precede their children.
#[derive(Debug, Deserialize)]
struct SeedItem {
    #[serde(default)]
    parent: Option<ItemId>,
    #[serde(flatten)]
    record: RuleRecord,
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse seed file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to insert seed item: {0}")]
    Storage(#[from] StorageError),
}

/// Builds the in-memory rule source: the rules folder, then the items of
/// the seed file if one is given.
pub fn in_memory_source(
    rules_folder_id: &ItemId,
    seed_file: Option<&Path>,
) -> Result<InMemoryRuleSource, SeedError> {
    let source = InMemoryRuleSource::new();
    source.insert(
        None,
        RuleRecord::new(rules_folder_id.clone(), RecordKind::from(RULES_FOLDER_KIND)),
    )?;

    if let Some(path) = seed_file {
        let items: Vec<SeedItem> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        let count = items.len();
        for item in items {
            source.insert(item.parent.as_ref(), item.record)?;
        }
        info!(path = %path.display(), count, "seeded in-memory rule source");
    }

    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewriter_core::RuleSource;

    #[tokio::test]
    async fn seeds_items_below_rules_folder() {
        let dir = std::env::temp_dir().join(format!("rewriter-seed-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("seed.json");
        std::fs::write(
            &path,
            r#"[
                {"parent": "rules", "id": "u1", "kind": "UrlRewriteRule",
                 "fields": {"SourceUrl": "/old", "TargetUrl": "/new"}},
                {"id": "table", "kind": "RulesTable"}
            ]"#,
        )
        .unwrap();

        let rules = ItemId::new_unchecked("rules");
        let source = in_memory_source(&rules, Some(&path)).unwrap();

        let descendants = source.descendants(&rules).await.unwrap();
        assert_eq!(descendants.len(), 1);
        assert_eq!(descendants[0].kind, RecordKind::UrlRewriteRule);
        assert!(source.item(&ItemId::new_unchecked("table")).await.unwrap().is_some());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let dir = std::env::temp_dir().join(format!("rewriter-seed-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("seed.json");
        std::fs::write(&path, r#"[{"parent": "nope", "id": "u1", "kind": "UrlRewriteRule"}]"#)
            .unwrap();

        let result = in_memory_source(&ItemId::new_unchecked("rules"), Some(&path));
        assert!(matches!(result, Err(SeedError::Storage(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
