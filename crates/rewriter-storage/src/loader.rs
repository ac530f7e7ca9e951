use async_trait::async_trait;
use rewriter_core::{
    fields, ConfigurationError, HostNameRule, ItemId, LoadedRules, RecordKind, RewriterSettings,
    RuleRecord, RuleSource, RuleStore, UrlRule,
};
use tracing::{debug, error, info, trace};

/// Separator between the source and target URL of a rules table line.
pub const TABLE_DELIMITER: &str = "|>|";
/// Separator between rules table lines.
pub const TABLE_LINE_SEPARATOR: &str = "\r\n";

/// Loads validated rules from a [`RuleSource`].
///
/// Two sources are merged: the descendants of the rules folder item, and
/// the optional rules table item holding `source|>|target` lines.
#[derive(Debug, Clone)]
pub struct RuleLoader<S> {
    source: S,
    rules_folder_id: ItemId,
    rules_table_item_id: Option<ItemId>,
}

impl<S: RuleSource> RuleLoader<S> {
    pub fn new(source: S, settings: &RewriterSettings) -> Self {
        Self {
            source,
            rules_folder_id: settings.rules_folder_id.clone(),
            rules_table_item_id: settings.rules_table_item_id.clone(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    async fn load_folder(&self, rules: &mut LoadedRules) -> Result<(), ConfigurationError> {
        if self.source.item(&self.rules_folder_id).await?.is_none() {
            return Err(ConfigurationError::RulesFolderNotFound(
                self.rules_folder_id.clone(),
            ));
        }

        for record in self.source.descendants(&self.rules_folder_id).await? {
            collect_record(&record, rules);
        }
        Ok(())
    }

    /// Appends the rules table. The table is optional: a missing or
    /// unreadable item leaves the folder rules in place.
    async fn load_table(&self, table_id: &ItemId, rules: &mut LoadedRules) {
        let table = match self.source.item(table_id).await {
            Ok(Some(table)) => table,
            Ok(None) => {
                info!(item = %table_id, "rules table item not found; skipping table rules");
                return;
            }
            Err(e) => {
                error!(item = %table_id, error = %e, "failed to read rules table; skipping table rules");
                return;
            }
        };

        let parsed = parse_rules_table(table_id, table.field(fields::RULES_TABLE));
        debug!(item = %table_id, count = parsed.len(), "parsed rules table");
        rules.url_rules.extend(parsed);
    }
}

fn collect_record(record: &RuleRecord, rules: &mut LoadedRules) {
    match &record.kind {
        RecordKind::UrlRewriteRule => match UrlRule::from_record(record) {
            Ok(rule) => rules.url_rules.push(rule),
            Err(e) => error!(error = %e, "skipping invalid URL rewrite rule"),
        },
        RecordKind::HostNameRewriteRule => match HostNameRule::from_record(record) {
            Ok(rule) => rules.host_rules.push(rule),
            Err(e) => error!(error = %e, "skipping invalid hostname rewrite rule"),
        },
        RecordKind::Other(kind) => {
            trace!(item = %record.id, kind = %kind, "ignoring non-rule item");
        }
    }
}

/// Parses the rules table blob into URL rules.
///
/// Lines are separated by CRLF; empty lines are ignored. Each line is split
/// on `|>|`: the first part is the source and the last part the target.
/// Lines whose source equals their target (including lines without a
/// delimiter) and lines failing validation are skipped. Rule ids are
/// `<table id>#<line number>`, counting from 1 over all lines.
///
/// # Arguments
///
/// * `table_id` - The id of the item the table was read from
/// * `data` - The raw table text
pub fn parse_rules_table(table_id: &ItemId, data: &str) -> Vec<UrlRule> {
    data.split(TABLE_LINE_SEPARATOR)
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .filter_map(|(index, line)| {
            let mut parts = line.split(TABLE_DELIMITER);
            let source = parts.next().unwrap_or_default();
            let target = parts.last().unwrap_or(source);

            if source == target {
                trace!(item = %table_id, line = index + 1, "skipping rules table line without rewrite");
                return None;
            }

            match UrlRule::new(table_id.table_line(index + 1), source, target) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    error!(error = %e, "skipping invalid rules table line");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl<S: RuleSource> RuleStore for RuleLoader<S> {
    async fn load(&self) -> Result<LoadedRules, ConfigurationError> {
        let mut rules = LoadedRules::default();

        self.load_folder(&mut rules).await?;

        if let Some(table_id) = &self.rules_table_item_id {
            self.load_table(table_id, &mut rules).await;
        }

        Ok(rules)
    }
}
