use async_trait::async_trait;
use rewriter_core::source::Result;
use rewriter_core::{ItemId, RecordKind, RuleRecord, RuleSource, StorageError};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

/// MySQL implementation of the rule source contract.
///
/// Items live in `rewrite_items` (a parent/child tree ordered by
/// `sort_order`, then id) and their named field values in
/// `rewrite_item_fields`. See `ddl/mysql/rewrite_items.sql`.
#[derive(Debug, Clone)]
pub struct MySqlRuleSource {
    pool: MySqlPool,
}

impl MySqlRuleSource {
    /// Creates a rule source from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a rule source by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Inserts an item and its fields below `parent`.
    pub async fn insert(
        &self,
        parent: Option<&ItemId>,
        sort_order: u32,
        record: &RuleRecord,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let result = sqlx::query(
            r#"
            INSERT INTO rewrite_items (id, parent_id, template, sort_order)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(record.id.as_str())
        .bind(parent.map(ItemId::as_str))
        .bind(record.kind.as_str())
        .bind(sort_order)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(StorageError::Operation(format!(
                    "item '{}' already exists",
                    record.id
                )))
            }
            Err(err) => return Err(map_sqlx_error(err)),
        }

        for (name, value) in &record.fields {
            sqlx::query(
                r#"
                INSERT INTO rewrite_item_fields (item_id, field_name, field_value)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(record.id.as_str())
            .bind(name)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

/// Folds `(id, template, field_name, field_value)` rows, ordered by item,
/// into records. Items without fields yield a single row with NULL fields.
fn fold_rows(rows: Vec<MySqlRow>) -> Result<Vec<RuleRecord>> {
    let mut records: Vec<RuleRecord> = Vec::new();

    for row in rows {
        let id: String = row.try_get("id").map_err(map_sqlx_error)?;
        let template: String = row.try_get("template").map_err(map_sqlx_error)?;
        let field_name: Option<String> = row.try_get("field_name").map_err(map_sqlx_error)?;
        let field_value: Option<String> = row.try_get("field_value").map_err(map_sqlx_error)?;

        let is_same_item = records.last().is_some_and(|last| last.id.as_str() == id);
        if !is_same_item {
            let id = ItemId::new(id)
                .map_err(|e| StorageError::InvalidData(format!("invalid item id: {e}")))?;
            records.push(RuleRecord::new(id, RecordKind::from(template)));
        }

        if let (Some(name), Some(value), Some(record)) = (field_name, field_value, records.last_mut())
        {
            record.fields.insert(name, value);
        }
    }

    Ok(records)
}

#[async_trait]
impl RuleSource for MySqlRuleSource {
    async fn item(&self, id: &ItemId) -> Result<Option<RuleRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT i.id, i.template, f.field_name, f.field_value
            FROM rewrite_items i
            LEFT JOIN rewrite_item_fields f ON f.item_id = i.id
            WHERE i.id = ?
            ORDER BY f.field_name
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(fold_rows(rows)?.pop())
    }

    async fn descendants(&self, id: &ItemId) -> Result<Vec<RuleRecord>> {
        // sort_key is the zero-padded sibling position of every ancestor,
        // so ordering by it yields depth-first document order.
        let rows = sqlx::query(
            r#"
            WITH RECURSIVE ordered AS (
                SELECT id, parent_id, template,
                       LPAD(ROW_NUMBER() OVER (PARTITION BY parent_id ORDER BY sort_order, id), 10, '0') AS position
                FROM rewrite_items
            ),
            tree (id, template, sort_key) AS (
                SELECT id, template, CAST(position AS CHAR(2048))
                FROM ordered
                WHERE parent_id = ?
                UNION ALL
                SELECT o.id, o.template, CONCAT(t.sort_key, '/', o.position)
                FROM ordered o
                JOIN tree t ON o.parent_id = t.id
            )
            SELECT t.id, t.template, f.field_name, f.field_value
            FROM tree t
            LEFT JOIN rewrite_item_fields f ON f.item_id = t.id
            ORDER BY t.sort_key, f.field_name
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        fold_rows(rows)
    }
}
