use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::{DbError, DbResult};

use super::types::{Currency, Transaction};

/// Read-only cursor over stored transactions.
///
/// Batches are keyed by `id`: `fetch_batch(after, limit)` returns up to
/// `limit` transactions whose id sorts strictly after `after`. A batch shorter
/// than `limit` means the source is exhausted.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Total number of stored transactions.
    async fn count_transactions(&self) -> DbResult<u64>;

    /// Fetch the next batch after the given id.
    async fn fetch_batch(&self, after: Option<&str>, limit: usize) -> DbResult<Vec<Transaction>>;
}

struct BatchCursor {
    source: Arc<dyn TransactionSource>,
    after: Option<String>,
    exhausted: bool,
    batches: u64,
}

/// Lazily stream every transaction of `source`, fetching `batch_size` at a time.
///
/// The next batch is requested only once the previous one has been fully
/// consumed, so at most one batch is held in memory.
pub fn batched_stream(
    source: Arc<dyn TransactionSource>,
    batch_size: usize,
) -> BoxStream<'static, DbResult<Transaction>> {
    let cursor = BatchCursor {
        source,
        after: None,
        exhausted: false,
        batches: 0,
    };

    stream::try_unfold(cursor, move |mut cursor| async move {
        if cursor.exhausted {
            return Ok::<_, DbError>(None);
        }

        let batch = cursor
            .source
            .fetch_batch(cursor.after.as_deref(), batch_size)
            .await?;
        if batch.is_empty() {
            return Ok(None);
        }

        cursor.batches += 1;
        cursor.exhausted = batch.len() < batch_size;
        cursor.after = batch.last().map(|t| t.id.clone());
        log::debug!("Fetched batch {} with {} transactions", cursor.batches, batch.len());

        let items = stream::iter(batch.into_iter().map(Ok::<Transaction, DbError>));
        Ok(Some((items, cursor)))
    })
    .try_flatten()
    .boxed()
}

const SELECT_COLUMNS: &str =
    "SELECT id, amount, currency, transaction_date, category, created_at FROM transactions";

/// SQLite-backed transaction store.
///
/// Amounts are kept as decimal TEXT and timestamps as RFC 3339 TEXT so that
/// nothing passes through a binary float on the way to the export.
pub struct SqliteTransactionRepository {
    pool: SqlitePool,
}

impl SqliteTransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the `transactions` table if it does not exist.
    pub async fn init_schema(&self) -> DbResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY NOT NULL,
                amount TEXT NOT NULL,
                currency TEXT NOT NULL,
                transaction_date TEXT NOT NULL,
                category TEXT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn from_row(row: &SqliteRow) -> DbResult<Transaction> {
        let id: String = row.try_get("id")?;
        let amount: String = row.try_get("amount")?;
        let currency: String = row.try_get("currency")?;
        let transaction_date: String = row.try_get("transaction_date")?;
        let category: Option<String> = row.try_get("category")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(Transaction {
            amount: Decimal::from_str(&amount).map_err(|e| DbError::decode("amount", e))?,
            currency: Currency::from_str(&currency).map_err(|e| DbError::decode("currency", e))?,
            transaction_date: parse_timestamp("transaction_date", &transaction_date)?,
            category,
            created_at: parse_timestamp("created_at", &created_at)?,
            id,
        })
    }
}

fn parse_timestamp(column: &str, value: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::decode(column, e))
}

#[async_trait]
impl TransactionSource for SqliteTransactionRepository {
    async fn count_transactions(&self) -> DbResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;
        u64::try_from(count).map_err(|_| DbError::Query(format!("negative row count {}", count)))
    }

    async fn fetch_batch(&self, after: Option<&str>, limit: usize) -> DbResult<Vec<Transaction>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_COLUMNS);

        if let Some(after_id) = after {
            query.push(" WHERE id > ");
            query.push_bind(after_id.to_string());
        }

        query.push(" ORDER BY id ASC LIMIT ");
        query.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

        let rows = query.build().fetch_all(&self.pool).await?;

        rows.iter().map(Self::from_row).collect()
    }
}

/// Vec-backed transaction source, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransactionSource {
    transactions: Vec<Transaction>,
}

impl InMemoryTransactionSource {
    pub fn new(mut transactions: Vec<Transaction>) -> Self {
        transactions.sort_by(|a, b| a.id.cmp(&b.id));
        Self { transactions }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[async_trait]
impl TransactionSource for InMemoryTransactionSource {
    async fn count_transactions(&self) -> DbResult<u64> {
        Ok(self.transactions.len() as u64)
    }

    async fn fetch_batch(&self, after: Option<&str>, limit: usize) -> DbResult<Vec<Transaction>> {
        let start = match after {
            Some(after_id) => self.transactions.partition_point(|t| t.id.as_str() <= after_id),
            None => 0,
        };
        Ok(self.transactions.iter().skip(start).take(limit).cloned().collect())
    }
}
