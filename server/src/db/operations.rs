//! Database operations for the operations table.

use colsync_engine::{Operation, SequencedOp};
use sqlx::{PgPool, Row};

/// A stored operation row from the database.
#[derive(Debug)]
pub struct StoredOperation {
    pub partition_key: String,
    pub seq: i64,
    pub operation: serde_json::Value,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredOperation {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredOperation {
            partition_key: row.try_get("partition_key")?,
            seq: row.try_get("seq")?,
            operation: row.try_get("operation")?,
        })
    }
}

impl StoredOperation {
    /// Convert database row to a sequenced engine operation.
    pub fn to_sequenced(&self) -> Result<SequencedOp, String> {
        let operation: Operation = serde_json::from_value(self.operation.clone()).map_err(|e| {
            format!(
                "Undecodable operation {} in partition {}: {}",
                self.seq, self.partition_key, e
            )
        })?;
        Ok(SequencedOp {
            seq: self.seq as u64,
            operation,
        })
    }
}

/// Insert newly sequenced operations of a partition in one transaction.
pub async fn insert_operations(
    pool: &PgPool,
    partition: &str,
    ops: &[SequencedOp],
) -> Result<(), sqlx::Error> {
    if ops.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for sequenced in ops {
        let op = &sequenced.operation;
        let encoded = serde_json::to_value(op).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query(
            r#"
            INSERT INTO operations (
                partition_key, seq, node_id, clock_counter, object_key,
                op_type, timestamp, operation
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(partition)
        .bind(sequenced.seq as i64)
        .bind(&op.clock.node_id)
        .bind(op.clock.counter as i64)
        .bind(&op.object)
        .bind(op.kind.name())
        .bind(op.timestamp as i64)
        .bind(encoded)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

/// Load the full sequenced log of a partition, in sequence order.
pub async fn load_partition(
    pool: &PgPool,
    partition: &str,
) -> Result<Vec<StoredOperation>, sqlx::Error> {
    sqlx::query_as::<_, StoredOperation>(
        r#"
        SELECT partition_key, seq, operation
        FROM operations
        WHERE partition_key = $1
        ORDER BY seq ASC
        "#,
    )
    .bind(partition)
    .fetch_all(pool)
    .await
}

/// Check that the database answers.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
