use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use uuid::Uuid;

use super::{OrderStore, StorageError};
use crate::domain::order::{AuditEntry, Order, OrderStatus};
use crate::domain::statistics::{AggregateKey, AggregateSnapshot, OrderTotals};

// ============================================================================
// Postgres Backend
// ============================================================================
//
// Tables are created by the embedded migrations in ./migrations:
// - orders            one row per order, status stored as its lowercase code
// - order_status_log  append-only transition audit trail
// - aggregate_stats   versioned aggregate records (JSONB payload)
//
// The status write + audit append run in one transaction. Aggregate CAS is a
// single conditional statement so the compare and the write cannot be split.
//
// ============================================================================

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a bounded pool and apply pending migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::Unavailable(format!("migration failed: {e}")))?;

        tracing::info!(max_connections, "Connected to Postgres order store");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            StorageError::Conflict(db_err.message().to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StorageError::Corrupt(err.to_string())
        }
        other => StorageError::Unavailable(other.to_string()),
    }
}

fn parse_code<T: std::str::FromStr>(column: &str, raw: &str) -> Result<T, StorageError> {
    raw.parse()
        .map_err(|_| StorageError::Corrupt(format!("{column} has unexpected value {raw:?}")))
}

fn version_from_db(raw: i64) -> Result<u64, StorageError> {
    u64::try_from(raw).map_err(|_| StorageError::Corrupt(format!("negative aggregate version {raw}")))
}

fn version_to_db(version: u64) -> Result<i64, StorageError> {
    i64::try_from(version).map_err(|_| StorageError::Corrupt(format!("aggregate version {version} out of range")))
}

fn order_from_row(row: &PgRow) -> Result<Order, StorageError> {
    Ok(Order {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        order_number: row.try_get("order_number").map_err(map_sqlx_error)?,
        order_type: parse_code("order_type", row.try_get("order_type").map_err(map_sqlx_error)?)?,
        status: parse_code("status", row.try_get("status").map_err(map_sqlx_error)?)?,
        total_amount: row.try_get("total_amount").map_err(map_sqlx_error)?,
        payment_status: parse_code(
            "payment_status",
            row.try_get("payment_status").map_err(map_sqlx_error)?,
        )?,
        created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
        updated_at: row.try_get("updated_at").map_err(map_sqlx_error)?,
        is_deleted: row.try_get("is_deleted").map_err(map_sqlx_error)?,
    })
}

fn audit_from_row(row: &PgRow) -> Result<AuditEntry, StorageError> {
    Ok(AuditEntry {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        order_id: row.try_get("order_id").map_err(map_sqlx_error)?,
        sequence: row.try_get("sequence").map_err(map_sqlx_error)?,
        from_status: parse_code("from_status", row.try_get("from_status").map_err(map_sqlx_error)?)?,
        to_status: parse_code("to_status", row.try_get("to_status").map_err(map_sqlx_error)?)?,
        actor: row.try_get("actor").map_err(map_sqlx_error)?,
        note: row.try_get("note").map_err(map_sqlx_error)?,
        recorded_at: row.try_get("recorded_at").map_err(map_sqlx_error)?,
    })
}

const INSERT_AUDIT: &str = r#"
    insert into order_status_log
        (id, order_id, sequence, from_status, to_status, actor, note, recorded_at)
    select $1, $2, coalesce(max(sequence), 0) + 1, $3, $4, $5, $6, $7
    from order_status_log
    where order_id = $2
"#;

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn load_order(&self, id: Uuid) -> Result<Order, StorageError> {
        let row = sqlx::query(
            r#"
            select id, order_number, order_type, status, total_amount,
                   payment_status, created_at, updated_at, is_deleted
            from orders
            where id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        order_from_row(&row)
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            insert into orders
                (id, order_number, order_type, status, total_amount,
                 payment_status, created_at, updated_at, is_deleted)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.order_type.as_str())
        .bind(order.status.as_str())
        .bind(order.total_amount)
        .bind(order.payment_status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.is_deleted)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn save_order_status(
        &self,
        id: Uuid,
        new_status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("update orders set status = $1, updated_at = $2 where id = $3")
            .bind(new_status.as_str())
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn mark_order_deleted(&self, id: Uuid) -> Result<(), StorageError> {
        let res = sqlx::query("update orders set is_deleted = true, updated_at = now() where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn append_audit_entry(&self, entry: &AuditEntry) -> Result<Uuid, StorageError> {
        sqlx::query(INSERT_AUDIT)
            .bind(entry.id)
            .bind(entry.order_id)
            .bind(entry.from_status.as_str())
            .bind(entry.to_status.as_str())
            .bind(&entry.actor)
            .bind(&entry.note)
            .bind(entry.recorded_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(entry.id)
    }

    async fn load_audit_entries(&self, order_id: Uuid) -> Result<Vec<AuditEntry>, StorageError> {
        let rows = sqlx::query(
            r#"
            select id, order_id, sequence, from_status, to_status, actor, note, recorded_at
            from order_status_log
            where order_id = $1
            order by sequence asc
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(audit_from_row).collect()
    }

    async fn commit_transition(&self, entry: &AuditEntry) -> Result<Uuid, StorageError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let res = sqlx::query(
            r#"
            update orders set status = $1, updated_at = $2
            where id = $3 and status = $4 and not is_deleted
            "#,
        )
        .bind(entry.to_status.as_str())
        .bind(entry.recorded_at)
        .bind(entry.order_id)
        .bind(entry.from_status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if res.rows_affected() == 0 {
            let current: Option<(String, bool)> =
                sqlx::query_as("select status, is_deleted from orders where id = $1")
                    .bind(entry.order_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
            return Err(match current {
                None | Some((_, true)) => StorageError::NotFound,
                Some((status, false)) => StorageError::Conflict(format!(
                    "order {} is {}, expected {}",
                    entry.order_id, status, entry.from_status
                )),
            });
        }

        sqlx::query(INSERT_AUDIT)
            .bind(entry.id)
            .bind(entry.order_id)
            .bind(entry.from_status.as_str())
            .bind(entry.to_status.as_str())
            .bind(&entry.actor)
            .bind(&entry.note)
            .bind(entry.recorded_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(entry.id)
    }

    async fn load_aggregate(&self, key: &AggregateKey) -> Result<AggregateSnapshot, StorageError> {
        let row = sqlx::query("select value, version, updated_at from aggregate_stats where key = $1")
            .bind(key.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let Json(value): Json<OrderTotals> = row.try_get("value").map_err(map_sqlx_error)?;
        Ok(AggregateSnapshot {
            key: key.clone(),
            value,
            version: version_from_db(row.try_get("version").map_err(map_sqlx_error)?)?,
            updated_at: row.try_get("updated_at").map_err(map_sqlx_error)?,
        })
    }

    async fn compare_and_swap_aggregate(
        &self,
        key: &AggregateKey,
        expected_version: u64,
        value: &OrderTotals,
    ) -> Result<bool, StorageError> {
        let result = if expected_version == 0 {
            sqlx::query(
                r#"
                insert into aggregate_stats (key, value, version, updated_at)
                values ($1, $2, 1, now())
                on conflict (key) do nothing
                "#,
            )
            .bind(key.as_str())
            .bind(Json(value))
            .execute(&self.pool)
            .await
        } else {
            sqlx::query(
                r#"
                update aggregate_stats
                set value = $1, version = version + 1, updated_at = now()
                where key = $2 and version = $3
                "#,
            )
            .bind(Json(value))
            .bind(key.as_str())
            .bind(version_to_db(expected_version)?)
            .execute(&self.pool)
            .await
        };

        let res = result.map_err(map_sqlx_error)?;
        Ok(res.rows_affected() == 1)
    }
}
