//! `PostgreSQL` JSONB document store.
//!
//! # Tables
//!
//! - `shopfloor.users` - one JSONB user document per row (`id`, `doc`)
//! - `shopfloor.products` - one JSONB product document per row (`id`, `doc`)
//!
//! Pipelines compile to one SQL statement. Updates run in a transaction that
//! holds the user row lock from read to commit, so concurrent updates to one
//! user serialize on that row while other users proceed. Stock decrements join
//! the same transaction. Queries are built at runtime because pipeline SQL is
//! assembled from stages.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use shopfloor_core::{Product, ProductId, UserDocument, UserId};

use super::{DocumentStore, UpdateOutcome, UserSnapshot};
use crate::error::StoreError;
use crate::pipeline::{AggregateRow, Filter, Pipeline, Reduction, Stage};
use crate::update::{Rejection, StockReservation, UserUpdate};

/// A [`DocumentStore`] backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// SQL text for a pipeline plus the values it reads back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPipeline {
    pub sql: String,
    pub document_id: Option<Uuid>,
    pub outputs: Vec<&'static str>,
}

/// Compile a `[Match] [Unwind] Group` pipeline into a single statement.
///
/// # Errors
///
/// Returns `StoreError::Unsupported` for other stage orders, a sum without an
/// unwind, or field names that are not plain identifiers.
pub fn compile(pipeline: &Pipeline) -> Result<CompiledPipeline, StoreError> {
    let mut document_id = None;
    let mut unwind = None;
    let mut accumulators = None;

    for stage in &pipeline.stages {
        match stage {
            Stage::Match(Filter::Id(id))
                if document_id.is_none() && unwind.is_none() && accumulators.is_none() =>
            {
                document_id = Some(*id);
            }
            Stage::Unwind(field) if unwind.is_none() && accumulators.is_none() => {
                unwind = Some(*field);
            }
            Stage::Group(accs) if accumulators.is_none() => accumulators = Some(accs),
            other => {
                return Err(StoreError::Unsupported(format!(
                    "stage out of order: {other:?}"
                )));
            }
        }
    }
    let accumulators = accumulators
        .ok_or_else(|| StoreError::Unsupported("pipeline has no group stage".to_string()))?;

    let mut select = Vec::with_capacity(accumulators.len());
    let mut outputs = Vec::with_capacity(accumulators.len());
    for acc in accumulators {
        ensure_identifier(acc.name)?;
        let expr = match (&acc.reduction, unwind) {
            (Reduction::Count, _) => "COUNT(*)::numeric".to_string(),
            (Reduction::Sum(field), Some(_)) => {
                ensure_identifier(field)?;
                format!("COALESCE(SUM((u.elem ->> '{field}')::numeric), 0)")
            }
            (Reduction::Sum(field), None) => {
                return Err(StoreError::Unsupported(format!(
                    "sum of `{field}` requires an unwind stage"
                )));
            }
        };
        select.push(format!("{expr} AS \"{}\"", acc.name));
        outputs.push(acc.name);
    }

    let mut sql = format!(
        "SELECT {} FROM shopfloor.{} AS d",
        select.join(", "),
        pipeline.collection.name()
    );
    if let Some(field) = unwind {
        sql.push_str(&format!(
            " CROSS JOIN LATERAL jsonb_array_elements(COALESCE(d.doc -> '{}', '[]'::jsonb)) \
             AS u(elem)",
            field.name()
        ));
    }
    if document_id.is_some() {
        sql.push_str(" WHERE d.id = $1");
    }
    // No input rows means no group, not a row of zeros
    sql.push_str(" HAVING COUNT(*) > 0");

    Ok(CompiledPipeline {
        sql,
        document_id,
        outputs,
    })
}

fn ensure_identifier(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::Unsupported(format!("invalid field name `{name}`")))
    }
}

fn decode_user(value: Value) -> Result<UserDocument, StoreError> {
    serde_json::from_value(value)
        .map_err(|e| StoreError::DataCorruption(format!("invalid user document: {e}")))
}

fn decode_product(value: Value) -> Result<Product, StoreError> {
    serde_json::from_value(value)
        .map_err(|e| StoreError::DataCorruption(format!("invalid product document: {e}")))
}

fn decode_rows(
    compiled: &CompiledPipeline,
    rows: &[PgRow],
) -> Result<Vec<AggregateRow>, StoreError> {
    rows.iter()
        .map(|row| {
            let mut values = std::collections::BTreeMap::new();
            for name in &compiled.outputs {
                let value: Decimal = row.try_get(*name).map_err(|e| {
                    StoreError::DataCorruption(format!("accumulator `{name}`: {e}"))
                })?;
                values.insert((*name).to_string(), value);
            }
            Ok(AggregateRow::new(values))
        })
        .collect()
}

fn map_conflict(e: sqlx::Error, what: String) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StoreError::Conflict(what);
    }
    StoreError::Database(e)
}

/// Decrement tracked stock; `false` when the product is missing or short.
async fn take_stock(
    conn: &mut sqlx::PgConnection,
    reservation: &StockReservation,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r"
        UPDATE shopfloor.products
        SET doc = CASE
                WHEN jsonb_typeof(doc -> 'stock') = 'number'
                    THEN jsonb_set(doc, '{stock}', to_jsonb((doc ->> 'stock')::bigint - $2))
                ELSE doc
            END,
            updated_at = now()
        WHERE id = $1
          AND (jsonb_typeof(doc -> 'stock') IS DISTINCT FROM 'number'
               OR (doc ->> 'stock')::bigint >= $2)
        ",
    )
    .bind(reservation.product_id)
    .bind(i64::from(reservation.quantity))
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<AggregateRow>, StoreError> {
        let compiled = compile(pipeline)?;
        tracing::debug!(sql = %compiled.sql, "executing pipeline");

        let mut query = sqlx::query(&compiled.sql);
        if let Some(id) = compiled.document_id {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        decode_rows(&compiled, &rows)
    }

    async fn snapshot_user(
        &self,
        id: UserId,
        pipeline: &Pipeline,
    ) -> Result<Option<UserSnapshot>, StoreError> {
        let compiled = compile(pipeline)?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let row: Option<(Value,)> =
            sqlx::query_as("SELECT doc FROM shopfloor.users WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((doc,)) = row else {
            return Ok(None);
        };
        let user = decode_user(doc)?;

        tracing::debug!(sql = %compiled.sql, "executing pipeline in snapshot");
        let mut query = sqlx::query(&compiled.sql);
        if let Some(document_id) = compiled.document_id {
            query = query.bind(document_id);
        }
        let rows = query.fetch_all(&mut *tx).await?;
        let rows = decode_rows(&compiled, &rows)?;
        tx.commit().await?;

        Ok(Some(UserSnapshot { user, rows }))
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserDocument>, StoreError> {
        let row: Option<(Value,)> = sqlx::query_as("SELECT doc FROM shopfloor.users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(doc,)| decode_user(doc)).transpose()
    }

    async fn insert_user(&self, user: &UserDocument) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO shopfloor.users (id, doc) VALUES ($1, $2)")
            .bind(user.id)
            .bind(Json(user))
            .execute(&self.pool)
            .await
            .map_err(|e| map_conflict(e, format!("user {} already exists", user.id)))?;
        Ok(())
    }

    async fn update_user(
        &self,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        // Dropping `tx` without commit rolls back, including on timeout.
        let mut tx = self.pool.begin().await?;

        let row: Option<(Value,)> =
            sqlx::query_as("SELECT doc FROM shopfloor.users WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((doc,)) = row else {
            return Ok(UpdateOutcome::UserNotFound);
        };
        let current = decode_user(doc)?;

        let (next, applied) = match update.apply(&current) {
            Ok(result) => result,
            Err(rejection) => return Ok(UpdateOutcome::Rejected(rejection)),
        };

        for reservation in &applied.reservations {
            if !take_stock(&mut *tx, reservation).await? {
                return Ok(UpdateOutcome::Rejected(Rejection::OutOfStock(
                    reservation.product_id,
                )));
            }
        }

        sqlx::query("UPDATE shopfloor.users SET doc = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(Json(&next))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(UpdateOutcome::Applied(applied))
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row: Option<(Value,)> =
            sqlx::query_as("SELECT doc FROM shopfloor.products WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(doc,)| decode_product(doc)).transpose()
    }

    async fn upsert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO shopfloor.products (id, doc)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc, updated_at = now()
            ",
        )
        .bind(product.id)
        .bind(Json(product))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
