//! Postgres-backed stock store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (serialization failure) | `40001` | `Concurrency` |
//! | Database (foreign key / check violation) | `23503` / `23514` | `InvalidWrite` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed, Io, decode errors, ... | N/A | `Backend` |
//!
//! ## Locking
//!
//! `commit` runs in one SQL transaction: the stock row is locked with
//! `SELECT ... FOR UPDATE`, the version is checked, the row is updated and
//! the movement inserted. Movement ids come from a `BIGSERIAL`, so they
//! increase strictly in commit order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, field, instrument};

use stockledger_core::{AggregateRoot, Cost, ItemId, LocationId, MovementId, Quantity, StockId, UserId};
use stockledger_inventory::{Movement, NewMovement, NewStock, Placement, StockRecord};

use super::r#trait::{Committed, MovementMeta, StockStore, StockUpdate, StoreError};

const STOCK_COLUMNS: &str = "id, item_id, location_id, quantity, aisle, shelf_row, bin, version";
const MOVEMENT_COLUMNS: &str =
    "id, stock_id, before_quantity, after_quantity, reason, cost, created_by, created_at";

/// Postgres-backed stock store.
///
/// `Send + Sync`; all access goes through the SQLx connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: Arc<PgPool>,
}

impl PostgresStockStore {
    /// Relations used by the store. Safe to run repeatedly.
    pub const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS stocks (
            id          BIGSERIAL PRIMARY KEY,
            item_id     BIGINT      NOT NULL,
            location_id BIGINT      NOT NULL,
            quantity    NUMERIC     NOT NULL CHECK (quantity >= 0),
            aisle       TEXT        NULL,
            shelf_row   TEXT        NULL,
            bin         TEXT        NULL,
            version     BIGINT      NOT NULL DEFAULT 1,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (item_id, location_id)
        );

        CREATE TABLE IF NOT EXISTS movements (
            id              BIGSERIAL PRIMARY KEY,
            stock_id        BIGINT      NOT NULL REFERENCES stocks (id) ON DELETE CASCADE,
            before_quantity NUMERIC     NOT NULL,
            after_quantity  NUMERIC     NOT NULL,
            reason          TEXT        NOT NULL DEFAULT '',
            cost            NUMERIC     NOT NULL DEFAULT 0,
            created_by      UUID        NULL,
            created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );

        CREATE INDEX IF NOT EXISTS movements_stock_id_idx ON movements (stock_id, id);
    "#;

    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the store's relations if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(Self::SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, stock, first),
        fields(
            item_id = %stock.item_id,
            location_id = %stock.location_id,
            stock_id = field::Empty
        ),
        err
    )]
    pub async fn insert_stock_async(
        &self,
        stock: NewStock,
        first: MovementMeta,
    ) -> Result<Committed, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(&format!(
            "INSERT INTO stocks (item_id, location_id, quantity, aisle, shelf_row, bin)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {STOCK_COLUMNS}"
        ))
        .bind(to_db_id(stock.item_id.get())?)
        .bind(to_db_id(stock.location_id.get())?)
        .bind(stock.quantity.value())
        .bind(&stock.placement.aisle)
        .bind(&stock.placement.row)
        .bind(&stock.placement.bin)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_stock", e))?;
        let record = stock_from_row(&row)?;

        let movement = insert_movement(
            &mut tx,
            NewMovement {
                stock_id: record.id_typed(),
                before: Quantity::ZERO,
                after: stock.quantity,
                reason: first.reason,
                cost: first.cost,
                created_by: first.created_by,
            },
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("stock_id", record.id_typed().get());
        Ok(Committed {
            stock: record,
            movement: Some(movement),
        })
    }

    #[instrument(skip(self), fields(stock_id = %stock_id), err)]
    pub async fn load_stock_async(&self, stock_id: StockId) -> Result<Option<StockRecord>, StoreError> {
        let row = sqlx::query(&format!("SELECT {STOCK_COLUMNS} FROM stocks WHERE id = $1"))
            .bind(to_db_id(stock_id.get())?)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_stock", e))?;
        row.as_ref().map(stock_from_row).transpose()
    }

    #[instrument(skip(self), fields(item_id = %item_id, location_id = %location_id), err)]
    pub async fn find_stock_async(
        &self,
        item_id: ItemId,
        location_id: LocationId,
    ) -> Result<Option<StockRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {STOCK_COLUMNS} FROM stocks WHERE item_id = $1 AND location_id = $2"
        ))
        .bind(to_db_id(item_id.get())?)
        .bind(to_db_id(location_id.get())?)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_stock", e))?;
        row.as_ref().map(stock_from_row).transpose()
    }

    #[instrument(skip(self), fields(item_id = %item_id), err)]
    pub async fn stocks_for_item_async(&self, item_id: ItemId) -> Result<Vec<StockRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {STOCK_COLUMNS} FROM stocks WHERE item_id = $1 ORDER BY id ASC"
        ))
        .bind(to_db_id(item_id.get())?)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("stocks_for_item", e))?;
        rows.iter().map(stock_from_row).collect()
    }

    /// Version-checked write of a stock row plus its movement.
    #[instrument(
        skip(self, update),
        fields(
            stock_id = %update.stock_id,
            expected_version = ?update.expected_version,
            with_movement = update.movement.is_some()
        ),
        err
    )]
    pub async fn commit_async(&self, update: StockUpdate) -> Result<Committed, StoreError> {
        let db_stock_id = to_db_id(update.stock_id.get())?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(&format!(
            "SELECT {STOCK_COLUMNS} FROM stocks WHERE id = $1 FOR UPDATE"
        ))
        .bind(db_stock_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_stock", e))?;

        // Early returns drop `tx`, which rolls the transaction back.
        let Some(row) = row else {
            return Err(StoreError::NotFound(format!("stock {}", update.stock_id)));
        };
        check_update(&stock_from_row(&row)?, &update)?;

        let row = sqlx::query(&format!(
            "UPDATE stocks
             SET quantity = $2, location_id = $3, version = version + 1, updated_at = NOW()
             WHERE id = $1
             RETURNING {STOCK_COLUMNS}"
        ))
        .bind(db_stock_id)
        .bind(update.quantity.value())
        .bind(to_db_id(update.location_id.get())?)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_stock", e))?;
        let record = stock_from_row(&row)?;

        let movement = match update.movement {
            Some(m) => Some(insert_movement(&mut tx, m).await?),
            None => None,
        };

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(Committed {
            stock: record,
            movement,
        })
    }

    #[instrument(skip(self), fields(stock_id = %stock_id, movement_count = field::Empty), err)]
    pub async fn movements_async(&self, stock_id: StockId) -> Result<Vec<Movement>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM movements WHERE stock_id = $1 ORDER BY id ASC"
        ))
        .bind(to_db_id(stock_id.get())?)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements", e))?;

        Span::current().record("movement_count", rows.len());
        rows.iter().map(movement_from_row).collect()
    }

    #[instrument(skip(self), fields(stock_id = %stock_id, movement_id = %movement_id), err)]
    pub async fn movement_async(
        &self,
        stock_id: StockId,
        movement_id: MovementId,
    ) -> Result<Option<Movement>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM movements WHERE stock_id = $1 AND id = $2"
        ))
        .bind(to_db_id(stock_id.get())?)
        .bind(to_db_id(movement_id.get())?)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movement", e))?;
        row.as_ref().map(movement_from_row).transpose()
    }

    #[instrument(skip(self), fields(stock_id = %stock_id), err)]
    pub async fn last_movement_async(&self, stock_id: StockId) -> Result<Option<Movement>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM movements WHERE stock_id = $1 ORDER BY id DESC LIMIT 1"
        ))
        .bind(to_db_id(stock_id.get())?)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("last_movement", e))?;
        row.as_ref().map(movement_from_row).transpose()
    }

    #[instrument(skip(self), fields(stock_id = %stock_id, from = %from), err)]
    pub async fn movements_from_async(
        &self,
        stock_id: StockId,
        from: MovementId,
    ) -> Result<Vec<Movement>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM movements
             WHERE stock_id = $1 AND id >= $2
             ORDER BY id DESC"
        ))
        .bind(to_db_id(stock_id.get())?)
        .bind(to_db_id(from.get())?)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements_from", e))?;
        rows.iter().map(movement_from_row).collect()
    }

    #[instrument(skip(self), fields(stock_id = %stock_id), err)]
    pub async fn delete_stock_async(&self, stock_id: StockId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM stocks WHERE id = $1")
            .bind(to_db_id(stock_id.get())?)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_stock", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("stock {stock_id}")));
        }
        Ok(())
    }

    /// Run a future on the ambient tokio runtime.
    ///
    /// `StockStore` is synchronous; this works when called from within a
    /// tokio runtime context (e.g. inside `spawn_blocking`).
    fn block_on<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            StoreError::Backend(
                "PostgresStockStore requires a tokio runtime; call it from within a runtime context"
                    .to_string(),
            )
        })?;
        handle.block_on(fut)
    }
}

impl StockStore for PostgresStockStore {
    fn insert_stock(&self, stock: NewStock, first: MovementMeta) -> Result<Committed, StoreError> {
        self.block_on(self.insert_stock_async(stock, first))
    }

    fn load_stock(&self, stock_id: StockId) -> Result<Option<StockRecord>, StoreError> {
        self.block_on(self.load_stock_async(stock_id))
    }

    fn find_stock(&self, item_id: ItemId, location_id: LocationId) -> Result<Option<StockRecord>, StoreError> {
        self.block_on(self.find_stock_async(item_id, location_id))
    }

    fn stocks_for_item(&self, item_id: ItemId) -> Result<Vec<StockRecord>, StoreError> {
        self.block_on(self.stocks_for_item_async(item_id))
    }

    fn commit(&self, update: StockUpdate) -> Result<Committed, StoreError> {
        self.block_on(self.commit_async(update))
    }

    fn movements(&self, stock_id: StockId) -> Result<Vec<Movement>, StoreError> {
        self.block_on(self.movements_async(stock_id))
    }

    fn movement(&self, stock_id: StockId, movement_id: MovementId) -> Result<Option<Movement>, StoreError> {
        self.block_on(self.movement_async(stock_id, movement_id))
    }

    fn last_movement(&self, stock_id: StockId) -> Result<Option<Movement>, StoreError> {
        self.block_on(self.last_movement_async(stock_id))
    }

    fn movements_from(&self, stock_id: StockId, from: MovementId) -> Result<Vec<Movement>, StoreError> {
        self.block_on(self.movements_from_async(stock_id, from))
    }

    fn delete_stock(&self, stock_id: StockId) -> Result<(), StoreError> {
        self.block_on(self.delete_stock_async(stock_id))
    }
}

async fn insert_movement(
    tx: &mut Transaction<'_, Postgres>,
    movement: NewMovement,
) -> Result<Movement, StoreError> {
    let row = sqlx::query(&format!(
        "INSERT INTO movements (stock_id, before_quantity, after_quantity, reason, cost, created_by)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {MOVEMENT_COLUMNS}"
    ))
    .bind(to_db_id(movement.stock_id.get())?)
    .bind(movement.before.value())
    .bind(movement.after.value())
    .bind(&movement.reason)
    .bind(movement.cost.value())
    .bind(movement.created_by.map(|u| *u.as_uuid()))
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_movement", e))?;
    movement_from_row(&row)
}

/// Version and movement-chain checks against the locked row.
fn check_update(current: &StockRecord, update: &StockUpdate) -> Result<(), StoreError> {
    if !update.expected_version.matches(current.version()) {
        return Err(StoreError::Concurrency(format!(
            "expected {:?}, found {}",
            update.expected_version,
            current.version()
        )));
    }

    if let Some(movement) = &update.movement {
        if movement.stock_id != update.stock_id
            || movement.before != current.quantity()
            || movement.after != update.quantity
        {
            return Err(StoreError::InvalidWrite(format!(
                "movement {} -> {} on stock {} does not match stored {} -> {}",
                movement.before,
                movement.after,
                movement.stock_id,
                current.quantity(),
                update.quantity
            )));
        }
    }
    Ok(())
}

fn to_db_id(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::InvalidWrite(format!("id {id} exceeds BIGINT range")))
}

fn from_db_id(column: &str, id: i64) -> Result<u64, StoreError> {
    u64::try_from(id).map_err(|_| StoreError::Backend(format!("negative {column}: {id}")))
}

fn decode<T>(column: &str, value: Result<T, sqlx::Error>) -> Result<T, StoreError> {
    value.map_err(|e| StoreError::Backend(format!("failed to read {column}: {e}")))
}

fn quantity(column: &str, value: Decimal) -> Result<Quantity, StoreError> {
    Quantity::from_decimal(value).map_err(|e| StoreError::Backend(format!("bad {column}: {e}")))
}

fn stock_from_row(row: &PgRow) -> Result<StockRecord, StoreError> {
    let id: i64 = decode("id", row.try_get("id"))?;
    let item_id: i64 = decode("item_id", row.try_get("item_id"))?;
    let location_id: i64 = decode("location_id", row.try_get("location_id"))?;
    let qty: Decimal = decode("quantity", row.try_get("quantity"))?;
    let version: i64 = decode("version", row.try_get("version"))?;

    Ok(StockRecord::from_parts(
        StockId::new(from_db_id("id", id)?),
        ItemId::new(from_db_id("item_id", item_id)?),
        LocationId::new(from_db_id("location_id", location_id)?),
        quantity("quantity", qty)?,
        Placement {
            aisle: decode("aisle", row.try_get("aisle"))?,
            row: decode("shelf_row", row.try_get("shelf_row"))?,
            bin: decode("bin", row.try_get("bin"))?,
        },
        from_db_id("version", version)?,
    ))
}

fn movement_from_row(row: &PgRow) -> Result<Movement, StoreError> {
    let id: i64 = decode("id", row.try_get("id"))?;
    let stock_id: i64 = decode("stock_id", row.try_get("stock_id"))?;
    let before: Decimal = decode("before_quantity", row.try_get("before_quantity"))?;
    let after: Decimal = decode("after_quantity", row.try_get("after_quantity"))?;
    let cost: Decimal = decode("cost", row.try_get("cost"))?;
    let created_by: Option<uuid::Uuid> = decode("created_by", row.try_get("created_by"))?;
    let created_at: DateTime<Utc> = decode("created_at", row.try_get("created_at"))?;

    Ok(Movement {
        id: MovementId::new(from_db_id("id", id)?),
        stock_id: StockId::new(from_db_id("stock_id", stock_id)?),
        before: quantity("before_quantity", before)?,
        after: quantity("after_quantity", after)?,
        reason: decode("reason", row.try_get("reason"))?,
        cost: Cost::new(cost),
        created_by: created_by.map(UserId::from_uuid),
        created_at,
    })
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some(code) => map_sqlstate(code, msg),
                None => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("no row in {operation}")),
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

fn map_sqlstate(code: &str, msg: String) -> StoreError {
    match code {
        "23505" => StoreError::UniqueViolation(msg),
        "40001" | "40P01" => StoreError::Concurrency(msg),
        "23503" | "23514" => StoreError::InvalidWrite(msg),
        _ => StoreError::Backend(msg),
    }
}
