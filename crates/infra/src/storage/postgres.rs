//! Postgres-backed storage implementation.
//!
//! Row-level locking discipline: every stock mutation loads the inventory row
//! with `SELECT ... FOR UPDATE` inside the operation's transaction, so
//! concurrent consumers of the same inventory serialize while disjoint
//! inventories proceed in parallel. The schema lives in `migrations/` and is
//! applied with [`PgBackend::migrate`].
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Duplicate` | Duplicate SKU / order number |
//! | Database (foreign key violation) | `23503` | `NotFound` | Referenced row missing |
//! | Database (other) | Any other | `Backend` | Check violations, etc. |
//! | Any non-database error | N/A | `Backend` | Pool closed, network failures, decode errors |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use backstock_core::{
    BatchRunId, CompositionId, ExportId, HistoryId, InventoryId, OrderId, OrderLineId, ProductId,
    UserId,
};
use backstock_inventory::{FieldValue, HistoryEntry, HistoryKind, InventoryRecord, Sku, TrackedField};
use backstock_orders::{Order, OrderChannel, OrderLine, OrderNumber, OrderStatus};
use backstock_production::{BatchRun, Composition, CompositionItem};
use backstock_products::Product;
use rust_decimal::Decimal;

use crate::exports::{DataExport, ExportKind, ExportStatus};

use super::{StorageBackend, StorageTx, StoreError};

/// Postgres storage backend. Cloneable; the pool is shared.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migrate: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// One open Postgres transaction; rolls back on drop unless committed.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

fn map_sqlx_error(operation: &str, error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => StoreError::Duplicate(db.message().to_string()),
            Some("23503") => StoreError::NotFound(db.message().to_string()),
            _ => StoreError::Backend(format!("{operation}: {error}")),
        },
        _ => StoreError::Backend(format!("{operation}: {error}")),
    }
}

fn corrupt(table: &str, detail: impl core::fmt::Display) -> StoreError {
    StoreError::Backend(format!("corrupt row in {table}: {detail}"))
}

// Text <-> enum mappings. Stored as plain text columns; unknown values are a
// backend failure, never a panic.

fn order_status_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::ProcessPayment => "process_payment",
        OrderStatus::Paid => "paid",
        OrderStatus::OnDelivery => "on_delivery",
        OrderStatus::Delivered => "delivered",
        OrderStatus::Completed => "completed",
        OrderStatus::Cancelled => "cancelled",
    }
}

fn order_status_from(s: &str) -> Result<OrderStatus, StoreError> {
    Ok(match s {
        "pending" => OrderStatus::Pending,
        "process_payment" => OrderStatus::ProcessPayment,
        "paid" => OrderStatus::Paid,
        "on_delivery" => OrderStatus::OnDelivery,
        "delivered" => OrderStatus::Delivered,
        "completed" => OrderStatus::Completed,
        "cancelled" => OrderStatus::Cancelled,
        other => return Err(corrupt("orders", format!("status {other}"))),
    })
}

fn channel_str(channel: OrderChannel) -> &'static str {
    match channel {
        OrderChannel::Storefront => "storefront",
        OrderChannel::PointOfSale => "point_of_sale",
        OrderChannel::Manual => "manual",
    }
}

fn channel_from(s: &str) -> Result<OrderChannel, StoreError> {
    Ok(match s {
        "storefront" => OrderChannel::Storefront,
        "point_of_sale" => OrderChannel::PointOfSale,
        "manual" => OrderChannel::Manual,
        other => return Err(corrupt("orders", format!("channel {other}"))),
    })
}

fn history_kind_str(kind: HistoryKind) -> &'static str {
    match kind {
        HistoryKind::FieldChange => "field_change",
        HistoryKind::StockAdjustment => "stock_adjustment",
    }
}

fn history_kind_from(s: &str) -> Result<HistoryKind, StoreError> {
    Ok(match s {
        "field_change" => HistoryKind::FieldChange,
        "stock_adjustment" => HistoryKind::StockAdjustment,
        other => return Err(corrupt("inventory_histories", format!("kind {other}"))),
    })
}

fn tracked_field_str(field: TrackedField) -> &'static str {
    match field {
        TrackedField::Name => "name",
        TrackedField::Price => "price",
        TrackedField::Sku => "sku",
        TrackedField::Stock => "stock",
    }
}

fn tracked_field_from(s: &str) -> Result<TrackedField, StoreError> {
    Ok(match s {
        "name" => TrackedField::Name,
        "price" => TrackedField::Price,
        "sku" => TrackedField::Sku,
        "stock" => TrackedField::Stock,
        other => return Err(corrupt("inventory_histories", format!("field {other}"))),
    })
}

fn export_kind_str(kind: ExportKind) -> &'static str {
    match kind {
        ExportKind::Inventories => "inventories",
        ExportKind::Orders => "orders",
    }
}

fn export_kind_from(s: &str) -> Result<ExportKind, StoreError> {
    Ok(match s {
        "inventories" => ExportKind::Inventories,
        "orders" => ExportKind::Orders,
        other => return Err(corrupt("data_exports", format!("kind {other}"))),
    })
}

fn export_status_str(status: ExportStatus) -> &'static str {
    match status {
        ExportStatus::Pending => "pending",
        ExportStatus::Processing => "processing",
        ExportStatus::Success => "success",
        ExportStatus::Failed => "failed",
    }
}

fn export_status_from(s: &str) -> Result<ExportStatus, StoreError> {
    Ok(match s {
        "pending" => ExportStatus::Pending,
        "processing" => ExportStatus::Processing,
        "success" => ExportStatus::Success,
        "failed" => ExportStatus::Failed,
        other => return Err(corrupt("data_exports", format!("status {other}"))),
    })
}

// Row mappers.

fn inventory_from_row(row: &PgRow) -> Result<InventoryRecord, StoreError> {
    let getter = |e: sqlx::Error| map_sqlx_error("decode inventories", e);
    let sku_raw: String = row.try_get("sku").map_err(getter)?;
    Ok(InventoryRecord {
        id: InventoryId::from_uuid(row.try_get::<Uuid, _>("id").map_err(getter)?),
        product_id: row
            .try_get::<Option<Uuid>, _>("product_id")
            .map_err(getter)?
            .map(ProductId::from_uuid),
        name: row.try_get("name").map_err(getter)?,
        sku: Sku::new(sku_raw).map_err(|e| corrupt("inventories", e))?,
        unit: row.try_get("unit").map_err(getter)?,
        price: row.try_get::<Decimal, _>("price").map_err(getter)?,
        stock: row.try_get::<Decimal, _>("stock").map_err(getter)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(getter)?,
        updated_at: row
            .try_get::<DateTime<Utc>, _>("updated_at")
            .map_err(getter)?,
    })
}

fn history_from_row(row: &PgRow) -> Result<HistoryEntry, StoreError> {
    let getter = |e: sqlx::Error| map_sqlx_error("decode inventory_histories", e);
    let kind: String = row.try_get("kind").map_err(getter)?;
    let field: String = row.try_get("field").map_err(getter)?;
    let previous: serde_json::Value = row.try_get("previous").map_err(getter)?;
    let new_value: serde_json::Value = row.try_get("new_value").map_err(getter)?;
    Ok(HistoryEntry {
        id: HistoryId::from_uuid(row.try_get::<Uuid, _>("id").map_err(getter)?),
        inventory_id: InventoryId::from_uuid(row.try_get::<Uuid, _>("inventory_id").map_err(getter)?),
        actor: row
            .try_get::<Option<Uuid>, _>("actor")
            .map_err(getter)?
            .map(UserId::from_uuid),
        title: row.try_get("title").map_err(getter)?,
        description: row.try_get("description").map_err(getter)?,
        kind: history_kind_from(&kind)?,
        field: tracked_field_from(&field)?,
        previous: serde_json::from_value::<FieldValue>(previous)
            .map_err(|e| corrupt("inventory_histories", e))?,
        new: serde_json::from_value::<FieldValue>(new_value)
            .map_err(|e| corrupt("inventory_histories", e))?,
        recorded_at: row
            .try_get::<DateTime<Utc>, _>("recorded_at")
            .map_err(getter)?,
    })
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let getter = |e: sqlx::Error| map_sqlx_error("decode products", e);
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id").map_err(getter)?),
        name: row.try_get("name").map_err(getter)?,
        price: row.try_get::<Decimal, _>("price").map_err(getter)?,
        inventory_id: InventoryId::from_uuid(row.try_get::<Uuid, _>("inventory_id").map_err(getter)?),
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(getter)?,
        updated_at: row
            .try_get::<DateTime<Utc>, _>("updated_at")
            .map_err(getter)?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let getter = |e: sqlx::Error| map_sqlx_error("decode orders", e);
    let status: String = row.try_get("status").map_err(getter)?;
    let channel: String = row.try_get("channel").map_err(getter)?;
    let number: String = row.try_get("number").map_err(getter)?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id").map_err(getter)?),
        number: OrderNumber::from_string(number).map_err(|e| corrupt("orders", e))?,
        customer: row.try_get("customer").map_err(getter)?,
        status: order_status_from(&status)?,
        channel: channel_from(&channel)?,
        total: row.try_get::<Decimal, _>("total").map_err(getter)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(getter)?,
        updated_at: row
            .try_get::<DateTime<Utc>, _>("updated_at")
            .map_err(getter)?,
    })
}

fn line_from_row(row: &PgRow) -> Result<OrderLine, StoreError> {
    let getter = |e: sqlx::Error| map_sqlx_error("decode product_orders", e);
    Ok(OrderLine {
        id: OrderLineId::from_uuid(row.try_get::<Uuid, _>("id").map_err(getter)?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id").map_err(getter)?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id").map_err(getter)?),
        quantity: row.try_get::<i64, _>("quantity").map_err(getter)?,
    })
}

fn composition_from_rows(
    row: &PgRow,
    item_rows: &[PgRow],
) -> Result<Composition, StoreError> {
    let getter = |e: sqlx::Error| map_sqlx_error("decode compositions", e);
    let mut items = Vec::with_capacity(item_rows.len());
    for item in item_rows {
        items.push(CompositionItem {
            ingredient: InventoryId::from_uuid(item.try_get::<Uuid, _>("ingredient").map_err(getter)?),
            category: item.try_get("category").map_err(getter)?,
            stock_used: item.try_get::<Decimal, _>("stock_used").map_err(getter)?,
            cost: item.try_get::<Decimal, _>("cost").map_err(getter)?,
        });
    }
    Ok(Composition {
        id: CompositionId::from_uuid(row.try_get::<Uuid, _>("id").map_err(getter)?),
        name: row.try_get("name").map_err(getter)?,
        finished_good: InventoryId::from_uuid(row.try_get::<Uuid, _>("finished_good").map_err(getter)?),
        labor_cost: row.try_get::<Decimal, _>("labor_cost").map_err(getter)?,
        yield_per_batch: row.try_get::<i64, _>("yield_per_batch").map_err(getter)?,
        items,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(getter)?,
        updated_at: row
            .try_get::<DateTime<Utc>, _>("updated_at")
            .map_err(getter)?,
    })
}

fn batch_run_from_row(row: &PgRow) -> Result<BatchRun, StoreError> {
    let getter = |e: sqlx::Error| map_sqlx_error("decode batch_runs", e);
    Ok(BatchRun {
        id: BatchRunId::from_uuid(row.try_get::<Uuid, _>("id").map_err(getter)?),
        composition_id: CompositionId::from_uuid(
            row.try_get::<Uuid, _>("composition_id").map_err(getter)?,
        ),
        actor: row
            .try_get::<Option<Uuid>, _>("actor")
            .map_err(getter)?
            .map(UserId::from_uuid),
        requested_batches: row.try_get::<i64, _>("requested_batches").map_err(getter)?,
        processed_batches: row.try_get::<i64, _>("processed_batches").map_err(getter)?,
        recorded_at: row
            .try_get::<DateTime<Utc>, _>("recorded_at")
            .map_err(getter)?,
    })
}

fn export_from_row(row: &PgRow) -> Result<DataExport, StoreError> {
    let getter = |e: sqlx::Error| map_sqlx_error("decode data_exports", e);
    let kind: String = row.try_get("kind").map_err(getter)?;
    let status: String = row.try_get("status").map_err(getter)?;
    Ok(DataExport {
        id: ExportId::from_uuid(row.try_get::<Uuid, _>("id").map_err(getter)?),
        kind: export_kind_from(&kind)?,
        status: export_status_from(&status)?,
        error: row.try_get("error").map_err(getter)?,
        row_count: row.try_get("row_count").map_err(getter)?,
        requested_by: row
            .try_get::<Option<Uuid>, _>("requested_by")
            .map_err(getter)?
            .map(UserId::from_uuid),
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(getter)?,
        updated_at: row
            .try_get::<DateTime<Utc>, _>("updated_at")
            .map_err(getter)?,
        completed_at: row
            .try_get::<Option<DateTime<Utc>>, _>("completed_at")
            .map_err(getter)?,
    })
}

const SELECT_INVENTORY: &str = "SELECT id, product_id, name, sku, unit, price, stock, created_at, updated_at FROM inventories";
const SELECT_PRODUCT: &str = "SELECT id, name, price, inventory_id, created_at, updated_at FROM products";
const SELECT_ORDER: &str = "SELECT id, number, customer, status, channel, total, created_at, updated_at FROM orders";
const SELECT_LINE: &str = "SELECT id, order_id, product_id, quantity FROM product_orders";
const SELECT_COMPOSITION: &str = "SELECT id, name, finished_good, labor_cost, yield_per_batch, created_at, updated_at FROM compositions";
const SELECT_ITEMS: &str = "SELECT ingredient, category, stock_used, cost FROM composition_items WHERE composition_id = $1 ORDER BY position";
const SELECT_BATCH_RUN: &str = "SELECT id, composition_id, actor, requested_batches, processed_batches, recorded_at FROM batch_runs";
const SELECT_EXPORT: &str = "SELECT id, kind, status, error, row_count, requested_by, created_at, updated_at, completed_at FROM data_exports";

#[async_trait]
impl StorageBackend for PgBackend {
    type Tx = PgTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PgTx { tx })
    }

    #[instrument(skip(self), fields(inventory_id = %id))]
    async fn get_inventory(&self, id: InventoryId) -> Result<Option<InventoryRecord>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_INVENTORY} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_inventory", e))?;
        row.as_ref().map(inventory_from_row).transpose()
    }

    async fn list_inventories(&self) -> Result<Vec<InventoryRecord>, StoreError> {
        let rows = sqlx::query(&format!("{SELECT_INVENTORY} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_inventories", e))?;
        rows.iter().map(inventory_from_row).collect()
    }

    #[instrument(skip(self, record), fields(inventory_id = %record.id))]
    async fn insert_inventory(&self, record: &InventoryRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventories (id, product_id, name, sku, unit, price, stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.product_id.map(|p| *p.as_uuid()))
        .bind(&record.name)
        .bind(record.sku.as_str())
        .bind(&record.unit)
        .bind(record.price)
        .bind(record.stock)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_inventory", e))?;
        Ok(())
    }

    async fn history_for(
        &self,
        id: InventoryId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, inventory_id, actor, title, description, kind, field, previous, new_value, recorded_at
            FROM inventory_histories
            WHERE inventory_id = $1
            ORDER BY recorded_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("history_for", e))?;
        rows.iter().map(history_from_row).collect()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_PRODUCT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!("{SELECT_PRODUCT} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id))]
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_product", e))?;
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, inventory_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price)
        .bind(product.inventory_id.as_uuid())
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        // Back-link the stock record to its sellable product.
        let updated = sqlx::query("UPDATE inventories SET product_id = $1 WHERE id = $2")
            .bind(product.id.as_uuid())
            .bind(product.inventory_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_product", e))?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "inventory {}",
                product.inventory_id
            )));
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_ORDER} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!("{SELECT_ORDER} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_orders", e))?;
        rows.iter().map(order_from_row).collect()
    }

    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        let rows = sqlx::query(&format!("{SELECT_LINE} WHERE order_id = $1 ORDER BY id"))
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("order_lines", e))?;
        rows.iter().map(line_from_row).collect()
    }

    async fn get_composition(
        &self,
        id: CompositionId,
    ) -> Result<Option<Composition>, StoreError> {
        let Some(row) = sqlx::query(&format!("{SELECT_COMPOSITION} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_composition", e))?
        else {
            return Ok(None);
        };
        let items = sqlx::query(SELECT_ITEMS)
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_composition", e))?;
        Ok(Some(composition_from_rows(&row, &items)?))
    }

    async fn list_compositions(&self) -> Result<Vec<Composition>, StoreError> {
        let rows = sqlx::query(&format!("{SELECT_COMPOSITION} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_compositions", e))?;
        let mut compositions = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: Uuid = row
                .try_get("id")
                .map_err(|e| map_sqlx_error("list_compositions", e))?;
            let items = sqlx::query(SELECT_ITEMS)
                .bind(id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_compositions", e))?;
            compositions.push(composition_from_rows(row, &items)?);
        }
        Ok(compositions)
    }

    #[instrument(skip(self, composition), fields(composition_id = %composition.id))]
    async fn insert_composition(&self, composition: &Composition) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_composition", e))?;
        sqlx::query(
            r#"
            INSERT INTO compositions (id, name, finished_good, labor_cost, yield_per_batch, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(composition.id.as_uuid())
        .bind(&composition.name)
        .bind(composition.finished_good.as_uuid())
        .bind(composition.labor_cost)
        .bind(composition.yield_per_batch)
        .bind(composition.created_at)
        .bind(composition.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_composition", e))?;

        for (position, item) in composition.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO composition_items (id, composition_id, ingredient, category, stock_used, cost, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(composition.id.as_uuid())
            .bind(item.ingredient.as_uuid())
            .bind(&item.category)
            .bind(item.stock_used)
            .bind(item.cost)
            .bind(position as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_composition", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_composition", e))?;
        Ok(())
    }

    async fn batch_runs_for(&self, id: CompositionId) -> Result<Vec<BatchRun>, StoreError> {
        let rows = sqlx::query(&format!(
            "{SELECT_BATCH_RUN} WHERE composition_id = $1 ORDER BY id"
        ))
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("batch_runs_for", e))?;
        rows.iter().map(batch_run_from_row).collect()
    }

    async fn get_export(&self, id: ExportId) -> Result<Option<DataExport>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_EXPORT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_export", e))?;
        row.as_ref().map(export_from_row).transpose()
    }

    async fn list_exports(&self) -> Result<Vec<DataExport>, StoreError> {
        let rows = sqlx::query(&format!("{SELECT_EXPORT} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_exports", e))?;
        rows.iter().map(export_from_row).collect()
    }

    async fn insert_export(&self, export: &DataExport) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO data_exports (id, kind, status, error, row_count, requested_by, created_at, updated_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(export.id.as_uuid())
        .bind(export_kind_str(export.kind))
        .bind(export_status_str(export.status))
        .bind(&export.error)
        .bind(export.row_count)
        .bind(export.requested_by.map(|u| *u.as_uuid()))
        .bind(export.created_at)
        .bind(export.updated_at)
        .bind(export.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_export", e))?;
        Ok(())
    }

    async fn update_export(&self, export: &DataExport) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE data_exports
            SET status = $2, error = $3, row_count = $4, updated_at = $5, completed_at = $6
            WHERE id = $1
            "#,
        )
        .bind(export.id.as_uuid())
        .bind(export_status_str(export.status))
        .bind(&export.error)
        .bind(export.row_count)
        .bind(export.updated_at)
        .bind(export.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_export", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("export {}", export.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageTx for PgTx {
    #[instrument(skip(self), fields(inventory_id = %id))]
    async fn lock_inventory(
        &mut self,
        id: InventoryId,
    ) -> Result<Option<InventoryRecord>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_INVENTORY} WHERE id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_inventory", e))?;
        row.as_ref().map(inventory_from_row).transpose()
    }

    async fn update_inventory(&mut self, record: &InventoryRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE inventories
            SET product_id = $2, name = $3, sku = $4, unit = $5, price = $6, stock = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.product_id.map(|p| *p.as_uuid()))
        .bind(&record.name)
        .bind(record.sku.as_str())
        .bind(&record.unit)
        .bind(record.price)
        .bind(record.stock)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_inventory", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("inventory {}", record.id)));
        }
        Ok(())
    }

    async fn insert_history(&mut self, entry: &HistoryEntry) -> Result<(), StoreError> {
        let previous = serde_json::to_value(&entry.previous)
            .map_err(|e| StoreError::Backend(format!("encode history: {e}")))?;
        let new_value = serde_json::to_value(&entry.new)
            .map_err(|e| StoreError::Backend(format!("encode history: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO inventory_histories (id, inventory_id, actor, title, description, kind, field, previous, new_value, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.inventory_id.as_uuid())
        .bind(entry.actor.map(|u| *u.as_uuid()))
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(history_kind_str(entry.kind))
        .bind(tracked_field_str(entry.field))
        .bind(previous)
        .bind(new_value)
        .bind(entry.recorded_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_history", e))?;
        Ok(())
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_PRODUCT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_ORDER} WHERE id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn order_lines(&mut self, id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        let rows = sqlx::query(&format!("{SELECT_LINE} WHERE order_id = $1 ORDER BY id"))
            .bind(id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("order_lines", e))?;
        rows.iter().map(line_from_row).collect()
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, number, customer, status, channel, total, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.number.as_str())
        .bind(&order.customer)
        .bind(order_status_str(order.status))
        .bind(channel_str(order.channel))
        .bind(order.total)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET customer = $2, status = $3, channel = $4, total = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.customer)
        .bind(order_status_str(order.status))
        .bind(channel_str(order.channel))
        .bind(order.total)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("order {}", order.id)));
        }
        Ok(())
    }

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO product_orders (id, order_id, product_id, quantity)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(line.id.as_uuid())
        .bind(line.order_id.as_uuid())
        .bind(line.product_id.as_uuid())
        .bind(line.quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order_line", e))?;
        Ok(())
    }

    async fn set_line_quantity(
        &mut self,
        id: OrderLineId,
        quantity: i64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE product_orders SET quantity = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(quantity)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_line_quantity", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("order line {id}")));
        }
        Ok(())
    }

    async fn delete_order_line(&mut self, id: OrderLineId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM product_orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_order_line", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("order line {id}")));
        }
        Ok(())
    }

    async fn insert_batch_run(&mut self, run: &BatchRun) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO batch_runs (id, composition_id, actor, requested_batches, processed_batches, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(run.id.as_uuid())
        .bind(run.composition_id.as_uuid())
        .bind(run.actor.map(|u| *u.as_uuid()))
        .bind(run.requested_batches)
        .bind(run.processed_batches)
        .bind(run.recorded_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_batch_run", e))?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }
}
