//! Storage seam: a backend trait for plain reads plus a transaction trait for
//! every mutating flow.
//!
//! Design rules:
//!
//! - Every stock mutation happens inside a `StorageTx`, after
//!   `lock_inventory` has taken an exclusive row lock on the record. Two
//!   operations touching the same inventory serialize; disjoint inventories
//!   proceed without contention (the in-memory backend is a conservative
//!   superset: it serializes all transactions).
//! - A transaction that is dropped without `commit` rolls back everything,
//!   so a failed precondition mid-operation leaves no partial state.
//! - Implementations make no business decisions; preconditions and planning
//!   live in the domain crates and the operation layer.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryBackend;
pub use postgres::PgBackend;

use async_trait::async_trait;
use thiserror::Error;

use backstock_core::{CompositionId, ExportId, InventoryId, OrderId, OrderLineId, ProductId};
use backstock_inventory::{HistoryEntry, InventoryRecord};
use backstock_orders::{Order, OrderLine};
use backstock_production::{BatchRun, Composition};
use backstock_products::Product;

use crate::exports::DataExport;

/// Infrastructure-level storage error. Domain failures (validation,
/// insufficient stock) never surface through this type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row the operation depends on does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated (e.g. duplicate SKU).
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// Any other persistence failure. The message is for logs; callers
    /// surface a generic failure to end users.
    #[error("storage failure: {0}")]
    Backend(String),
}

/// Read-side storage plus the entry point into transactions.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    type Tx: StorageTx;

    /// Open a transaction. All mutations of one business operation go
    /// through a single transaction and commit or roll back together.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    async fn get_inventory(&self, id: InventoryId) -> Result<Option<InventoryRecord>, StoreError>;
    async fn list_inventories(&self) -> Result<Vec<InventoryRecord>, StoreError>;
    async fn insert_inventory(&self, record: &InventoryRecord) -> Result<(), StoreError>;
    async fn history_for(
        &self,
        id: InventoryId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError>;
    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, StoreError>;

    async fn get_composition(&self, id: CompositionId)
        -> Result<Option<Composition>, StoreError>;
    async fn list_compositions(&self) -> Result<Vec<Composition>, StoreError>;
    async fn insert_composition(&self, composition: &Composition) -> Result<(), StoreError>;
    async fn batch_runs_for(&self, id: CompositionId) -> Result<Vec<BatchRun>, StoreError>;

    async fn get_export(&self, id: ExportId) -> Result<Option<DataExport>, StoreError>;
    async fn list_exports(&self) -> Result<Vec<DataExport>, StoreError>;
    async fn insert_export(&self, export: &DataExport) -> Result<(), StoreError>;
    async fn update_export(&self, export: &DataExport) -> Result<(), StoreError>;
}

/// One open transaction. Dropping without `commit` rolls back.
#[async_trait]
pub trait StorageTx: Send {
    /// Load an inventory record under an exclusive row lock, held until the
    /// transaction ends. Every read-modify-write of `stock` starts here.
    async fn lock_inventory(
        &mut self,
        id: InventoryId,
    ) -> Result<Option<InventoryRecord>, StoreError>;

    async fn update_inventory(&mut self, record: &InventoryRecord) -> Result<(), StoreError>;
    async fn insert_history(&mut self, entry: &HistoryEntry) -> Result<(), StoreError>;

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;
    async fn order_lines(&mut self, id: OrderId) -> Result<Vec<OrderLine>, StoreError>;
    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;
    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError>;
    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<(), StoreError>;
    async fn set_line_quantity(
        &mut self,
        id: OrderLineId,
        quantity: i64,
    ) -> Result<(), StoreError>;
    async fn delete_order_line(&mut self, id: OrderLineId) -> Result<(), StoreError>;

    async fn insert_batch_run(&mut self, run: &BatchRun) -> Result<(), StoreError>;

    /// Commit everything staged in this transaction atomically.
    async fn commit(self) -> Result<(), StoreError>;
}
