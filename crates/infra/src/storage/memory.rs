//! In-memory backend for tests/dev.
//!
//! Transactions stage a full copy of the state behind a single async mutex;
//! `commit` swaps the staged copy in, dropping the transaction discards it.
//! Holding the mutex for the transaction's lifetime serializes all
//! transactions, which is a conservative superset of per-row locking: the
//! non-negative stock invariant holds under any interleaving, at the cost of
//! contention this backend does not care about.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use backstock_core::{CompositionId, ExportId, InventoryId, OrderId, OrderLineId, ProductId};
use backstock_inventory::{HistoryEntry, InventoryRecord};
use backstock_orders::{Order, OrderLine};
use backstock_production::{BatchRun, Composition};
use backstock_products::Product;

use crate::exports::DataExport;

use super::{StorageBackend, StorageTx, StoreError};

#[derive(Debug, Clone, Default)]
struct State {
    inventories: HashMap<InventoryId, InventoryRecord>,
    history: Vec<HistoryEntry>,
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    lines: HashMap<OrderLineId, OrderLine>,
    compositions: HashMap<CompositionId, Composition>,
    batch_runs: Vec<BatchRun>,
    exports: HashMap<ExportId, DataExport>,
}

impl State {
    fn sku_taken(&self, record: &InventoryRecord) -> bool {
        self.inventories
            .values()
            .any(|existing| existing.id != record.id && existing.sku.matches(&record.sku))
    }

    fn number_taken(&self, order: &Order) -> bool {
        self.orders
            .values()
            .any(|existing| existing.id != order.id && existing.number == order.number)
    }
}

/// In-memory storage backend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Staged transaction over the in-memory state.
pub struct InMemoryTx {
    guard: OwnedMutexGuard<State>,
    staged: State,
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTx { guard, staged })
    }

    async fn get_inventory(&self, id: InventoryId) -> Result<Option<InventoryRecord>, StoreError> {
        Ok(self.state.lock().await.inventories.get(&id).cloned())
    }

    async fn list_inventories(&self) -> Result<Vec<InventoryRecord>, StoreError> {
        let state = self.state.lock().await;
        let mut records: Vec<_> = state.inventories.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn insert_inventory(&self, record: &InventoryRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.inventories.contains_key(&record.id) {
            return Err(StoreError::Duplicate(format!("inventory {}", record.id)));
        }
        if state.sku_taken(record) {
            return Err(StoreError::Duplicate(format!("sku {}", record.sku)));
        }
        state.inventories.insert(record.id, record.clone());
        Ok(())
    }

    async fn history_for(
        &self,
        id: InventoryId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let state = self.state.lock().await;
        let mut entries: Vec<_> = state
            .history
            .iter()
            .filter(|e| e.inventory_id == id)
            .cloned()
            .collect();
        // Newest first, like the audit screens read it.
        entries.sort_by_key(|e| std::cmp::Reverse(e.id));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let state = self.state.lock().await;
        let mut products: Vec<_> = state.products.values().cloned().collect();
        products.sort_by_key(|p| p.id);
        Ok(products)
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.products.contains_key(&product.id) {
            return Err(StoreError::Duplicate(format!("product {}", product.id)));
        }
        if !state.inventories.contains_key(&product.inventory_id) {
            return Err(StoreError::NotFound(format!(
                "inventory {}",
                product.inventory_id
            )));
        }
        // Back-link the stock record to its sellable product.
        if let Some(inventory) = state.inventories.get_mut(&product.inventory_id) {
            inventory.product_id = Some(product.id);
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let state = self.state.lock().await;
        let mut orders: Vec<_> = state.orders.values().cloned().collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }

    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        let state = self.state.lock().await;
        let mut lines: Vec<_> = state
            .lines
            .values()
            .filter(|l| l.order_id == id)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.id);
        Ok(lines)
    }

    async fn get_composition(
        &self,
        id: CompositionId,
    ) -> Result<Option<Composition>, StoreError> {
        Ok(self.state.lock().await.compositions.get(&id).cloned())
    }

    async fn list_compositions(&self) -> Result<Vec<Composition>, StoreError> {
        let state = self.state.lock().await;
        let mut compositions: Vec<_> = state.compositions.values().cloned().collect();
        compositions.sort_by_key(|c| c.id);
        Ok(compositions)
    }

    async fn insert_composition(&self, composition: &Composition) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.compositions.contains_key(&composition.id) {
            return Err(StoreError::Duplicate(format!(
                "composition {}",
                composition.id
            )));
        }
        state
            .compositions
            .insert(composition.id, composition.clone());
        Ok(())
    }

    async fn batch_runs_for(&self, id: CompositionId) -> Result<Vec<BatchRun>, StoreError> {
        let state = self.state.lock().await;
        let mut runs: Vec<_> = state
            .batch_runs
            .iter()
            .filter(|r| r.composition_id == id)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.id);
        Ok(runs)
    }

    async fn get_export(&self, id: ExportId) -> Result<Option<DataExport>, StoreError> {
        Ok(self.state.lock().await.exports.get(&id).cloned())
    }

    async fn list_exports(&self) -> Result<Vec<DataExport>, StoreError> {
        let state = self.state.lock().await;
        let mut exports: Vec<_> = state.exports.values().cloned().collect();
        exports.sort_by_key(|e| e.id);
        Ok(exports)
    }

    async fn insert_export(&self, export: &DataExport) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.exports.contains_key(&export.id) {
            return Err(StoreError::Duplicate(format!("export {}", export.id)));
        }
        state.exports.insert(export.id, export.clone());
        Ok(())
    }

    async fn update_export(&self, export: &DataExport) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.exports.contains_key(&export.id) {
            return Err(StoreError::NotFound(format!("export {}", export.id)));
        }
        state.exports.insert(export.id, export.clone());
        Ok(())
    }
}

#[async_trait]
impl StorageTx for InMemoryTx {
    async fn lock_inventory(
        &mut self,
        id: InventoryId,
    ) -> Result<Option<InventoryRecord>, StoreError> {
        // The state mutex held by this transaction IS the exclusive lock.
        Ok(self.staged.inventories.get(&id).cloned())
    }

    async fn update_inventory(&mut self, record: &InventoryRecord) -> Result<(), StoreError> {
        if !self.staged.inventories.contains_key(&record.id) {
            return Err(StoreError::NotFound(format!("inventory {}", record.id)));
        }
        if self.staged.sku_taken(record) {
            return Err(StoreError::Duplicate(format!("sku {}", record.sku)));
        }
        self.staged.inventories.insert(record.id, record.clone());
        Ok(())
    }

    async fn insert_history(&mut self, entry: &HistoryEntry) -> Result<(), StoreError> {
        self.staged.history.push(entry.clone());
        Ok(())
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.staged.orders.get(&id).cloned())
    }

    async fn order_lines(&mut self, id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        let mut lines: Vec<_> = self
            .staged
            .lines
            .values()
            .filter(|l| l.order_id == id)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.id);
        Ok(lines)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        if self.staged.orders.contains_key(&order.id) {
            return Err(StoreError::Duplicate(format!("order {}", order.id)));
        }
        if self.staged.number_taken(order) {
            return Err(StoreError::Duplicate(format!("order number {}", order.number)));
        }
        self.staged.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError> {
        if !self.staged.orders.contains_key(&order.id) {
            return Err(StoreError::NotFound(format!("order {}", order.id)));
        }
        self.staged.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<(), StoreError> {
        if self.staged.lines.contains_key(&line.id) {
            return Err(StoreError::Duplicate(format!("order line {}", line.id)));
        }
        self.staged.lines.insert(line.id, line.clone());
        Ok(())
    }

    async fn set_line_quantity(
        &mut self,
        id: OrderLineId,
        quantity: i64,
    ) -> Result<(), StoreError> {
        match self.staged.lines.get_mut(&id) {
            Some(line) => {
                line.quantity = quantity;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("order line {id}"))),
        }
    }

    async fn delete_order_line(&mut self, id: OrderLineId) -> Result<(), StoreError> {
        match self.staged.lines.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(format!("order line {id}"))),
        }
    }

    async fn insert_batch_run(&mut self, run: &BatchRun) -> Result<(), StoreError> {
        self.staged.batch_runs.push(run.clone());
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let InMemoryTx { mut guard, staged } = self;
        *guard = staged;
        Ok(())
    }
}
