//! Inventory setup, tracked-field updates, and manual ledger adjustments.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use backstock_core::{DomainError, InventoryId, UserId};
use backstock_inventory::{record_changes, InventoryPatch, InventoryRecord, Sku};
use backstock_notify::{Notification, NotificationSink};

use crate::storage::{StorageBackend, StorageTx};

use super::{apply_stock_delta, BackofficeOps, OpError};

/// Input for creating an inventory record.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInventory {
    pub name: String,
    pub sku: String,
    pub unit: String,
    pub price: Decimal,
    pub stock: Decimal,
}

impl<S, N> BackofficeOps<S, N>
where
    S: StorageBackend,
    N: NotificationSink,
{
    pub async fn create_inventory(&self, new: NewInventory) -> Result<InventoryRecord, OpError> {
        let record = InventoryRecord::new(
            InventoryId::new(),
            new.name,
            Sku::new(new.sku)?,
            new.unit,
            new.price,
            new.stock,
            Utc::now(),
        )?;
        self.store().insert_inventory(&record).await?;
        Ok(record)
    }

    /// Update tracked fields through the history recorder: one audit entry
    /// per field whose value actually changes, none for no-op diffs.
    #[instrument(skip(self, patch), fields(inventory_id = %id))]
    pub async fn update_inventory(
        &self,
        id: InventoryId,
        patch: InventoryPatch,
        actor: Option<UserId>,
    ) -> Result<InventoryRecord, OpError> {
        let now = Utc::now();
        let mut tx = self.store().begin().await?;
        let mut record = tx
            .lock_inventory(id)
            .await?
            .ok_or(DomainError::NotFound)?;

        let entries = record_changes(&record, &patch, actor, now);
        patch.apply_to(&mut record, now)?;
        tx.update_inventory(&record).await?;
        for entry in &entries {
            tx.insert_history(entry).await?;
        }
        tx.commit().await?;
        Ok(record)
    }

    /// Manual stock adjustment: the ledger contract. Positive delta restocks,
    /// negative consumes; going below zero aborts with no mutation.
    #[instrument(skip(self, reason), fields(inventory_id = %id, %delta))]
    pub async fn adjust_stock(
        &self,
        id: InventoryId,
        delta: Decimal,
        reason: Option<String>,
        actor: Option<UserId>,
    ) -> Result<Decimal, OpError> {
        let now = Utc::now();
        let mut tx = self.store().begin().await?;
        let mut record = tx
            .lock_inventory(id)
            .await?
            .ok_or(DomainError::NotFound)?;

        let previous = record.stock;
        let description = reason.unwrap_or_else(|| "Manual stock adjustment".to_string());
        apply_stock_delta(&mut tx, &mut record, delta, description, actor, now).await?;
        tx.commit().await?;

        self.sink().publish(
            Notification::new(
                "Stock adjusted",
                format!("{}: {} -> {}", record.name, previous, record.stock),
            )
            .for_user(actor)
            .with_link(format!("/inventories/{}", record.id)),
        );
        Ok(record.stock)
    }
}
