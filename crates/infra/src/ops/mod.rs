//! The transactional operation layer.
//!
//! `BackofficeOps` orchestrates every stock-mutating flow the same way:
//!
//! ```text
//! 1. Open a transaction
//! 2. Lock the inventory rows the operation touches (sorted, to avoid
//!    lock-order inversion)
//! 3. Run the pure domain planner against the locked state
//! 4. Apply the plan through the ledger helper (domain check + history entry
//!    per mutation)
//! 5. Commit; only then publish notifications
//! ```
//!
//! Any error between 1 and 5 drops the transaction, rolling back every
//! partial change. Notifications are published after commit so a rolled-back
//! operation never announces itself.

mod exports;
mod inventory;
mod jobs;
mod orders;
mod production;

pub use inventory::NewInventory;
pub use orders::NewOrder;
pub use production::{BatchOutcome, NewComposition, NewCompositionItem};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use backstock_core::{DomainError, UserId};
use backstock_inventory::{HistoryEntry, InventoryRecord};
use backstock_notify::NotificationSink;

use crate::storage::{StorageBackend, StorageTx, StoreError};

/// Operation-level error: a deterministic domain failure or an infrastructure
/// failure. The transaction is rolled back in either case.
#[derive(Debug, Error)]
pub enum OpError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("transaction failed: {0}")]
    Store(#[from] StoreError),
}

/// Application services over a storage backend and a notification sink.
pub struct BackofficeOps<S, N> {
    store: S,
    sink: N,
}

impl<S, N> BackofficeOps<S, N>
where
    S: StorageBackend,
    N: NotificationSink,
{
    pub fn new(store: S, sink: N) -> Self {
        Self { store, sink }
    }

    /// Read-side access for query endpoints.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }
}

/// Apply one stock delta to a locked record: domain check, write, audit
/// entry. Every stock-mutating flow (checkout, edit reconciliation, batch
/// production, manual adjustment) funnels through here.
pub(crate) async fn apply_stock_delta<T: StorageTx>(
    tx: &mut T,
    record: &mut InventoryRecord,
    delta: Decimal,
    description: String,
    actor: Option<UserId>,
    now: DateTime<Utc>,
) -> Result<(), OpError> {
    let previous = record.stock;
    let next = record.adjusted_stock(delta)?;
    record.stock = next;
    record.updated_at = now;
    tx.update_inventory(record).await?;
    tx.insert_history(&HistoryEntry::stock_adjustment(
        record.id,
        actor,
        previous,
        next,
        description,
        now,
    ))
    .await?;
    Ok(())
}
