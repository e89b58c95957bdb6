//! Composition setup and the production batch run.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use backstock_core::{CompositionId, DomainError, InventoryId, UserId};
use backstock_inventory::InventoryRecord;
use backstock_notify::{Notification, NotificationSink};
use backstock_production::{
    allocator, AllocationOutcome, BatchRun, Composition, CompositionItem, RejectReason,
};

use crate::storage::{StorageBackend, StorageTx};

use super::{apply_stock_delta, BackofficeOps, OpError};

/// Input for one composition ingredient.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCompositionItem {
    pub ingredient: InventoryId,
    pub category: String,
    pub stock_used: Decimal,
}

/// Input for creating a composition.
#[derive(Debug, Clone, Deserialize)]
pub struct NewComposition {
    pub name: String,
    pub finished_good: InventoryId,
    pub labor_cost: Decimal,
    pub yield_per_batch: i64,
    pub items: Vec<NewCompositionItem>,
}

/// Result of one batch run request.
#[derive(Debug)]
pub enum BatchOutcome {
    /// Malformed request; no transaction was opened.
    Rejected(RejectReason),
    /// Zero feasible batches; nothing was mutated.
    Infeasible { requested: i64 },
    /// Batches were produced (possibly fewer than requested).
    Processed { run: BatchRun, partial: bool },
}

impl<S, N> BackofficeOps<S, N>
where
    S: StorageBackend,
    N: NotificationSink,
{
    /// Create a composition, pricing each item from its ingredient's current
    /// unit price.
    pub async fn create_composition(
        &self,
        new: NewComposition,
    ) -> Result<Composition, OpError> {
        let now = Utc::now();
        self.store()
            .get_inventory(new.finished_good)
            .await?
            .ok_or(DomainError::NotFound)?;

        let mut items = Vec::with_capacity(new.items.len());
        for item in new.items {
            let ingredient = self
                .store()
                .get_inventory(item.ingredient)
                .await?
                .ok_or(DomainError::NotFound)?;
            items.push(CompositionItem::priced(
                item.ingredient,
                item.category,
                item.stock_used,
                ingredient.price,
            ));
        }

        let composition = Composition::new(
            CompositionId::new(),
            new.name,
            new.finished_good,
            new.labor_cost,
            new.yield_per_batch,
            items,
            now,
        )?;
        self.store().insert_composition(&composition).await?;
        Ok(composition)
    }

    /// Run the batch production allocator: compute the feasible batch count
    /// under current ingredient stock, deduct every ingredient, credit the
    /// finished good, and append one immutable batch run record — all in one
    /// transaction. Notifications report the outcome, including the
    /// full-vs-partial distinction.
    #[instrument(skip(self), fields(composition_id = %composition_id, requested))]
    pub async fn run_batch(
        &self,
        composition_id: CompositionId,
        requested: i64,
        actor: Option<UserId>,
    ) -> Result<BatchOutcome, OpError> {
        let composition = self
            .store()
            .get_composition(composition_id)
            .await?
            .ok_or(DomainError::NotFound)?;

        // Malformed requests never open a transaction.
        if let Some(reason) = allocator::reject_reason(&composition, requested) {
            self.sink().publish(
                Notification::new(
                    "Production not started",
                    format!("Cannot process {}: {}", composition.name, reason.message()),
                )
                .for_user(actor),
            );
            return Ok(BatchOutcome::Rejected(reason));
        }

        let now = Utc::now();
        let mut tx = self.store().begin().await?;

        // Lock every involved inventory in id order: all ingredients plus the
        // finished good.
        let mut involved: Vec<InventoryId> = composition
            .items
            .iter()
            .map(|item| item.ingredient)
            .collect();
        involved.push(composition.finished_good);
        involved.sort();
        involved.dedup();

        let mut locked: HashMap<InventoryId, InventoryRecord> = HashMap::new();
        let mut stock: HashMap<InventoryId, Decimal> = HashMap::new();
        for inventory_id in involved {
            // A missing ingredient is not an error here: the allocator
            // conservatively reports zero feasible batches for it.
            if let Some(record) = tx.lock_inventory(inventory_id).await? {
                stock.insert(inventory_id, record.stock);
                locked.insert(inventory_id, record);
            }
        }
        if !locked.contains_key(&composition.finished_good) {
            return Err(DomainError::NotFound.into());
        }

        let plan = match allocator::plan(&composition, requested, &stock) {
            AllocationOutcome::Rejected(reason) => {
                // Already screened above; treat defensively identical.
                drop(tx);
                return Ok(BatchOutcome::Rejected(reason));
            }
            AllocationOutcome::Infeasible { requested, limiting } => {
                drop(tx); // Roll back; nothing was written.
                let limited_by = limiting
                    .and_then(|id| locked.get(&id).map(|r| r.name.clone()))
                    .unwrap_or_else(|| "missing ingredient stock".to_string());
                self.sink().publish(
                    Notification::new(
                        "Production failed",
                        format!(
                            "{}: maximum feasible batches: 0 (limited by {})",
                            composition.name, limited_by
                        ),
                    )
                    .for_user(actor),
                );
                return Ok(BatchOutcome::Infeasible { requested });
            }
            AllocationOutcome::Planned(plan) => plan,
        };

        // Deduct every ingredient, one audit entry each.
        for draw in &plan.draws {
            let record = locked
                .get_mut(&draw.ingredient)
                .ok_or(DomainError::NotFound)?;
            apply_stock_delta(
                &mut tx,
                record,
                -draw.total,
                format!(
                    "Production {}: consumed for {} batch(es)",
                    composition.name, plan.batches
                ),
                actor,
                now,
            )
            .await?;
        }

        // Credit the finished good.
        let finished = locked
            .get_mut(&composition.finished_good)
            .ok_or(DomainError::NotFound)?;
        apply_stock_delta(
            &mut tx,
            finished,
            Decimal::from(plan.finished_units),
            format!(
                "Production {}: produced {} unit(s)",
                composition.name, plan.finished_units
            ),
            actor,
            now,
        )
        .await?;

        let run = BatchRun::new(composition.id, actor, requested, plan.batches, now);
        tx.insert_batch_run(&run).await?;
        tx.commit().await?;

        // Per-ingredient consumption report.
        for draw in &plan.draws {
            let name = locked
                .get(&draw.ingredient)
                .map(|r| r.name.clone())
                .unwrap_or_else(|| draw.ingredient.to_string());
            self.sink().publish(
                Notification::new(
                    "Ingredient consumed",
                    format!(
                        "{}: {} used for {} batch(es) of {}",
                        name, draw.total, plan.batches, composition.name
                    ),
                )
                .for_user(actor),
            );
        }

        // Summary: full vs partial completion.
        let partial = plan.is_partial();
        let summary = if partial {
            let limited_by = plan
                .limiting
                .and_then(|id| locked.get(&id).map(|r| r.name.clone()))
                .unwrap_or_else(|| "ingredient stock".to_string());
            Notification::new(
                "Production partially completed",
                format!(
                    "{}: produced {} of {} requested batch(es); {} ran short",
                    composition.name, plan.batches, plan.requested, limited_by
                ),
            )
        } else {
            Notification::new(
                "Production completed",
                format!(
                    "{}: produced {} batch(es) ({} unit(s))",
                    composition.name, plan.batches, plan.finished_units
                ),
            )
        };
        self.sink().publish(summary.for_user(actor));

        Ok(BatchOutcome::Processed { run, partial })
    }
}
