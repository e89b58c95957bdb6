//! Pure batch allocation planning.
//!
//! Given a composition, a requested batch count, and the current stock of
//! every required ingredient, compute how many batches can actually be
//! produced and the exact per-ingredient deduction. The operation layer
//! applies a plan inside one transaction; planning itself never mutates.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use backstock_core::InventoryId;

use crate::composition::Composition;

/// Requests that are malformed enough to skip planning entirely — no
/// transaction is opened for these.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RejectReason {
    NoItems,
    NonPositiveYield,
    NonPositiveRequest,
}

impl RejectReason {
    pub fn message(self) -> &'static str {
        match self {
            RejectReason::NoItems => "composition has no ingredients",
            RejectReason::NonPositiveYield => "composition yield per batch must be positive",
            RejectReason::NonPositiveRequest => "requested batch count must be positive",
        }
    }
}

/// Planned deduction for one ingredient.
#[derive(Debug, Clone, PartialEq)]
pub struct IngredientDraw {
    pub ingredient: InventoryId,
    /// Aggregated usage across all items referencing this ingredient,
    /// multiplied by the yield per batch.
    pub need_per_batch: Decimal,
    /// `need_per_batch × planned batches`.
    pub total: Decimal,
}

/// A feasible allocation: how many batches to produce and what each
/// ingredient gives up for them.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPlan {
    pub requested: i64,
    pub batches: i64,
    pub draws: Vec<IngredientDraw>,
    /// `batches × yield_per_batch`, credited to the finished good.
    pub finished_units: i64,
    /// The ingredient that capped the batch count, when one did.
    pub limiting: Option<InventoryId>,
}

impl AllocationPlan {
    pub fn is_partial(&self) -> bool {
        self.batches < self.requested
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AllocationOutcome {
    /// Malformed request; nothing to plan.
    Rejected(RejectReason),
    /// Zero feasible batches: insufficient or missing ingredient stock.
    Infeasible {
        requested: i64,
        limiting: Option<InventoryId>,
    },
    Planned(AllocationPlan),
}

/// Short-circuit checks that need no stock information.
pub fn reject_reason(composition: &Composition, requested: i64) -> Option<RejectReason> {
    if requested <= 0 {
        return Some(RejectReason::NonPositiveRequest);
    }
    if composition.yield_per_batch <= 0 {
        return Some(RejectReason::NonPositiveYield);
    }
    if composition.items.is_empty() {
        return Some(RejectReason::NoItems);
    }
    None
}

/// Compute the allocation for `requested` batches given current `stock`.
///
/// A missing ingredient inventory forces zero feasible batches for the whole
/// run; the allocator deliberately does not skip the ingredient.
pub fn plan(
    composition: &Composition,
    requested: i64,
    stock: &HashMap<InventoryId, Decimal>,
) -> AllocationOutcome {
    if let Some(reason) = reject_reason(composition, requested) {
        return AllocationOutcome::Rejected(reason);
    }

    // Aggregate usage per unique ingredient; BTreeMap keeps deduction order
    // deterministic (ids are time-ordered).
    let mut usage: BTreeMap<InventoryId, Decimal> = BTreeMap::new();
    for item in &composition.items {
        *usage.entry(item.ingredient).or_insert(Decimal::ZERO) += item.stock_used;
    }

    let yield_per_batch = Decimal::from(composition.yield_per_batch);
    let mut needs: Vec<(InventoryId, Decimal)> = Vec::new();
    for (ingredient, aggregated) in usage {
        let need_per_batch = aggregated * yield_per_batch;
        if need_per_batch > Decimal::ZERO {
            needs.push((ingredient, need_per_batch));
        }
        // Non-positive need: the ingredient consumes nothing, ignore it.
    }

    let mut feasible = requested;
    let mut limiting = None;
    for (ingredient, need_per_batch) in &needs {
        let Some(available) = stock.get(ingredient) else {
            return AllocationOutcome::Infeasible {
                requested,
                limiting: Some(*ingredient),
            };
        };
        let max_batches = (*available / *need_per_batch)
            .floor()
            .to_i64()
            .unwrap_or(0)
            .max(0);
        if max_batches < feasible {
            feasible = max_batches;
            limiting = Some(*ingredient);
        }
    }

    if feasible <= 0 {
        return AllocationOutcome::Infeasible {
            requested,
            limiting,
        };
    }

    let batches = Decimal::from(feasible);
    let draws = needs
        .into_iter()
        .map(|(ingredient, need_per_batch)| IngredientDraw {
            ingredient,
            need_per_batch,
            total: need_per_batch * batches,
        })
        .collect();

    AllocationOutcome::Planned(AllocationPlan {
        requested,
        batches: feasible,
        draws,
        finished_units: feasible * composition.yield_per_batch,
        limiting,
    })
}
