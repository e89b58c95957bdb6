//! Pure reconciliation planning: diff a submitted line set against persisted
//! state and compute the minimal stock deltas, line operations, and the
//! recomputed order total.
//!
//! Planning is deterministic and side-effect free; the operation layer applies
//! a plan inside a single transaction, so any error here aborts the whole
//! business operation before anything is written.

use std::collections::HashMap;

use rust_decimal::Decimal;

use backstock_core::{DomainError, DomainResult, InventoryId, OrderLineId, ProductId};

use crate::order::{OrderLine, SubmittedLine};

/// Everything the planner needs to know about one product, read under lock by
/// the caller: the backing inventory, the authoritative price, and the current
/// stock level.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductFacts {
    pub inventory_id: InventoryId,
    pub price: Decimal,
    pub stock: Decimal,
    pub name: String,
}

/// One planned stock mutation. Negative delta deducts, positive restores.
#[derive(Debug, Clone, PartialEq)]
pub struct StockMovement {
    pub inventory_id: InventoryId,
    pub product_id: ProductId,
    pub delta: Decimal,
}

/// One planned line mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOp {
    Create {
        product_id: ProductId,
        quantity: i64,
    },
    SetQuantity {
        line_id: OrderLineId,
        quantity: i64,
    },
    Remove {
        line_id: OrderLineId,
    },
}

/// Plan for creating an order from scratch.
#[derive(Debug, Clone, PartialEq)]
pub struct CreationPlan {
    pub movements: Vec<StockMovement>,
    pub total: Decimal,
}

/// Plan for editing an existing order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan {
    pub ops: Vec<LineOp>,
    pub movements: Vec<StockMovement>,
    pub total: Decimal,
}

impl ReconcilePlan {
    /// True when the submission changes nothing: no line ops, no stock
    /// movement (the idempotent-edit case).
    pub fn is_noop(&self) -> bool {
        self.ops.is_empty() && self.movements.is_empty()
    }
}

/// Running per-inventory availability within one planning pass. Lines that
/// share an inventory see the effect of earlier lines in the same request.
struct Availability {
    remaining: HashMap<InventoryId, Decimal>,
}

impl Availability {
    fn new(facts: &HashMap<ProductId, ProductFacts>) -> Self {
        let mut remaining = HashMap::new();
        for fact in facts.values() {
            remaining.entry(fact.inventory_id).or_insert(fact.stock);
        }
        Self { remaining }
    }

    fn take(&mut self, fact: &ProductFacts, quantity: Decimal) -> DomainResult<()> {
        let available = self
            .remaining
            .get_mut(&fact.inventory_id)
            .ok_or(DomainError::NotFound)?;
        if quantity > *available {
            return Err(DomainError::insufficient_stock(
                fact.name.clone(),
                quantity,
                *available,
            ));
        }
        *available -= quantity;
        Ok(())
    }

    fn credit(&mut self, inventory_id: InventoryId, quantity: Decimal) {
        *self.remaining.entry(inventory_id).or_insert(Decimal::ZERO) += quantity;
    }
}

fn fact_for<'f>(
    facts: &'f HashMap<ProductId, ProductFacts>,
    product_id: ProductId,
) -> DomainResult<&'f ProductFacts> {
    facts.get(&product_id).ok_or(DomainError::NotFound)
}

/// Plan order creation: every requested line must be coverable by current
/// stock or the whole creation fails — no partial orders.
pub fn plan_creation(
    lines: &[(ProductId, i64)],
    facts: &HashMap<ProductId, ProductFacts>,
) -> DomainResult<CreationPlan> {
    if lines.is_empty() {
        return Err(DomainError::validation(
            "order must contain at least one line",
        ));
    }

    let mut availability = Availability::new(facts);
    let mut movements = Vec::with_capacity(lines.len());
    let mut total = Decimal::ZERO;

    for (product_id, quantity) in lines {
        if *quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let fact = fact_for(facts, *product_id)?;
        let qty = Decimal::from(*quantity);
        availability.take(fact, qty)?;
        movements.push(StockMovement {
            inventory_id: fact.inventory_id,
            product_id: *product_id,
            delta: -qty,
        });
        total += qty * fact.price;
    }

    Ok(CreationPlan { movements, total })
}

/// Plan an order edit against the persisted lines.
///
/// Per submitted line: a new line deducts (requires stock); a line marked
/// `remove` restores its full previous quantity and is removed; an unchanged
/// quantity moves nothing; an increase deducts only the difference; a decrease
/// restores the difference. Persisted lines absent from the submission are
/// left untouched. The recomputed total comes from the resulting line set and
/// the authoritative prices in `facts`.
pub fn plan_edit(
    existing: &[OrderLine],
    submitted: &[SubmittedLine],
    facts: &HashMap<ProductId, ProductFacts>,
) -> DomainResult<ReconcilePlan> {
    // Working view of the persisted lines, updated as submitted lines apply.
    let mut current: HashMap<OrderLineId, (ProductId, i64)> = existing
        .iter()
        .map(|line| (line.id, (line.product_id, line.quantity)))
        .collect();
    let mut created: Vec<(ProductId, i64)> = Vec::new();

    let mut availability = Availability::new(facts);
    let mut ops = Vec::new();
    let mut movements = Vec::new();

    for line in submitted {
        let fact = fact_for(facts, line.product_id)?;

        match line.id {
            None => {
                if line.quantity <= 0 {
                    return Err(DomainError::validation("quantity must be positive"));
                }
                let qty = Decimal::from(line.quantity);
                availability.take(fact, qty)?;
                movements.push(StockMovement {
                    inventory_id: fact.inventory_id,
                    product_id: line.product_id,
                    delta: -qty,
                });
                ops.push(LineOp::Create {
                    product_id: line.product_id,
                    quantity: line.quantity,
                });
                created.push((line.product_id, line.quantity));
            }
            Some(line_id) => {
                let (_, previous) = *current.get(&line_id).ok_or(DomainError::NotFound)?;

                if line.remove {
                    let qty = Decimal::from(previous);
                    availability.credit(fact.inventory_id, qty);
                    movements.push(StockMovement {
                        inventory_id: fact.inventory_id,
                        product_id: line.product_id,
                        delta: qty,
                    });
                    ops.push(LineOp::Remove { line_id });
                    current.remove(&line_id);
                    continue;
                }

                if line.quantity <= 0 {
                    return Err(DomainError::validation("quantity must be positive"));
                }

                if line.quantity == previous {
                    // Unchanged: no stock movement, no history entry.
                    continue;
                }

                if line.quantity > previous {
                    let diff = Decimal::from(line.quantity - previous);
                    availability.take(fact, diff)?;
                    movements.push(StockMovement {
                        inventory_id: fact.inventory_id,
                        product_id: line.product_id,
                        delta: -diff,
                    });
                } else {
                    let diff = Decimal::from(previous - line.quantity);
                    availability.credit(fact.inventory_id, diff);
                    movements.push(StockMovement {
                        inventory_id: fact.inventory_id,
                        product_id: line.product_id,
                        delta: diff,
                    });
                }

                ops.push(LineOp::SetQuantity {
                    line_id,
                    quantity: line.quantity,
                });
                current.insert(line_id, (line.product_id, line.quantity));
            }
        }
    }

    let mut total = Decimal::ZERO;
    for (product_id, quantity) in current.values().copied().chain(created.into_iter()) {
        let fact = fact_for(facts, product_id)?;
        total += Decimal::from(quantity) * fact.price;
    }

    Ok(ReconcilePlan {
        ops,
        movements,
        total,
    })
}
