use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use backstock_core::{CompositionId, DomainError, DomainResult, Entity, InventoryId};

/// One ingredient requirement of a composition.
///
/// `stock_used` is the quantity consumed per produced unit; per-batch need is
/// `stock_used × yield_per_batch`. The same ingredient may appear under
/// several categories; the allocator aggregates across them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionItem {
    pub ingredient: InventoryId,
    pub category: String,
    pub stock_used: Decimal,
    /// Cost contribution: `stock_used × ingredient unit price` at the time
    /// the composition was priced.
    pub cost: Decimal,
}

impl CompositionItem {
    pub fn priced(
        ingredient: InventoryId,
        category: impl Into<String>,
        stock_used: Decimal,
        unit_price: Decimal,
    ) -> Self {
        Self {
            ingredient,
            category: category.into(),
            stock_used,
            cost: stock_used * unit_price,
        }
    }
}

/// A bill of materials: which ingredient quantities produce one batch of the
/// finished good, plus labor cost for unit-cost calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub id: CompositionId,
    pub name: String,
    /// Inventory record credited with the produced units.
    pub finished_good: InventoryId,
    pub labor_cost: Decimal,
    /// Units produced per batch.
    pub yield_per_batch: i64,
    pub items: Vec<CompositionItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Composition {
    pub fn new(
        id: CompositionId,
        name: impl Into<String>,
        finished_good: InventoryId,
        labor_cost: Decimal,
        yield_per_batch: i64,
        items: Vec<CompositionItem>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if labor_cost < Decimal::ZERO {
            return Err(DomainError::validation("labor cost cannot be negative"));
        }
        Ok(Self {
            id,
            name,
            finished_good,
            labor_cost,
            yield_per_batch,
            items,
            created_at: now,
            updated_at: now,
        })
    }

    /// Material + labor cost of one full batch.
    pub fn batch_cost(&self) -> Decimal {
        self.items.iter().map(|i| i.cost).sum::<Decimal>() + self.labor_cost
    }

    /// Cost of goods per produced unit; zero when the yield is non-positive.
    pub fn unit_cost(&self) -> Decimal {
        if self.yield_per_batch <= 0 {
            return Decimal::ZERO;
        }
        self.batch_cost() / Decimal::from(self.yield_per_batch)
    }
}

impl Entity for Composition {
    type Id = CompositionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priced_item_computes_cost() {
        let item = CompositionItem::priced(
            InventoryId::new(),
            "base",
            Decimal::new(25, 1), // 2.5
            Decimal::from(4),
        );
        assert_eq!(item.cost, Decimal::from(10));
    }

    #[test]
    fn batch_and_unit_cost() {
        let comp = Composition::new(
            CompositionId::new(),
            "Bottled cold brew",
            InventoryId::new(),
            Decimal::from(6),
            4,
            vec![
                CompositionItem::priced(InventoryId::new(), "base", Decimal::from(2), Decimal::from(3)),
                CompositionItem::priced(InventoryId::new(), "packaging", Decimal::from(1), Decimal::from(4)),
            ],
            Utc::now(),
        )
        .unwrap();
        assert_eq!(comp.batch_cost(), Decimal::from(16));
        assert_eq!(comp.unit_cost(), Decimal::from(4));
    }

    #[test]
    fn unit_cost_is_zero_for_non_positive_yield() {
        let comp = Composition::new(
            CompositionId::new(),
            "Broken",
            InventoryId::new(),
            Decimal::ZERO,
            0,
            vec![],
            Utc::now(),
        )
        .unwrap();
        assert_eq!(comp.unit_cost(), Decimal::ZERO);
    }

    #[test]
    fn new_rejects_blank_name() {
        assert!(Composition::new(
            CompositionId::new(),
            " ",
            InventoryId::new(),
            Decimal::ZERO,
            1,
            vec![],
            Utc::now(),
        )
        .is_err());
    }
}
