use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use backstock_core::{DomainError, DomainResult, Entity, InventoryId, ProductId};

/// Stock-keeping unit code. Unique across inventory records, compared
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub fn new(raw: impl Into<String>) -> DomainResult<Self> {
        let value = raw.into().trim().to_string();
        if value.is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive equality, used for the uniqueness check.
    pub fn matches(&self, other: &Sku) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl core::fmt::Display for Sku {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An inventory record: the unit of the stock ledger.
///
/// `stock` is only ever mutated through the ledger path (lock, domain check,
/// history entry); tracked fields only through the history-recording update
/// path. Invariant: `stock >= 0` at every committed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: InventoryId,
    /// Sellable product backed by this record, when one exists.
    pub product_id: Option<ProductId>,
    pub name: String,
    pub sku: Sku,
    /// Free-form unit of measure ("pcs", "kg", ...).
    pub unit: String,
    pub price: Decimal,
    pub stock: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: InventoryId,
        name: impl Into<String>,
        sku: Sku,
        unit: impl Into<String>,
        price: Decimal,
        stock: Decimal,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if price < Decimal::ZERO {
            return Err(DomainError::validation("price cannot be negative"));
        }
        if stock < Decimal::ZERO {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        Ok(Self {
            id,
            product_id: None,
            name,
            sku,
            unit: unit.into(),
            price,
            stock,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    /// Compute the stock value after applying `delta`, without mutating.
    ///
    /// A zero delta is rejected (it would produce a meaningless audit entry);
    /// a negative delta that would take stock below zero fails with
    /// `InsufficientStock`. Every stock-mutating flow routes through this
    /// check before writing.
    pub fn adjusted_stock(&self, delta: Decimal) -> DomainResult<Decimal> {
        if delta == Decimal::ZERO {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        let next = self.stock + delta;
        if next < Decimal::ZERO {
            return Err(DomainError::insufficient_stock(
                self.name.clone(),
                -delta,
                self.stock,
            ));
        }
        Ok(next)
    }
}

impl Entity for InventoryRecord {
    type Id = InventoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Proposed update to an inventory record's tracked fields.
///
/// `None` means "leave unchanged". `description` overrides the per-field
/// default description on the resulting history entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryPatch {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub sku: Option<Sku>,
    pub stock: Option<Decimal>,
    pub description: Option<String>,
}

impl InventoryPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.price.is_none() && self.sku.is_none() && self.stock.is_none()
    }

    /// Apply the patch to `record`, validating each proposed value.
    pub fn apply_to(&self, record: &mut InventoryRecord, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
            record.name = name.clone();
        }
        if let Some(price) = self.price {
            if price < Decimal::ZERO {
                return Err(DomainError::validation("price cannot be negative"));
            }
            record.price = price;
        }
        if let Some(sku) = &self.sku {
            record.sku = sku.clone();
        }
        if let Some(stock) = self.stock {
            if stock < Decimal::ZERO {
                return Err(DomainError::validation("stock cannot be negative"));
            }
            record.stock = stock;
        }
        record.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(stock: i64) -> InventoryRecord {
        InventoryRecord::new(
            InventoryId::new(),
            "Arabica beans",
            Sku::new("BEAN-001").unwrap(),
            "kg",
            Decimal::new(1250, 2),
            Decimal::from(stock),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn sku_rejects_blank() {
        assert!(Sku::new("   ").is_err());
    }

    #[test]
    fn sku_matches_ignores_case() {
        let a = Sku::new("bean-001").unwrap();
        let b = Sku::new("BEAN-001").unwrap();
        assert!(a.matches(&b));
    }

    #[test]
    fn new_rejects_negative_stock() {
        let err = InventoryRecord::new(
            InventoryId::new(),
            "x",
            Sku::new("X").unwrap(),
            "pcs",
            Decimal::ZERO,
            Decimal::from(-1),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn adjusted_stock_applies_delta() {
        let rec = record(10);
        assert_eq!(rec.adjusted_stock(Decimal::from(-4)).unwrap(), Decimal::from(6));
        assert_eq!(rec.adjusted_stock(Decimal::from(5)).unwrap(), Decimal::from(15));
    }

    #[test]
    fn adjusted_stock_rejects_zero_delta() {
        let rec = record(10);
        assert!(matches!(
            rec.adjusted_stock(Decimal::ZERO),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn adjusted_stock_refuses_to_go_negative() {
        let rec = record(3);
        let err = rec.adjusted_stock(Decimal::from(-4)).unwrap_err();
        match err {
            DomainError::InsufficientStock {
                item,
                requested,
                available,
            } => {
                assert_eq!(item, "Arabica beans");
                assert_eq!(requested, Decimal::from(4));
                assert_eq!(available, Decimal::from(3));
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn patch_apply_updates_only_proposed_fields() {
        let mut rec = record(10);
        let before_price = rec.price;
        let patch = InventoryPatch {
            name: Some("House blend".to_string()),
            ..Default::default()
        };
        patch.apply_to(&mut rec, Utc::now()).unwrap();
        assert_eq!(rec.name, "House blend");
        assert_eq!(rec.price, before_price);
    }

    #[test]
    fn patch_apply_rejects_negative_stock() {
        let mut rec = record(10);
        let patch = InventoryPatch {
            stock: Some(Decimal::from(-2)),
            ..Default::default()
        };
        assert!(patch.apply_to(&mut rec, Utc::now()).is_err());
    }
}
