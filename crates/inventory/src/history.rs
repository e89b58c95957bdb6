use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use backstock_core::{HistoryId, InventoryId, UserId};

use crate::record::{InventoryPatch, InventoryRecord};

/// Kind tag on a history entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    FieldChange,
    StockAdjustment,
}

/// The enumerated set of audited fields. Anything outside this set never
/// produces a history entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    Name,
    Price,
    Sku,
    Stock,
}

impl TrackedField {
    pub fn kind(self) -> HistoryKind {
        match self {
            TrackedField::Stock => HistoryKind::StockAdjustment,
            _ => HistoryKind::FieldChange,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            TrackedField::Name => "Name changed",
            TrackedField::Price => "Price changed",
            TrackedField::Sku => "SKU changed",
            TrackedField::Stock => "Stock adjusted",
        }
    }

    fn default_description(self) -> &'static str {
        match self {
            TrackedField::Name => "Inventory name was updated",
            TrackedField::Price => "Unit price was updated",
            TrackedField::Sku => "Stock-keeping unit code was updated",
            TrackedField::Stock => "Stock level was corrected",
        }
    }
}

/// Typed before/after value on a history entry.
///
/// The audited fields are an enumerated set, so the value space is closed:
/// no stringly-typed coercion when comparing old and new.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum FieldValue {
    Text(String),
    Money(Decimal),
    Quantity(Decimal),
}

impl core::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Money(d) | FieldValue::Quantity(d) => core::fmt::Display::fmt(d, f),
        }
    }
}

/// Immutable audit record for one tracked-field change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub inventory_id: InventoryId,
    pub actor: Option<UserId>,
    pub title: String,
    pub description: String,
    pub kind: HistoryKind,
    pub field: TrackedField,
    pub previous: FieldValue,
    pub new: FieldValue,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Entry for a ledger stock movement (checkout, edit reconciliation,
    /// batch production, manual adjustment).
    pub fn stock_adjustment(
        inventory_id: InventoryId,
        actor: Option<UserId>,
        previous: Decimal,
        new: Decimal,
        description: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: HistoryId::new(),
            inventory_id,
            actor,
            title: TrackedField::Stock.title().to_string(),
            description: description.into(),
            kind: HistoryKind::StockAdjustment,
            field: TrackedField::Stock,
            previous: FieldValue::Quantity(previous),
            new: FieldValue::Quantity(new),
            recorded_at,
        }
    }

    fn for_field(
        inventory_id: InventoryId,
        actor: Option<UserId>,
        field: TrackedField,
        previous: FieldValue,
        new: FieldValue,
        description: Option<&str>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: HistoryId::new(),
            inventory_id,
            actor,
            title: field.title().to_string(),
            description: description
                .map(str::to_string)
                .unwrap_or_else(|| field.default_description().to_string()),
            kind: field.kind(),
            field,
            previous,
            new,
            recorded_at,
        }
    }
}

/// Diff `record` against `patch` and emit one entry per tracked field whose
/// value actually changes. Unchanged (or unproposed) fields produce nothing,
/// so the audit trail stays meaningful. Pure append: entries are returned,
/// never persisted here.
pub fn record_changes(
    record: &InventoryRecord,
    patch: &InventoryPatch,
    actor: Option<UserId>,
    recorded_at: DateTime<Utc>,
) -> Vec<HistoryEntry> {
    let mut entries = Vec::new();
    let description = patch.description.as_deref();

    if let Some(name) = &patch.name {
        if *name != record.name {
            entries.push(HistoryEntry::for_field(
                record.id,
                actor,
                TrackedField::Name,
                FieldValue::Text(record.name.clone()),
                FieldValue::Text(name.clone()),
                description,
                recorded_at,
            ));
        }
    }
    if let Some(price) = patch.price {
        if price != record.price {
            entries.push(HistoryEntry::for_field(
                record.id,
                actor,
                TrackedField::Price,
                FieldValue::Money(record.price),
                FieldValue::Money(price),
                description,
                recorded_at,
            ));
        }
    }
    if let Some(sku) = &patch.sku {
        if sku != &record.sku {
            entries.push(HistoryEntry::for_field(
                record.id,
                actor,
                TrackedField::Sku,
                FieldValue::Text(record.sku.as_str().to_string()),
                FieldValue::Text(sku.as_str().to_string()),
                description,
                recorded_at,
            ));
        }
    }
    if let Some(stock) = patch.stock {
        if stock != record.stock {
            entries.push(HistoryEntry::for_field(
                record.id,
                actor,
                TrackedField::Stock,
                FieldValue::Quantity(record.stock),
                FieldValue::Quantity(stock),
                description,
                recorded_at,
            ));
        }
    }

    entries
}
