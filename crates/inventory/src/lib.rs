//! `backstock-inventory` — inventory records, the stock ledger arithmetic,
//! and the tracked-field history recorder.

pub mod history;
pub mod record;

pub use history::{record_changes, FieldValue, HistoryEntry, HistoryKind, TrackedField};
pub use record::{InventoryPatch, InventoryRecord, Sku};
