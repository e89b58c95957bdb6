//! Data export records (the operator-facing queue boundary).
//!
//! An export is requested synchronously, then processed by a background job;
//! the operator polls the record's status. File rendering itself is delegated
//! to the delivery layer — this record tracks the lifecycle and the result
//! size.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backstock_core::{ExportId, UserId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Inventories,
    Orders,
}

impl ExportKind {
    pub fn label(self) -> &'static str {
        match self {
            ExportKind::Inventories => "inventories",
            ExportKind::Orders => "orders",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl ExportStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExportStatus::Success | ExportStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataExport {
    pub id: ExportId,
    pub kind: ExportKind,
    pub status: ExportStatus,
    /// Failure detail; only set when `status == Failed`.
    pub error: Option<String>,
    /// Rows gathered; only set when `status == Success`.
    pub row_count: Option<i64>,
    pub requested_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DataExport {
    pub fn new(kind: ExportKind, requested_by: Option<UserId>, now: DateTime<Utc>) -> Self {
        Self {
            id: ExportId::new(),
            kind,
            status: ExportStatus::Pending,
            error: None,
            row_count: None,
            requested_by,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn mark_processing(&mut self, now: DateTime<Utc>) {
        self.status = ExportStatus::Processing;
        self.updated_at = now;
    }

    pub fn mark_success(&mut self, row_count: i64, now: DateTime<Utc>) {
        self.status = ExportStatus::Success;
        self.row_count = Some(row_count);
        self.error = None;
        self.updated_at = now;
        self.completed_at = Some(now);
    }

    pub fn mark_failed(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = ExportStatus::Failed;
        self.error = Some(error.into());
        self.updated_at = now;
        self.completed_at = Some(now);
    }
}
