//! Data export lifecycle: request synchronously, gather in the background.

use chrono::Utc;
use tracing::instrument;

use backstock_core::{DomainError, ExportId, UserId};
use backstock_notify::{Notification, NotificationSink};

use crate::exports::{DataExport, ExportKind};
use crate::storage::StorageBackend;

use super::{BackofficeOps, OpError};

impl<S, N> BackofficeOps<S, N>
where
    S: StorageBackend,
    N: NotificationSink,
{
    /// Create the export record in `pending`; the job worker picks it up.
    pub async fn request_export(
        &self,
        kind: ExportKind,
        requested_by: Option<UserId>,
    ) -> Result<DataExport, OpError> {
        let export = DataExport::new(kind, requested_by, Utc::now());
        self.store().insert_export(&export).await?;
        Ok(export)
    }

    /// Execute a requested export: gather the rows and record the terminal
    /// status. A gathering failure marks the record `failed` with the error
    /// message preserved, then propagates so the job fails too.
    #[instrument(skip(self), fields(export_id = %export_id))]
    pub async fn run_export(&self, export_id: ExportId) -> Result<DataExport, OpError> {
        let mut export = self
            .store()
            .get_export(export_id)
            .await?
            .ok_or(DomainError::NotFound)?;

        export.mark_processing(Utc::now());
        self.store().update_export(&export).await?;

        let gathered = match export.kind {
            ExportKind::Inventories => self
                .store()
                .list_inventories()
                .await
                .map(|rows| rows.len() as i64),
            ExportKind::Orders => self.store().list_orders().await.map(|rows| rows.len() as i64),
        };

        match gathered {
            Ok(row_count) => {
                export.mark_success(row_count, Utc::now());
                self.store().update_export(&export).await?;
                self.sink().publish(
                    Notification::new(
                        "Export ready",
                        format!(
                            "{} export finished with {} row(s)",
                            export.kind.label(),
                            row_count
                        ),
                    )
                    .for_user(export.requested_by)
                    .with_link(format!("/exports/{}", export.id)),
                );
                Ok(export)
            }
            Err(err) => {
                export.mark_failed(err.to_string(), Utc::now());
                self.store().update_export(&export).await?;
                Err(err.into())
            }
        }
    }
}
