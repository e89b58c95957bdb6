//! Notification sink abstraction (mechanics only).
//!
//! The sink is intentionally fire-and-forget: it consumes human-readable
//! event descriptions and carries no business logic. Delivery is best-effort;
//! a sink failure must never roll back the business operation that emitted
//! the notification.

use std::sync::{Arc, Mutex};

use backstock_core::UserId;

use crate::notification::Notification;

/// Consumer of notifications. Implementations must be safe to share across
/// threads; publishing from inside a transaction scope is fine because
/// nothing here can fail the transaction.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, notification: Notification);
}

impl<S> NotificationSink for Arc<S>
where
    S: NotificationSink + ?Sized,
{
    fn publish(&self, notification: Notification) {
        (**self).publish(notification)
    }
}

/// In-memory sink for tests/dev. Retains everything published so the UI
/// listing endpoint (and assertions) can read it back.
#[derive(Debug, Default)]
pub struct InMemorySink {
    entries: Mutex<Vec<Notification>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Notifications visible to `user`: their own plus broadcasts.
    pub fn visible_to(&self, user: Option<UserId>) -> Vec<Notification> {
        self.all()
            .into_iter()
            .filter(|n| n.user_id.is_none() || n.user_id == user)
            .collect()
    }
}

impl NotificationSink for InMemorySink {
    fn publish(&self, notification: Notification) {
        // A poisoned lock only loses notifications, never fails the caller.
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(notification);
        }
    }
}

/// Sink that logs instead of delivering; useful as a dev default.
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn publish(&self, notification: Notification) {
        tracing::info!(
            title = %notification.title,
            description = %notification.description,
            user_id = ?notification.user_id,
            "notification"
        );
    }
}
