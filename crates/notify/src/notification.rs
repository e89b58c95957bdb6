use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backstock_core::UserId;

/// A human-readable event description pushed to the notification boundary.
/// `user_id: None` means the notification is visible to everyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: Option<UserId>,
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            user_id: None,
            title: title.into(),
            description: description.into(),
            link: None,
            created_at: Utc::now(),
        }
    }

    pub fn for_user(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}
