//! `backstock-notify` — the fire-and-forget notification boundary.

pub mod notification;
pub mod sink;

pub use notification::Notification;
pub use sink::{InMemorySink, NotificationSink, TracingSink};
