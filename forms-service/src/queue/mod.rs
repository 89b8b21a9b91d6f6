//! Notification queue: message types and async publisher.
//!
//! ## Architecture
//!
//! ```text
//! Web Server → form_notifications queue → Notifier → 2× email per submission
//! ```

pub mod publisher;
pub mod types;

pub use publisher::Publisher;
pub use types::{JobSink, NotificationJob, NOTIFY_QUEUE};
