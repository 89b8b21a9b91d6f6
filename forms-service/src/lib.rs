//! Print Hub Forms - submission and notification backend.
//!
//! This library provides shared modules for the two binaries:
//! - `printhub-web`: Web server running the form submission pipeline
//! - `printhub-notifier`: Worker delivering notification emails
//!
//! ## Architecture
//!
//! ```text
//! Form POST → Web Server (rate limit → validate → persist) → form_notifications → Notifier → Mailgun
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod queue;
pub mod ratelimit;
pub mod store;
pub mod validate;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use error::AppError;
pub use model::{ContactMessage, ContactStatus, FormKind, QuoteRequest, QuoteStatus};
pub use queue::{JobSink, NotificationJob, Publisher, NOTIFY_QUEUE};
pub use ratelimit::{RateDecision, RateLimiter};
pub use store::SubmissionStore;
pub use web::AppState;
