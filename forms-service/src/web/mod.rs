//! Web server module for form submissions.
//!
//! The HTTP layer stays thin: each handler derives the client identity and
//! runs the submission pipeline, then responds. Email work happens in the
//! notifier binary, decoupled by the queue.

pub mod handlers;

pub use handlers::{
    health, submit_contact, submit_quote, AppState, ClientIdentity, HealthResponse,
    SubmissionResponse,
};
