//! Notification queue message types.
//!
//! A [`NotificationJob`] is a read-only snapshot of a submission record taken
//! at creation time. The notifier renders emails from the snapshot alone and
//! never re-reads the database, so later status transitions are invisible to
//! it.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{ContactMessage, FormKind, QuoteRequest};

/// Queue name for submission notification jobs.
pub const NOTIFY_QUEUE: &str = "form_notifications";

/// Snapshot of a freshly created submission, one per queue message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "form")]
pub enum NotificationJob {
    #[serde(rename = "contact")]
    Contact(ContactMessage),
    #[serde(rename = "quote")]
    Quote(QuoteRequest),
}

impl NotificationJob {
    /// Id of the underlying submission record, used as the queue message id
    /// and in delivery logs.
    pub fn record_id(&self) -> Uuid {
        match self {
            NotificationJob::Contact(record) => record.id,
            NotificationJob::Quote(record) => record.id,
        }
    }

    pub fn form_kind(&self) -> FormKind {
        match self {
            NotificationJob::Contact(_) => FormKind::Contact,
            NotificationJob::Quote(_) => FormKind::Quote,
        }
    }

    /// The submitter's own address, recipient of the acknowledgment email.
    pub fn customer_email(&self) -> &str {
        match self {
            NotificationJob::Contact(record) => &record.email,
            NotificationJob::Quote(record) => &record.email,
        }
    }
}

/// Destination for notification jobs.
///
/// The web pipeline only needs "enqueue this snapshot"; the trait keeps the
/// RabbitMQ publisher out of the pipeline's type signature and lets tests
/// substitute a recording sink.
#[async_trait]
pub trait JobSink: Send + Sync {
    async fn enqueue(&self, job: &NotificationJob) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContactStatus, QuoteStatus};
    use chrono::Utc;

    fn contact_record() -> ContactMessage {
        ContactMessage {
            id: Uuid::new_v4(),
            name: "Jordan Lee".to_string(),
            email: "jordan@example.com".to_string(),
            message: "Do you print A1 posters?".to_string(),
            status: ContactStatus::New,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_contact_job_serialization() {
        let record = contact_record();
        let job = NotificationJob::Contact(record.clone());

        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"form\":\"contact\""));

        let parsed: NotificationJob = serde_json::from_str(&json).unwrap();
        match parsed {
            NotificationJob::Contact(p) => {
                assert_eq!(p.id, record.id);
                assert_eq!(p.email, "jordan@example.com");
                assert_eq!(p.status, ContactStatus::New);
            }
            _ => panic!("Expected Contact variant"),
        }
    }

    #[test]
    fn test_quote_job_serialization() {
        let job = NotificationJob::Quote(QuoteRequest {
            id: Uuid::new_v4(),
            name: "Sam Carter".to_string(),
            email: "sam@example.com".to_string(),
            phone: "+61 3 9000 0000".to_string(),
            service: "Business Cards".to_string(),
            quantity: 500,
            description: "Double-sided, matte laminate finish.".to_string(),
            size: Some("90x55mm".to_string()),
            delivery_address: None,
            status: QuoteStatus::New,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });

        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"form\":\"quote\""));

        let parsed: NotificationJob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.form_kind(), FormKind::Quote);
        assert_eq!(parsed.customer_email(), "sam@example.com");
    }
}
