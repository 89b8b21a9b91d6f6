//! Email notification rendering and delivery.
//!
//! Each submission produces exactly two plain-text emails: an alert to the
//! fixed operator address summarizing every field, and an acknowledgment to
//! the submitter restating the essentials. Delivery is best-effort: a failed
//! send is logged with the record id and absorbed, never failing the job.

pub mod mailer;

use tracing::{error, info};

use crate::model::{ContactMessage, QuoteRequest};
use crate::queue::NotificationJob;

pub use mailer::MailgunMailer;

/// One outbound plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Render the operator alert and customer acknowledgment for a job.
pub fn render_notifications(job: &NotificationJob, operator_email: &str) -> [EmailMessage; 2] {
    match job {
        NotificationJob::Contact(record) => [
            contact_operator_alert(record, operator_email),
            contact_acknowledgment(record),
        ],
        NotificationJob::Quote(record) => [
            quote_operator_alert(record, operator_email),
            quote_acknowledgment(record),
        ],
    }
}

/// Send both emails for a job, logging each outcome. Failures are absorbed;
/// the submission was already durable before the job was enqueued.
pub async fn deliver(job: &NotificationJob, mailer: &MailgunMailer, operator_email: &str) {
    for email in render_notifications(job, operator_email) {
        match mailer.send(&email).await {
            Ok(()) => {
                info!(
                    record_id = %job.record_id(),
                    form = %job.form_kind(),
                    recipient = %email.to,
                    "notification_sent"
                );
            }
            Err(e) => {
                error!(
                    record_id = %job.record_id(),
                    form = %job.form_kind(),
                    recipient = %email.to,
                    error = %e,
                    "notification_send_failed"
                );
            }
        }
    }
}

fn contact_operator_alert(record: &ContactMessage, operator_email: &str) -> EmailMessage {
    EmailMessage {
        to: operator_email.to_string(),
        subject: format!("New contact message from {}", record.name),
        body: format!(
            "A new contact message arrived on the website.\n\
             \n\
             Reference: {}\n\
             Received:  {}\n\
             Name:      {}\n\
             Email:     {}\n\
             \n\
             Message:\n\
             {}\n",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M UTC"),
            record.name,
            record.email,
            record.message,
        ),
    }
}

fn contact_acknowledgment(record: &ContactMessage) -> EmailMessage {
    EmailMessage {
        to: record.email.clone(),
        subject: "Thanks for contacting Melbourne Print Hub".to_string(),
        body: format!(
            "Hi {},\n\
             \n\
             Thanks for getting in touch. We've received your message and\n\
             will reply within one business day.\n\
             \n\
             Your reference number is {}.\n\
             \n\
             Melbourne Print Hub\n",
            record.name, record.id,
        ),
    }
}

fn quote_operator_alert(record: &QuoteRequest, operator_email: &str) -> EmailMessage {
    let size = record.size.as_deref().unwrap_or("not specified");
    let delivery = record.delivery_address.as_deref().unwrap_or("pickup");

    EmailMessage {
        to: operator_email.to_string(),
        subject: format!("New quote request: {} x {}", record.service, record.quantity),
        body: format!(
            "A new quote request arrived on the website.\n\
             \n\
             Reference: {}\n\
             Received:  {}\n\
             Name:      {}\n\
             Email:     {}\n\
             Phone:     {}\n\
             Service:   {}\n\
             Quantity:  {}\n\
             Size:      {}\n\
             Delivery:  {}\n\
             \n\
             Description:\n\
             {}\n",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M UTC"),
            record.name,
            record.email,
            record.phone,
            record.service,
            record.quantity,
            size,
            delivery,
            record.description,
        ),
    }
}

fn quote_acknowledgment(record: &QuoteRequest) -> EmailMessage {
    EmailMessage {
        to: record.email.clone(),
        subject: "Your quote request at Melbourne Print Hub".to_string(),
        body: format!(
            "Hi {},\n\
             \n\
             Thanks for your quote request for {} (quantity {}).\n\
             We're reviewing it now and will send you a quote within one\n\
             business day.\n\
             \n\
             Your reference number is {}.\n\
             \n\
             Melbourne Print Hub\n",
            record.name, record.service, record.quantity, record.id,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::{ContactStatus, QuoteStatus};
    use chrono::Utc;
    use uuid::Uuid;

    const OPERATOR: &str = "orders@melbourneprinthub.com.au";

    /// A mailer whose every send fails: the API base points at a closed
    /// local port, so requests are refused without touching the network.
    fn broken_mailer() -> MailgunMailer {
        let mut config = Config::from_env();
        config.mailgun_api_key = Some("key-test".to_string());
        config.mailgun_domain = Some("mg.example.com".to_string());
        config.mailgun_api_base = "http://127.0.0.1:9".to_string();
        config.request_timeout_ms = 500;
        MailgunMailer::from_config(&config).unwrap()
    }

    fn contact_job() -> NotificationJob {
        NotificationJob::Contact(ContactMessage {
            id: Uuid::new_v4(),
            name: "Jordan Lee".to_string(),
            email: "jordan@example.com".to_string(),
            message: "Do you print A1 posters on short notice?".to_string(),
            status: ContactStatus::New,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    fn quote_job() -> NotificationJob {
        NotificationJob::Quote(QuoteRequest {
            id: Uuid::new_v4(),
            name: "Sam Carter".to_string(),
            email: "sam@example.com".to_string(),
            phone: "+61 3 9000 0000".to_string(),
            service: "Business Cards".to_string(),
            quantity: 500,
            description: "Double-sided, matte laminate finish.".to_string(),
            size: None,
            delivery_address: None,
            status: QuoteStatus::New,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    #[test]
    fn test_contact_renders_two_messages() {
        let job = contact_job();
        let [alert, ack] = render_notifications(&job, OPERATOR);

        assert_eq!(alert.to, OPERATOR);
        assert_eq!(ack.to, "jordan@example.com");

        assert!(alert.subject.contains("Jordan Lee"));
        assert!(alert.body.contains("jordan@example.com"));
        assert!(alert.body.contains("Do you print A1 posters"));
        assert!(alert.body.contains(&job.record_id().to_string()));

        assert!(ack.subject.contains("Melbourne Print Hub"));
        assert!(ack.body.contains("Jordan"));
        assert!(ack.body.contains(&job.record_id().to_string()));
    }

    #[test]
    fn test_quote_alert_summarizes_all_fields() {
        let [alert, ack] = render_notifications(&quote_job(), OPERATOR);

        assert!(alert.subject.contains("Business Cards"));
        assert!(alert.subject.contains("500"));
        assert!(alert.body.contains("+61 3 9000 0000"));
        assert!(alert.body.contains("matte laminate"));
        // Absent optional fields render as placeholders, not blanks.
        assert!(alert.body.contains("not specified"));
        assert!(alert.body.contains("pickup"));

        assert!(ack.body.contains("Business Cards"));
        assert!(ack.body.contains("500"));
    }

    #[tokio::test]
    async fn test_send_fails_against_dead_transport() {
        let mailer = broken_mailer();
        let [alert, _] = render_notifications(&contact_job(), OPERATOR);

        assert!(mailer.send(&alert).await.is_err());
    }

    #[tokio::test]
    async fn test_deliver_absorbs_forced_mail_failure() {
        let mailer = broken_mailer();

        // Both sends fail; deliver logs each with the record id and
        // returns normally instead of propagating.
        deliver(&contact_job(), &mailer, OPERATOR).await;
        deliver(&quote_job(), &mailer, OPERATOR).await;
    }
}
