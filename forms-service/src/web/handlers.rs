//! Form submission endpoints.
//!
//! Handlers are thin: they derive the client identity and run the pipeline,
//! which is the synchronous chain rate limit → validate → persist, followed
//! by an enqueue to the notification queue. The HTTP response never waits on
//! email delivery, and a failed enqueue after a successful persist is logged
//! and absorbed (the submission is already durable).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::model::{ContactMessage, FormKind, QuoteRequest};
use crate::queue::{JobSink, NotificationJob};
use crate::ratelimit::{RateDecision, RateLimiter};
use crate::store::SubmissionStore;
use crate::validate::{validate_contact, validate_quote, RawContactForm, RawQuoteForm};

/// Shared application state.
///
/// Configuration stays in the binaries; the pipeline needs only its three
/// collaborators.
#[derive(Clone)]
pub struct AppState {
    pub store: SubmissionStore,
    pub limiter: RateLimiter,
    pub sink: Arc<dyn JobSink>,
}

impl AppState {
    pub fn new(store: SubmissionStore, limiter: RateLimiter, sink: Arc<dyn JobSink>) -> Self {
        Self {
            store,
            limiter,
            sink,
        }
    }
}

/// The apparent client, as used for rate-limit keying.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub ip: String,
    pub user_agent: String,
}

impl ClientIdentity {
    /// Derive the client identity from request headers and socket address,
    /// honoring the first hop of `X-Forwarded-For` when a proxy sets it.
    pub fn from_request(headers: &HeaderMap, addr: SocketAddr) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| addr.ip().to_string());

        let user_agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        Self { ip, user_agent }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Form Submissions
// =============================================================================

/// Success response for a form submission.
#[derive(Serialize)]
pub struct SubmissionResponse {
    pub status: &'static str,
    pub id: Uuid,
}

/// Contact form endpoint.
pub async fn submit_contact(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(raw): Json<RawContactForm>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let client = ClientIdentity::from_request(&headers, addr);
    let record = contact_pipeline(&state, &client, raw).await?;

    Ok(Json(SubmissionResponse {
        status: "received",
        id: record.id,
    }))
}

/// Quote request endpoint.
pub async fn submit_quote(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(raw): Json<RawQuoteForm>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let client = ClientIdentity::from_request(&headers, addr);
    let record = quote_pipeline(&state, &client, raw).await?;

    Ok(Json(SubmissionResponse {
        status: "received",
        id: record.id,
    }))
}

/// Run the contact submission pipeline.
pub async fn contact_pipeline(
    state: &AppState,
    client: &ClientIdentity,
    raw: RawContactForm,
) -> Result<ContactMessage, AppError> {
    check_rate_limit(state, client, FormKind::Contact).await?;

    let fields = validate_contact(raw).map_err(AppError::Validation)?;

    // Non-PII summary for the failure log.
    let name_len = fields.name.len();
    let email_domain = fields
        .email
        .split_once('@')
        .map(|(_, domain)| domain.to_string())
        .unwrap_or_default();

    let record = state.store.create_contact(fields).await.map_err(|e| {
        error!(
            form = %FormKind::Contact,
            name_len = name_len,
            email_domain = %email_domain,
            error = %e,
            "submission_persist_failed"
        );
        AppError::from(e)
    })?;

    info!(record_id = %record.id, form = %FormKind::Contact, "submission_persisted");

    enqueue_notification(state, NotificationJob::Contact(record.clone())).await;

    Ok(record)
}

/// Run the quote submission pipeline.
pub async fn quote_pipeline(
    state: &AppState,
    client: &ClientIdentity,
    raw: RawQuoteForm,
) -> Result<QuoteRequest, AppError> {
    check_rate_limit(state, client, FormKind::Quote).await?;

    let fields = validate_quote(raw).map_err(AppError::Validation)?;

    let name_len = fields.name.len();
    let email_domain = fields
        .email
        .split_once('@')
        .map(|(_, domain)| domain.to_string())
        .unwrap_or_default();
    let service = fields.service.clone();

    let record = state.store.create_quote(fields).await.map_err(|e| {
        error!(
            form = %FormKind::Quote,
            name_len = name_len,
            email_domain = %email_domain,
            service = %service,
            error = %e,
            "submission_persist_failed"
        );
        AppError::from(e)
    })?;

    info!(
        record_id = %record.id,
        form = %FormKind::Quote,
        service = %record.service,
        quantity = record.quantity,
        "submission_persisted"
    );

    enqueue_notification(state, NotificationJob::Quote(record.clone())).await;

    Ok(record)
}

async fn check_rate_limit(
    state: &AppState,
    client: &ClientIdentity,
    form_kind: FormKind,
) -> Result<(), AppError> {
    match state
        .limiter
        .check_and_record(&client.ip, &client.user_agent, form_kind)
        .await
    {
        RateDecision::Allow { .. } => Ok(()),
        RateDecision::Deny {
            retry_after_seconds,
        } => Err(AppError::RateLimited {
            retry_after: retry_after_seconds,
        }),
    }
}

/// Hand the record snapshot to the notification queue. Enqueue failure is
/// absorbed: the record is already durable and the response stays a success.
async fn enqueue_notification(state: &AppState, job: NotificationJob) {
    if let Err(e) = state.sink.enqueue(&job).await {
        error!(
            record_id = %job.record_id(),
            form = %job.form_kind(),
            error = %e,
            "notification_enqueue_failed"
        );
    } else {
        info!(
            record_id = %job.record_id(),
            form = %job.form_kind(),
            "notification_enqueued"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::InMemoryCounterStore;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;
    use tokio::sync::Mutex;

    struct RecordingSink {
        jobs: Mutex<Vec<NotificationJob>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                jobs: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl JobSink for RecordingSink {
        async fn enqueue(&self, job: &NotificationJob) -> Result<()> {
            self.jobs.lock().await.push(job.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl JobSink for FailingSink {
        async fn enqueue(&self, _job: &NotificationJob) -> Result<()> {
            bail!("broker unavailable")
        }
    }

    async fn test_state(sink: Arc<dyn JobSink>) -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SubmissionStore::with_pool(pool).await.unwrap();
        let limiter = RateLimiter::new(Arc::new(InMemoryCounterStore::new()));
        AppState::new(store, limiter, sink)
    }

    fn client() -> ClientIdentity {
        ClientIdentity {
            ip: "203.0.113.7".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
        }
    }

    fn contact_form() -> RawContactForm {
        RawContactForm {
            name: Some("Jordan Lee".to_string()),
            email: Some("jordan@example.com".to_string()),
            message: Some("Do you print A1 posters on short notice?".to_string()),
        }
    }

    fn quote_form() -> RawQuoteForm {
        RawQuoteForm {
            name: Some("Sam Carter".to_string()),
            email: Some("sam@example.com".to_string()),
            phone: Some("+61 3 9000 0000".to_string()),
            service: Some("Business Cards".to_string()),
            quantity: Some(500),
            description: Some("Double-sided, matte laminate finish.".to_string()),
            size: None,
            delivery_address: None,
        }
    }

    #[tokio::test]
    async fn test_contact_success_persists_and_enqueues() {
        let sink = Arc::new(RecordingSink::new());
        let state = test_state(sink.clone()).await;

        let record = contact_pipeline(&state, &client(), contact_form())
            .await
            .unwrap();

        let fetched = state.store.fetch_contact(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Jordan Lee");
        assert_eq!(fetched.status, crate::model::ContactStatus::New);

        let jobs = sink.jobs.lock().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].record_id(), record.id);
        assert_eq!(jobs[0].form_kind(), FormKind::Contact);
    }

    #[tokio::test]
    async fn test_quote_success_snapshot_matches_record() {
        let sink = Arc::new(RecordingSink::new());
        let state = test_state(sink.clone()).await;

        let record = quote_pipeline(&state, &client(), quote_form())
            .await
            .unwrap();
        assert_eq!(record.status, crate::model::QuoteStatus::New);

        let jobs = sink.jobs.lock().await;
        match &jobs[0] {
            NotificationJob::Quote(snapshot) => assert_eq!(snapshot, &record),
            other => panic!("expected quote job, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sixth_rapid_contact_submission_denied() {
        let state = test_state(Arc::new(RecordingSink::new())).await;

        for _ in 0..5 {
            contact_pipeline(&state, &client(), contact_form())
                .await
                .unwrap();
        }

        match contact_pipeline(&state, &client(), contact_form()).await {
            Err(AppError::RateLimited { retry_after }) => {
                assert!(retry_after > 0);
                assert!(retry_after <= 3600);
            }
            other => panic!("6th submission not rate limited: {:?}", other.map(|r| r.id)),
        }

        // The denied attempt created no record.
        assert_eq!(state.store.list_contacts().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_missing_email_creates_nothing() {
        let sink = Arc::new(RecordingSink::new());
        let state = test_state(sink.clone()).await;

        let raw = RawContactForm {
            email: None,
            ..contact_form()
        };

        match contact_pipeline(&state, &client(), raw).await {
            Err(AppError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.field == "email"));
            }
            other => panic!("expected validation error: {:?}", other.map(|r| r.id)),
        }

        assert!(state.store.list_contacts().await.unwrap().is_empty());
        assert!(sink.jobs.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_failure_still_succeeds() {
        let state = test_state(Arc::new(FailingSink)).await;

        let record = quote_pipeline(&state, &client(), quote_form())
            .await
            .unwrap();

        // Record durable with default status despite the broker being down.
        let fetched = state.store.fetch_quote(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, crate::model::QuoteStatus::New);
    }

    #[test]
    fn test_client_identity_prefers_forwarded_for() {
        let addr: SocketAddr = "10.0.0.1:40000".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.2".parse().unwrap());
        headers.insert("user-agent", "Mozilla/5.0".parse().unwrap());

        let client = ClientIdentity::from_request(&headers, addr);
        assert_eq!(client.ip, "203.0.113.7");
        assert_eq!(client.user_agent, "Mozilla/5.0");

        let client = ClientIdentity::from_request(&HeaderMap::new(), addr);
        assert_eq!(client.ip, "10.0.0.1");
        assert_eq!(client.user_agent, "");
    }
}
