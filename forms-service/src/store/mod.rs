//! Durable persistence for submission records.
//!
//! Backed by SQLite via sqlx. Records are created exactly once by the form
//! pipeline; the only mutation afterwards is a status transition from the
//! admin review surface. `update_status` takes the closed status enum, so an
//! out-of-enum value is a compile-time impossibility here and a parse error
//! at the boundary that accepts raw strings.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::model::{
    ContactMessage, ContactStatus, NewContactMessage, NewQuoteRequest, QuoteRequest, QuoteStatus,
};

/// Persistence errors surfaced to the pipeline.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Handle to the submissions database. Cheap to clone; all clones share the
/// underlying connection pool.
#[derive(Clone)]
pub struct SubmissionStore {
    pool: SqlitePool,
}

impl SubmissionStore {
    /// Open (creating if missing) the database at `database_url` and run
    /// pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StoreError::Database)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Build a store over an existing pool, running pending migrations.
    /// Used directly by tests with an in-memory database.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(sqlx::Error::Migrate(Box::new(e))))?;

        Ok(Self { pool })
    }

    /// Persist a contact message, assigning id, default status, and
    /// timestamps. Durable once this returns.
    pub async fn create_contact(
        &self,
        fields: NewContactMessage,
    ) -> Result<ContactMessage, StoreError> {
        let now = Utc::now();
        let record = ContactMessage {
            id: Uuid::new_v4(),
            name: fields.name,
            email: fields.email,
            message: fields.message,
            status: ContactStatus::New,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO contact_messages (id, name, email, message, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.message)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// Persist a quote request, assigning id, default status, and timestamps.
    pub async fn create_quote(&self, fields: NewQuoteRequest) -> Result<QuoteRequest, StoreError> {
        let now = Utc::now();
        let record = QuoteRequest {
            id: Uuid::new_v4(),
            name: fields.name,
            email: fields.email,
            phone: fields.phone,
            service: fields.service,
            quantity: fields.quantity,
            description: fields.description,
            size: fields.size,
            delivery_address: fields.delivery_address,
            status: QuoteStatus::New,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO quote_requests
                 (id, name, email, phone, service, quantity, description,
                  size, delivery_address, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.phone)
        .bind(&record.service)
        .bind(record.quantity)
        .bind(&record.description)
        .bind(&record.size)
        .bind(&record.delivery_address)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// Fetch a contact message by id.
    pub async fn fetch_contact(&self, id: Uuid) -> Result<Option<ContactMessage>, StoreError> {
        let row: Option<ContactRow> = sqlx::query_as(
            "SELECT id, name, email, message, status, created_at, updated_at
             FROM contact_messages WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ContactMessage::try_from).transpose()
    }

    /// Fetch a quote request by id.
    pub async fn fetch_quote(&self, id: Uuid) -> Result<Option<QuoteRequest>, StoreError> {
        let row: Option<QuoteRow> = sqlx::query_as(
            "SELECT id, name, email, phone, service, quantity, description,
                    size, delivery_address, status, created_at, updated_at
             FROM quote_requests WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(QuoteRequest::try_from).transpose()
    }

    /// List contact messages, newest first. Consumed by the admin review
    /// surface.
    pub async fn list_contacts(&self) -> Result<Vec<ContactMessage>, StoreError> {
        let rows: Vec<ContactRow> = sqlx::query_as(
            "SELECT id, name, email, message, status, created_at, updated_at
             FROM contact_messages ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ContactMessage::try_from).collect()
    }

    /// List quote requests, newest first.
    pub async fn list_quotes(&self) -> Result<Vec<QuoteRequest>, StoreError> {
        let rows: Vec<QuoteRow> = sqlx::query_as(
            "SELECT id, name, email, phone, service, quantity, description,
                    size, delivery_address, status, created_at, updated_at
             FROM quote_requests ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(QuoteRequest::try_from).collect()
    }

    /// Transition a contact message's status.
    pub async fn update_contact_status(
        &self,
        id: Uuid,
        status: ContactStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE contact_messages SET status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Transition a quote request's status.
    pub async fn update_quote_status(
        &self,
        id: Uuid,
        status: QuoteStatus,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE quote_requests SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(Utc::now())
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// Row types keep the SQL surface on plain TEXT columns; conversion to the
// domain types parses ids and statuses, surfacing corruption as a decode
// error instead of a panic.

#[derive(sqlx::FromRow)]
struct ContactRow {
    id: String,
    name: String,
    email: String,
    message: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContactRow> for ContactMessage {
    type Error = StoreError;

    fn try_from(row: ContactRow) -> Result<Self, Self::Error> {
        Ok(ContactMessage {
            id: parse_id(&row.id)?,
            name: row.name,
            email: row.email,
            message: row.message,
            status: row
                .status
                .parse()
                .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct QuoteRow {
    id: String,
    name: String,
    email: String,
    phone: String,
    service: String,
    quantity: i64,
    description: String,
    size: Option<String>,
    delivery_address: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuoteRow> for QuoteRequest {
    type Error = StoreError;

    fn try_from(row: QuoteRow) -> Result<Self, Self::Error> {
        Ok(QuoteRequest {
            id: parse_id(&row.id)?,
            name: row.name,
            email: row.email,
            phone: row.phone,
            service: row.service,
            quantity: row.quantity,
            description: row.description,
            size: row.size,
            delivery_address: row.delivery_address,
            status: row
                .status
                .parse()
                .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn parse_id(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| {
        error!(id = %raw, error = %e, "submission_id_corrupt");
        StoreError::Database(sqlx::Error::Decode(Box::new(e)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SubmissionStore {
        // A single connection keeps every query on the same in-memory
        // database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SubmissionStore::with_pool(pool).await.unwrap()
    }

    fn contact_fields() -> NewContactMessage {
        NewContactMessage {
            name: "Jordan Lee".to_string(),
            email: "jordan@example.com".to_string(),
            message: "Do you print A1 posters on short notice?".to_string(),
        }
    }

    fn quote_fields() -> NewQuoteRequest {
        NewQuoteRequest {
            name: "Sam Carter".to_string(),
            email: "sam@example.com".to_string(),
            phone: "+61 3 9000 0000".to_string(),
            service: "Business Cards".to_string(),
            quantity: 500,
            description: "Double-sided, matte laminate finish.".to_string(),
            size: Some("90x55mm".to_string()),
            delivery_address: None,
        }
    }

    #[tokio::test]
    async fn test_contact_create_fetch_round_trip() {
        let store = test_store().await;

        let created = store.create_contact(contact_fields()).await.unwrap();
        assert_eq!(created.status, ContactStatus::New);

        let fetched = store.fetch_contact(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_quote_create_fetch_round_trip() {
        let store = test_store().await;

        let created = store.create_quote(quote_fields()).await.unwrap();
        assert_eq!(created.status, QuoteStatus::New);
        assert_eq!(created.quantity, 500);
        assert_eq!(created.size.as_deref(), Some("90x55mm"));
        assert_eq!(created.delivery_address, None);

        let fetched = store.fetch_quote(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_fetch_unknown_id_is_none() {
        let store = test_store().await;
        assert!(store.fetch_contact(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_status() {
        let store = test_store().await;
        let created = store.create_quote(quote_fields()).await.unwrap();

        store
            .update_quote_status(created.id, QuoteStatus::Reviewing)
            .await
            .unwrap();

        let fetched = store.fetch_quote(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, QuoteStatus::Reviewing);
        assert!(fetched.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_update_status_unknown_id_not_found() {
        let store = test_store().await;
        let err = store
            .update_contact_status(Uuid::new_v4(), ContactStatus::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_raw_status_outside_enum_never_reaches_store() {
        let store = test_store().await;
        let created = store.create_contact(contact_fields()).await.unwrap();

        // The admin surface parses raw strings before calling the store; an
        // out-of-enum value fails there and the record is untouched.
        assert!("escalated".parse::<ContactStatus>().is_err());

        let fetched = store.fetch_contact(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ContactStatus::New);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = test_store().await;

        let first = store.create_contact(contact_fields()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.create_contact(contact_fields()).await.unwrap();

        let listed = store.list_contacts().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }
}
