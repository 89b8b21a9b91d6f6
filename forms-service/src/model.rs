//! Submission record types and status lifecycles.
//!
//! Records are created exactly once by the form pipeline and mutated only
//! through status transitions. The status sets are closed enums so transition
//! logic can match exhaustively; raw strings from the admin surface go
//! through `FromStr`, which rejects anything outside the set.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Which submission pipeline policy applies to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormKind {
    Contact,
    Quote,
    /// Catch-all policy for auxiliary forms (newsletter, callbacks).
    General,
}

impl FormKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FormKind::Contact => "contact",
            FormKind::Quote => "quote",
            FormKind::General => "general",
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a raw status string is outside the variant's enum.
#[derive(Debug, Error)]
#[error("unknown {kind} status: {value}")]
pub struct ParseStatusError {
    pub kind: FormKind,
    pub value: String,
}

/// Lifecycle of a contact message as the operator works through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    New,
    Read,
    Replied,
    Archived,
}

impl ContactStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::Read => "read",
            ContactStatus::Replied => "replied",
            ContactStatus::Archived => "archived",
        }
    }
}

impl FromStr for ContactStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ContactStatus::New),
            "read" => Ok(ContactStatus::Read),
            "replied" => Ok(ContactStatus::Replied),
            "archived" => Ok(ContactStatus::Archived),
            other => Err(ParseStatusError {
                kind: FormKind::Contact,
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle of a quote request from intake to outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    New,
    Reviewing,
    Quoted,
    Accepted,
    Rejected,
}

impl QuoteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuoteStatus::New => "new",
            QuoteStatus::Reviewing => "reviewing",
            QuoteStatus::Quoted => "quoted",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for QuoteStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(QuoteStatus::New),
            "reviewing" => Ok(QuoteStatus::Reviewing),
            "quoted" => Ok(QuoteStatus::Quoted),
            "accepted" => Ok(QuoteStatus::Accepted),
            "rejected" => Ok(QuoteStatus::Rejected),
            other => Err(ParseStatusError {
                kind: FormKind::Quote,
                value: other.to_string(),
            }),
        }
    }
}

/// Validated contact-form input, ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// Validated quote-form input, ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuoteRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service: String,
    pub quantity: i64,
    pub description: String,
    pub size: Option<String>,
    pub delivery_address: Option<String>,
}

/// Persisted contact message.
///
/// Serializable because a snapshot of the record travels through the
/// notification queue at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub message: String,
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted quote request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service: String,
    pub quantity: i64,
    pub description: String,
    pub size: Option<String>,
    pub delivery_address: Option<String>,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_status_round_trip() {
        for status in [
            ContactStatus::New,
            ContactStatus::Read,
            ContactStatus::Replied,
            ContactStatus::Archived,
        ] {
            assert_eq!(status.as_str().parse::<ContactStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_quote_status_round_trip() {
        for status in [
            QuoteStatus::New,
            QuoteStatus::Reviewing,
            QuoteStatus::Quoted,
            QuoteStatus::Accepted,
            QuoteStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<QuoteStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_outside_enum_rejected() {
        let err = "pending".parse::<ContactStatus>().unwrap_err();
        assert_eq!(err.value, "pending");

        // Statuses from the other variant's set are also rejected.
        assert!("quoted".parse::<ContactStatus>().is_err());
        assert!("replied".parse::<QuoteStatus>().is_err());
    }
}
