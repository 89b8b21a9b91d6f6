//! Field-level validation for form submissions.
//!
//! Each form has a declared set of constraints (required/optional, length
//! bounds, email shape, numeric bounds). Validation collects every failing
//! field rather than stopping at the first, so the frontend can highlight
//! all of them in one round trip.

use serde::{Deserialize, Serialize};

use crate::model::{NewContactMessage, NewQuoteRequest};

/// Upper bound on quantity for a quote request.
pub const MAX_QUANTITY: i64 = 1_000_000;

/// A single failed constraint, naming the field and the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Raw contact-form body as submitted.
///
/// Every field is optional at the deserialization layer; required-field
/// checks belong to the validator so a missing field reports as a field
/// error instead of a body rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawContactForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Raw quote-form body as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuoteForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
}

/// Validate a contact submission, collecting all field errors.
pub fn validate_contact(raw: RawContactForm) -> Result<NewContactMessage, Vec<FieldError>> {
    let mut errors = Vec::new();

    let name = required_text(&mut errors, "name", raw.name, 1, 100);
    let email = required_email(&mut errors, "email", raw.email);
    let message = required_text(&mut errors, "message", raw.message, 10, 5000);

    if errors.is_empty() {
        Ok(NewContactMessage {
            name: name.unwrap(),
            email: email.unwrap(),
            message: message.unwrap(),
        })
    } else {
        Err(errors)
    }
}

/// Validate a quote submission, collecting all field errors.
pub fn validate_quote(raw: RawQuoteForm) -> Result<NewQuoteRequest, Vec<FieldError>> {
    let mut errors = Vec::new();

    let name = required_text(&mut errors, "name", raw.name, 1, 100);
    let email = required_email(&mut errors, "email", raw.email);
    let phone = required_text(&mut errors, "phone", raw.phone, 6, 30);
    let service = required_text(&mut errors, "service", raw.service, 1, 100);
    let description = required_text(&mut errors, "description", raw.description, 10, 5000);
    let size = optional_text(&mut errors, "size", raw.size, 100);
    let delivery_address =
        optional_text(&mut errors, "delivery_address", raw.delivery_address, 300);

    let quantity = match raw.quantity {
        None => {
            errors.push(FieldError::new("quantity", "quantity is required"));
            None
        }
        Some(q) if !(1..=MAX_QUANTITY).contains(&q) => {
            errors.push(FieldError::new(
                "quantity",
                format!("quantity must be between 1 and {}", MAX_QUANTITY),
            ));
            None
        }
        Some(q) => Some(q),
    };

    if errors.is_empty() {
        Ok(NewQuoteRequest {
            name: name.unwrap(),
            email: email.unwrap(),
            phone: phone.unwrap(),
            service: service.unwrap(),
            quantity: quantity.unwrap(),
            description: description.unwrap(),
            size,
            delivery_address,
        })
    } else {
        Err(errors)
    }
}

/// A required string field with length bounds. Leading/trailing whitespace is
/// trimmed before checking, and a whitespace-only value counts as missing.
fn required_text(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    value: Option<String>,
    min: usize,
    max: usize,
) -> Option<String> {
    let trimmed = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    match trimmed {
        None => {
            errors.push(FieldError::new(field, format!("{} is required", field)));
            None
        }
        Some(v) if v.chars().count() < min => {
            errors.push(FieldError::new(
                field,
                format!("{} must be at least {} characters", field, min),
            ));
            None
        }
        Some(v) if v.chars().count() > max => {
            errors.push(FieldError::new(
                field,
                format!("{} must be at most {} characters", field, max),
            ));
            None
        }
        Some(v) => Some(v),
    }
}

/// An optional string field with an upper length bound. Absent or empty is
/// fine and normalizes to `None`.
fn optional_text(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    value: Option<String>,
    max: usize,
) -> Option<String> {
    let trimmed = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    match trimmed {
        Some(v) if v.chars().count() > max => {
            errors.push(FieldError::new(
                field,
                format!("{} must be at most {} characters", field, max),
            ));
            None
        }
        other => other,
    }
}

/// A required email field. The shape check is deliberately minimal: one `@`
/// with non-empty sides, a dot in the domain, no whitespace, and an overall
/// length bound. Deliverability is proven by the acknowledgment email, not
/// by the validator.
fn required_email(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    value: Option<String>,
) -> Option<String> {
    let email = required_text(errors, field, value, 5, 254)?;

    if is_valid_email(&email) {
        Some(email)
    } else {
        errors.push(FieldError::new(
            field,
            format!("{} must be a valid email address", field),
        ));
        None
    }
}

fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    if value.matches('@').count() != 1 {
        return false;
    }
    let (local, domain) = match value.split_once('@') {
        Some(parts) => parts,
        None => return false,
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
