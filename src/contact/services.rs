use std::ops::RangeInclusive;

use tracing::{info, warn};

use crate::{
    auth::services::{is_valid_email, normalize_email},
    contact::{
        dto::{ContactCreated, ContactRequest},
        repo::ContactRepo,
        repo_types::{ContactMessage, NewContact},
    },
    error::{AppError, FieldError},
};

pub const NAME_LEN: RangeInclusive<usize> = 2..=50;
pub const MESSAGE_LEN: RangeInclusive<usize> = 10..=1000;
pub const LIST_LIMIT: i64 = 50;

/// Trims and normalizes the submission, collecting every rule it breaks.
pub fn validate(req: ContactRequest) -> Result<NewContact, Vec<FieldError>> {
    let contact = NewContact {
        name: req.name.trim().to_owned(),
        email: normalize_email(&req.email),
        message: req.message.trim().to_owned(),
    };

    let mut errors = Vec::new();
    if !NAME_LEN.contains(&contact.name.chars().count()) {
        errors.push(FieldError::new(
            "name",
            "Name must be between 2 and 50 characters",
        ));
    }
    if !is_valid_email(&contact.email) {
        errors.push(FieldError::new("email", "Valid email required"));
    }
    if !MESSAGE_LEN.contains(&contact.message.chars().count()) {
        errors.push(FieldError::new(
            "message",
            "Message must be between 10 and 1000 characters",
        ));
    }

    if errors.is_empty() {
        Ok(contact)
    } else {
        Err(errors)
    }
}

pub async fn submit(repo: &dyn ContactRepo, req: ContactRequest) -> Result<ContactCreated, AppError> {
    let contact = validate(req).map_err(|errors| {
        warn!(?errors, "contact validation failed");
        AppError::Validation(errors)
    })?;

    let created = repo.insert(&contact).await?;
    info!(id = created.id, email = %contact.email, "contact saved");
    Ok(created)
}

pub async fn list(repo: &dyn ContactRepo) -> Result<Vec<ContactMessage>, AppError> {
    let rows = repo.recent(LIST_LIMIT).await?;
    info!(count = rows.len(), "contacts fetched");
    Ok(rows)
}
