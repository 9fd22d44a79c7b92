//! API handlers module

pub mod books;
pub mod comments;
pub mod genres;
pub mod health;
pub mod tags;
pub mod users;

use bookspace_common::errors::{AppError, Result};
use validator::{Validate, ValidationError};

/// Run derive-based validation, reporting the first offending field
pub(crate) fn validated<T: Validate>(request: &T) -> Result<()> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: e.field_errors().keys().min().map(|k| k.to_string()),
    })
}

/// Reject strings made only of whitespace
pub(crate) fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}
