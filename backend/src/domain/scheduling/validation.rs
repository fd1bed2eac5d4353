//! Field-level validation shared by create and update paths.

use chrono::{DateTime, Utc};

/// Maximum length of free-text fields (service description, feedback).
pub const FREE_TEXT_MAX: usize = 1000;

/// Maximum length of names, addresses, emails, and part identifiers.
pub const SHORT_TEXT_MAX: usize = 255;

/// Largest spare part quantity the store can hold.
pub const QUANTITY_MAX: u32 = i32::MAX.unsigned_abs();

/// Validation failures for scheduling input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulingValidationError {
    /// A required text field was blank.
    #[error("{field} must not be blank")]
    Blank {
        /// Offending field.
        field: &'static str,
    },
    /// A text field exceeded its maximum length.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// Offending field.
        field: &'static str,
        /// Maximum length.
        max: usize,
    },
    /// The client email is not shaped like an address.
    #[error("client email is not a valid address")]
    InvalidEmail,
    /// Latitude outside [-90, 90] or not finite.
    #[error("latitude must be a finite value within [-90, 90], got {value}")]
    LatitudeOutOfRange {
        /// Supplied value.
        value: f64,
    },
    /// Longitude outside [-180, 180] or not finite.
    #[error("longitude must be a finite value within [-180, 180], got {value}")]
    LongitudeOutOfRange {
        /// Supplied value.
        value: f64,
    },
    /// The visit is scheduled strictly before the current time.
    #[error("scheduled time {scheduled_at} is in the past (now {now})")]
    ScheduledInPast {
        /// Requested timestamp.
        scheduled_at: DateTime<Utc>,
        /// Reference time.
        now: DateTime<Utc>,
    },
    /// Spare part quantity was zero.
    #[error("spare part quantity must be at least 1")]
    NonPositiveQuantity,
    /// Spare part quantity above [`QUANTITY_MAX`].
    #[error("spare part quantity must be at most {max}, got {value}")]
    QuantityTooLarge {
        /// Supplied value.
        value: u32,
        /// Maximum accepted.
        max: u32,
    },
    /// Client rating outside 1..=5.
    #[error("client rating must be between 1 and 5, got {value}")]
    RatingOutOfRange {
        /// Supplied value.
        value: i64,
    },
}

/// Require a non-blank value of at most [`SHORT_TEXT_MAX`] characters.
pub fn require_text(field: &'static str, value: &str) -> Result<(), SchedulingValidationError> {
    if value.trim().is_empty() {
        return Err(SchedulingValidationError::Blank { field });
    }
    cap_length(field, value, SHORT_TEXT_MAX)
}

/// Cap optional free text at [`FREE_TEXT_MAX`] characters.
pub fn limit_text(
    field: &'static str,
    value: Option<&str>,
) -> Result<(), SchedulingValidationError> {
    value.map_or(Ok(()), |text| cap_length(field, text, FREE_TEXT_MAX))
}

/// Cap an optional identifier at [`SHORT_TEXT_MAX`] characters.
pub fn limit_short_text(
    field: &'static str,
    value: Option<&str>,
) -> Result<(), SchedulingValidationError> {
    value.map_or(Ok(()), |text| cap_length(field, text, SHORT_TEXT_MAX))
}

fn cap_length(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), SchedulingValidationError> {
    if value.chars().count() > max {
        return Err(SchedulingValidationError::TooLong { field, max });
    }
    Ok(())
}

/// Check that an email has one `@` with non-empty local and domain parts.
pub fn validate_email(value: &str) -> Result<(), SchedulingValidationError> {
    cap_length("client email", value, SHORT_TEXT_MAX)?;
    let trimmed = value.trim();
    let Some((local, domain)) = trimmed.split_once('@') else {
        return Err(SchedulingValidationError::InvalidEmail);
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(SchedulingValidationError::InvalidEmail);
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(SchedulingValidationError::InvalidEmail);
    }
    Ok(())
}

/// Check WGS84 coordinate ranges.
pub fn validate_coordinates(
    latitude: f64,
    longitude: f64,
) -> Result<(), SchedulingValidationError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(SchedulingValidationError::LatitudeOutOfRange { value: latitude });
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(SchedulingValidationError::LongitudeOutOfRange { value: longitude });
    }
    Ok(())
}

/// Reject timestamps strictly before `now`. Equal timestamps are accepted.
pub fn validate_not_in_past(
    scheduled_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), SchedulingValidationError> {
    if scheduled_at < now {
        return Err(SchedulingValidationError::ScheduledInPast { scheduled_at, now });
    }
    Ok(())
}
