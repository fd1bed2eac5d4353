//! Cache key for materialised scheduling views.

use std::str::FromStr;

use thiserror::Error;

use crate::domain::SchedulingId;

const PREFIX: &str = "scheduling:";

/// Key under which a [`crate::domain::SchedulingView`] is cached.
///
/// The key is derived only from the record identifier, so every writer and
/// reader agrees on it without consulting the store.
///
/// # Examples
/// ```
/// use scheduler_backend::domain::SchedulingId;
/// use scheduler_backend::domain::ports::SchedulingCacheKey;
///
/// let key = SchedulingCacheKey::for_scheduling(SchedulingId::new(7));
/// assert_eq!(key.as_str(), "scheduling:7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchedulingCacheKey {
    id: SchedulingId,
    rendered: String,
}

impl SchedulingCacheKey {
    /// Derive the key for a record.
    pub fn for_scheduling(id: SchedulingId) -> Self {
        Self {
            id,
            rendered: format!("{PREFIX}{id}"),
        }
    }

    /// Identifier the key was derived from.
    pub fn scheduling_id(&self) -> SchedulingId {
        self.id
    }

    /// Borrow the rendered key.
    pub fn as_str(&self) -> &str {
        self.rendered.as_str()
    }
}

impl std::fmt::Display for SchedulingCacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for SchedulingCacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Errors returned when parsing a rendered [`SchedulingCacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulingCacheKeyParseError {
    /// The key does not start with `scheduling:`.
    #[error("cache key must start with `{PREFIX}`")]
    MissingPrefix,
    /// The suffix is not a record identifier.
    #[error("cache key suffix `{suffix}` is not a scheduling id")]
    InvalidId {
        /// Text after the prefix.
        suffix: String,
    },
}

impl FromStr for SchedulingCacheKey {
    type Err = SchedulingCacheKeyParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let suffix = raw
            .strip_prefix(PREFIX)
            .ok_or(SchedulingCacheKeyParseError::MissingPrefix)?;
        let id = suffix
            .parse::<i64>()
            .map_err(|_| SchedulingCacheKeyParseError::InvalidId {
                suffix: suffix.to_owned(),
            })?;
        Ok(Self::for_scheduling(SchedulingId::new(id)))
    }
}
