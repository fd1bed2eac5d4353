//! Status and priority enumerations for scheduling records.
//!
//! Both enums parse leniently through [`parse_or_default`]: callers that need
//! a hard failure use [`std::str::FromStr`] directly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when an enum label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised {kind} value: {value}")]
pub struct UnknownLabelError {
    kind: &'static str,
    value: String,
}

impl UnknownLabelError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Lifecycle state of a scheduled visit.
///
/// Forward order is `Pending → Confirmed → InProgress → Completed`;
/// `Cancelled` is reachable from any non-terminal state. `Completed` and
/// `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulingStatus {
    /// Created, awaiting confirmation.
    Pending,
    /// Confirmed with the client.
    Confirmed,
    /// Technician is on site.
    InProgress,
    /// Visit finished; feedback may be attached.
    Completed,
    /// Visit called off.
    Cancelled,
}

impl SchedulingStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Confirmed,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Stable wire label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether no transition leaves this state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Confirmed => 1,
            Self::InProgress => 2,
            Self::Completed => 3,
            Self::Cancelled => 4,
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Staying in the same state is always allowed. Forward moves may skip
    /// intermediate steps.
    ///
    /// # Examples
    /// ```
    /// use scheduler_backend::domain::SchedulingStatus;
    ///
    /// assert!(SchedulingStatus::Pending.can_transition_to(SchedulingStatus::Completed));
    /// assert!(!SchedulingStatus::Completed.can_transition_to(SchedulingStatus::Pending));
    /// ```
    pub fn can_transition_to(self, next: Self) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Cancelled => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl fmt::Display for SchedulingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulingStatus {
    type Err = UnknownLabelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalised = raw.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalised)
            .ok_or_else(|| UnknownLabelError::new("status", raw))
    }
}

/// Urgency attached to a visit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServicePriority {
    /// Can wait.
    Low,
    /// Default priority.
    #[default]
    Medium,
    /// Needs attention first.
    High,
}

impl ServicePriority {
    /// Stable wire label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for ServicePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServicePriority {
    type Err = UnknownLabelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(UnknownLabelError::new("priority", raw)),
        }
    }
}

/// Parse an optional label, falling back when it is absent or unrecognised.
///
/// # Examples
/// ```
/// use scheduler_backend::domain::{ServicePriority, parse_or_default};
///
/// assert_eq!(parse_or_default(Some("high"), ServicePriority::Medium), ServicePriority::High);
/// assert_eq!(parse_or_default(Some("urgent"), ServicePriority::Medium), ServicePriority::Medium);
/// assert_eq!(parse_or_default(None, ServicePriority::Low), ServicePriority::Low);
/// ```
pub fn parse_or_default<T: FromStr>(raw: Option<&str>, fallback: T) -> T {
    raw.and_then(|value| value.parse().ok()).unwrap_or(fallback)
}

/// Parse an optional label, returning `None` when it is absent or unrecognised.
pub fn parse_optional<T: FromStr>(raw: Option<&str>) -> Option<T> {
    raw.and_then(|value| value.parse().ok())
}
