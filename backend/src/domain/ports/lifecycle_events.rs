//! Ports for lifecycle event fan-out.
//!
//! [`LifecycleEventPublisher`] is what the domain services call: it must
//! hand the event off without waiting on delivery. [`LifecycleEventChannel`]
//! is the transport a publisher forwards to; it may block and fail, and the
//! publisher is responsible for retrying it.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::SchedulingId;

use super::define_port_error;

/// What happened to a scheduling record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleEventKind {
    /// A record was created.
    Created,
    /// A record's status was updated.
    Updated,
    /// A record was deleted.
    Deleted,
    /// A record is coming up within the reminder window.
    Reminder,
}

impl LifecycleEventKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 4] = [Self::Created, Self::Updated, Self::Deleted, Self::Reminder];

    /// Destination name for this kind, one per kind.
    pub const fn destination(self) -> &'static str {
        match self {
            Self::Created => "scheduling.created",
            Self::Updated => "scheduling.updated",
            Self::Deleted => "scheduling.deleted",
            Self::Reminder => "scheduling.reminder",
        }
    }

    /// Lowercase label used in logs and metrics.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Reminder => "reminder",
        }
    }
}

impl fmt::Display for LifecycleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable notification carrying only the record identifier.
///
/// Consumers re-fetch the record by id, so an event must never be published
/// before the write it describes has committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub kind: LifecycleEventKind,
    pub scheduling_id: SchedulingId,
}

impl LifecycleEvent {
    /// Build an event.
    pub const fn new(kind: LifecycleEventKind, scheduling_id: SchedulingId) -> Self {
        Self {
            kind,
            scheduling_id,
        }
    }

    /// Wire payload: the decimal record identifier.
    pub fn payload(&self) -> String {
        self.scheduling_id.to_string()
    }
}

define_port_error! {
    /// Errors raised when handing an event to the publisher.
    pub enum LifecycleEventPublishError {
        /// The in-process buffer is full.
        BufferFull { message: String } =>
            "lifecycle event buffer is full: {message}",
        /// The publisher has shut down.
        Closed { message: String } =>
            "lifecycle event publisher is closed: {message}",
    }
}

define_port_error! {
    /// Errors raised by the event transport.
    pub enum LifecycleEventChannelError {
        /// Channel infrastructure is unavailable.
        Unavailable { message: String } =>
            "lifecycle event channel is unavailable: {message}",
        /// The channel refused the message.
        Rejected { message: String } =>
            "lifecycle event was rejected: {message}",
    }
}

/// Fire-and-forget publisher used by the domain services.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LifecycleEventPublisher: Send + Sync {
    /// Hand off an event for at-least-once delivery.
    ///
    /// Returns once the event is queued, never after waiting on a consumer.
    async fn publish(&self, event: LifecycleEvent) -> Result<(), LifecycleEventPublishError>;
}

/// At-least-once transport with one destination per event kind.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LifecycleEventChannel: Send + Sync {
    /// Deliver an event to the destination for its kind.
    async fn send(&self, event: &LifecycleEvent) -> Result<(), LifecycleEventChannelError>;
}

/// Publisher that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLifecycleEventPublisher;

#[async_trait]
impl LifecycleEventPublisher for NoOpLifecycleEventPublisher {
    async fn publish(&self, _event: LifecycleEvent) -> Result<(), LifecycleEventPublishError> {
        Ok(())
    }
}
