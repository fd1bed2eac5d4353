//! Domain primitives, ports, and services.
//!
//! Purpose: define the scheduling aggregate, its invariants, and the two
//! services that act on it. Nothing here knows about PostgreSQL, Redis, or
//! HTTP; adapters in `outbound` implement the driven ports.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - SchedulingRecord and friends: the aggregate and its value types.
//! - SchedulingLifecycleService: create/read/update/delete orchestration.
//! - ReminderSweep: periodic reminder fan-out.

pub mod error;
pub mod ports;
pub mod reminder_sweep;
pub mod scheduling;
pub mod scheduling_lifecycle;

pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::reminder_sweep::{
    ReminderSweep, ReminderSweepConfig, ReminderSweepHandle, SweepOutcome,
};
pub use self::scheduling::{
    ChildReplacement, ClientRating, EquipmentDraft, EquipmentItem, FREE_TEXT_MAX,
    FeedbackNotAllowedError, LocationDetails, NewSchedulingRecord, PerformanceAggregates,
    QUANTITY_MAX, SHORT_TEXT_MAX, SchedulingId, SchedulingRecord, SchedulingStatus,
    SchedulingValidationError, SchedulingView, ServicePriority, SparePartDraft, SparePartItem,
    StatusTransitionError, Technician, TechnicianId, TechnicianPerformance, UnknownLabelError,
    limit_short_text, limit_text, parse_optional, parse_or_default, require_text,
    validate_coordinates, validate_email, validate_not_in_past,
};
pub use self::scheduling_lifecycle::{
    SchedulingLifecycleConfig, SchedulingLifecyclePorts, SchedulingLifecycleService,
};
