//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. They exist solely to satisfy Diesel's
//! type requirements for queries and mutations.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{scheduling_equipment, scheduling_spare_parts, schedulings, technicians};

/// Row struct for reading from the technicians table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = technicians)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct TechnicianRow {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: String,
}

/// Row struct for reading from the schedulings table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schedulings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SchedulingRow {
    pub id: i64,
    pub technician_id: Uuid,
    pub farm_name: String,
    pub client_name: String,
    pub client_email: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub scheduled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub service_description: Option<String>,
    pub status: String,
    pub priority: String,
    pub client_rating: Option<i16>,
    pub client_feedback: Option<String>,
    #[expect(dead_code, reason = "schema field for future audit trail support")]
    pub created_at: DateTime<Utc>,
    #[expect(dead_code, reason = "schema field for future audit trail support")]
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for creating scheduling records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schedulings)]
pub(crate) struct NewSchedulingRow<'a> {
    pub technician_id: Uuid,
    pub farm_name: &'a str,
    pub client_name: &'a str,
    pub client_email: &'a str,
    pub address: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub scheduled_at: DateTime<Utc>,
    pub service_description: Option<&'a str>,
    pub status: &'a str,
    pub priority: &'a str,
}

/// Changeset overwriting every mutable scheduling column.
///
/// `None` writes `NULL`, so the row ends up matching the domain record.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = schedulings)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct SchedulingUpdate<'a> {
    pub farm_name: &'a str,
    pub client_name: &'a str,
    pub client_email: &'a str,
    pub address: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub scheduled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub service_description: Option<&'a str>,
    pub status: &'a str,
    pub priority: &'a str,
    pub client_rating: Option<i16>,
    pub client_feedback: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Child collection models
// ---------------------------------------------------------------------------

/// Row struct for reading from the scheduling_equipment table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = scheduling_equipment)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct EquipmentRow {
    pub id: i64,
    pub scheduling_id: i64,
    pub name: String,
    pub serial_number: Option<String>,
    pub description: Option<String>,
}

/// Insertable struct for equipment items.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = scheduling_equipment)]
pub(crate) struct NewEquipmentRow<'a> {
    pub scheduling_id: i64,
    pub name: &'a str,
    pub serial_number: Option<&'a str>,
    pub description: Option<&'a str>,
}

/// Row struct for reading from the scheduling_spare_parts table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = scheduling_spare_parts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SparePartRow {
    pub id: i64,
    pub scheduling_id: i64,
    pub name: String,
    pub part_number: Option<String>,
    pub quantity: i32,
}

/// Insertable struct for spare parts.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = scheduling_spare_parts)]
pub(crate) struct NewSparePartRow<'a> {
    pub scheduling_id: i64,
    pub name: &'a str,
    pub part_number: Option<&'a str>,
    pub quantity: i32,
}

// ---------------------------------------------------------------------------
// Aggregate query rows
// ---------------------------------------------------------------------------

/// Result of the per-technician performance aggregate query.
#[derive(Debug, Clone, QueryableByName)]
pub(crate) struct PerformanceRow {
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Double>)]
    pub average_rating: Option<f64>,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub completed_visits: i64,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Double>)]
    pub average_visit_duration_hours: Option<f64>,
}
