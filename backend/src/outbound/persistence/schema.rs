//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the database migrations exactly. They are used
//! by Diesel for compile-time query validation and type-safe SQL generation.
//!
//! # Maintenance
//!
//! When migrations change the schema, this file should be regenerated or
//! manually updated to reflect those changes. The `diesel print-schema`
//! command can generate these definitions from a live database.

diesel::table! {
    /// Technicians that own visits.
    ///
    /// Rows are provisioned by the identity service; this crate only reads
    /// them for ownership checks and display fields.
    technicians (id) {
        /// Primary key: UUID identifier.
        id -> Uuid,
        /// Unique login name.
        username -> Varchar,
        /// Display name.
        full_name -> Varchar,
        /// Contact address.
        email -> Varchar,
    }
}

diesel::table! {
    /// Scheduled field-service visits.
    ///
    /// `status` and `priority` hold the SCREAMING_SNAKE_CASE labels.
    schedulings (id) {
        /// Primary key: store-assigned sequence value.
        id -> Int8,
        /// Owning technician.
        technician_id -> Uuid,
        farm_name -> Varchar,
        client_name -> Varchar,
        client_email -> Varchar,
        address -> Varchar,
        latitude -> Float8,
        longitude -> Float8,
        scheduled_at -> Timestamptz,
        /// Set once, on the first transition to `COMPLETED`.
        completed_at -> Nullable<Timestamptz>,
        /// Free text, max 1000 characters.
        service_description -> Nullable<Varchar>,
        status -> Varchar,
        priority -> Varchar,
        /// 1 to 5 inclusive.
        client_rating -> Nullable<Int2>,
        /// Free text, max 1000 characters.
        client_feedback -> Nullable<Varchar>,
        /// Record creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Equipment serviced during a visit. Cascades with the parent.
    scheduling_equipment (id) {
        id -> Int8,
        scheduling_id -> Int8,
        name -> Varchar,
        serial_number -> Nullable<Varchar>,
        description -> Nullable<Varchar>,
    }
}

diesel::table! {
    /// Spare parts used during a visit. Cascades with the parent.
    scheduling_spare_parts (id) {
        id -> Int8,
        scheduling_id -> Int8,
        name -> Varchar,
        part_number -> Nullable<Varchar>,
        /// Always positive.
        quantity -> Int4,
    }
}

diesel::joinable!(schedulings -> technicians (technician_id));
diesel::joinable!(scheduling_equipment -> schedulings (scheduling_id));
diesel::joinable!(scheduling_spare_parts -> schedulings (scheduling_id));

diesel::allow_tables_to_appear_in_same_query!(
    technicians,
    schedulings,
    scheduling_equipment,
    scheduling_spare_parts,
);
