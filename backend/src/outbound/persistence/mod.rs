//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the scheduling and technician ports backed by
//! PostgreSQL through `diesel-async` and `bb8` connection pooling.
//!
//! # Architecture
//!
//! - **Thin adapters**: repositories only translate between Diesel rows and
//!   domain types. State machine and validation rules stay in the domain.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Strongly typed errors**: Diesel and pool failures are mapped to the
//!   port error types, split into connection and query failures.
//!
//! # Example
//!
//! ```ignore
//! use scheduler_backend::outbound::persistence::{
//!     DbPool, DieselSchedulingRepository, PoolConfig,
//! };
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/scheduler")).await?;
//! let repo = DieselSchedulingRepository::new(pool);
//! ```

mod diesel_basic_error_mapping;
mod diesel_scheduling_repository;
mod diesel_technician_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_scheduling_repository::DieselSchedulingRepository;
pub use diesel_technician_repository::DieselTechnicianRepository;
pub use migrations::{MIGRATIONS, MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
