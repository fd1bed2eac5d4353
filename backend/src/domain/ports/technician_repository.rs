//! Port for technician identity lookups.

use async_trait::async_trait;

use crate::domain::{Technician, TechnicianId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by technician lookup adapters.
    pub enum TechnicianRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "technician repository connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } =>
            "technician repository query failed: {message}",
    }
}

/// Read access to technicians referenced by scheduling records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TechnicianRepository: Send + Sync {
    /// Find a technician by id.
    async fn find_by_id(
        &self,
        id: &TechnicianId,
    ) -> Result<Option<Technician>, TechnicianRepositoryError>;
}

/// Fixture returning a synthetic technician for any id.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureTechnicianRepository;

#[async_trait]
impl TechnicianRepository for FixtureTechnicianRepository {
    async fn find_by_id(
        &self,
        id: &TechnicianId,
    ) -> Result<Option<Technician>, TechnicianRepositoryError> {
        Ok(Some(Technician {
            id: *id,
            username: "fixture".to_owned(),
            full_name: "Fixture Technician".to_owned(),
            email: "fixture@example.com".to_owned(),
        }))
    }
}
