//! PostgreSQL-backed `TechnicianRepository` implementation using Diesel ORM.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{TechnicianRepository, TechnicianRepositoryError};
use crate::domain::{Technician, TechnicianId};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::TechnicianRow;
use super::pool::{DbPool, PoolError};
use super::schema::technicians;

/// Diesel-backed implementation of the technician lookup port.
#[derive(Clone)]
pub struct DieselTechnicianRepository {
    pool: DbPool,
}

impl DieselTechnicianRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> TechnicianRepositoryError {
    map_basic_pool_error(error, TechnicianRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> TechnicianRepositoryError {
    map_basic_diesel_error(
        error,
        TechnicianRepositoryError::query,
        TechnicianRepositoryError::connection,
    )
}

#[async_trait]
impl TechnicianRepository for DieselTechnicianRepository {
    async fn find_by_id(
        &self,
        id: &TechnicianId,
    ) -> Result<Option<Technician>, TechnicianRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = technicians::table
            .filter(technicians::id.eq(id.as_uuid()))
            .select(TechnicianRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        Ok(row.map(|row| Technician {
            id: TechnicianId::from_uuid(row.id),
            username: row.username,
            full_name: row.full_name,
            email: row.email,
        }))
    }
}
