//! Diesel and pool error mapping shared by the repository adapters.
//!
//! Repositories hand in their own `query`/`connection` constructors so the
//! classification lives in one place while each port keeps its error type.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;

/// Map pool errors into a repository-specific connection error constructor.
pub fn map_basic_pool_error<E, C>(error: PoolError, connection: C) -> E
where
    C: FnOnce(String) -> E,
{
    let message = match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    };
    connection(message)
}

/// Classify a Diesel error as a query or connection failure.
///
/// Closed connections and unreachable servers are connection failures, so
/// callers can report them as a temporarily unavailable store. Everything
/// else, including constraint violations, is a query failure.
pub fn map_basic_diesel_error<E, Q, C>(error: DieselError, query: Q, connection: C) -> E
where
    Q: Fn(String) -> E,
    C: Fn(String) -> E,
{
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        other => debug!(error = %other, "diesel operation failed"),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            connection("database connection closed".to_owned())
        }
        DieselError::DatabaseError(DatabaseErrorKind::UnableToSendCommand, info) => {
            connection(format!("database unreachable: {}", info.message()))
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            query(format!("referenced row missing: {}", info.message()))
        }
        DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
            query(format!("value rejected by constraint: {}", info.message()))
        }
        DieselError::DatabaseError(_, info) => query(format!("database error: {}", info.message())),
        DieselError::NotFound => query("record not found".to_owned()),
        DieselError::QueryBuilderError(err) => query(format!("query builder error: {err}")),
        DieselError::DeserializationError(err) => query(format!("row decode failed: {err}")),
        other => query(format!("database error: {other}")),
    }
}
