//! Shared mapping from pool and Diesel errors to port error enums.
//!
//! Every port error enum generated by `define_port_error!` exposes
//! `connection` and `query` constructors, so one generic mapper serves all
//! of the persistence adapters.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;

/// Map a pool checkout/build failure into a port connection error.
pub fn map_pool_error_with<E>(error: PoolError, connection: impl Fn(String) -> E) -> E {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => connection(message),
    }
}

/// Map a Diesel execution failure into a port error.
pub fn map_diesel_error_with<E>(
    error: DieselError,
    connection: impl Fn(String) -> E,
    query: impl Fn(String) -> E,
) -> E {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => query("record not found".to_owned()),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            connection("database connection error".to_owned())
        }
        _ => query("database error".to_owned()),
    }
}

macro_rules! adapter_error_mappers {
    ($error:ty) => {
        fn map_pool_error(error: super::pool::PoolError) -> $error {
            super::map_errors::map_pool_error_with(error, |message| {
                <$error>::connection(message)
            })
        }

        fn map_diesel_error(error: diesel::result::Error) -> $error {
            super::map_errors::map_diesel_error_with(
                error,
                |message| <$error>::connection(message),
                |message| <$error>::query(message),
            )
        }
    };
}

pub(crate) use adapter_error_mappers;
