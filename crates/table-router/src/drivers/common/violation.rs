//! Classification of driver errors.
//!
//! Duplicate keys, foreign key failures, NOT NULL and CHECK failures become
//! [`RouterError::ConstraintViolation`] with the driver error as source.
//! Everything else passes through as the driver's own error variant.

use tokio_postgres::error::SqlState;

use crate::core::record::TableRef;
use crate::error::RouterError;

/// SQL Server error numbers for constraint failures.
/// - 2627: PRIMARY KEY / UNIQUE constraint
/// - 2601: unique index
/// - 547: FOREIGN KEY / CHECK constraint
/// - 515: NOT NULL
const MSSQL_CONSTRAINT_CODES: &[u32] = &[2627, 2601, 547, 515];

/// MySQL error numbers for constraint failures.
/// - 1062: duplicate entry
/// - 1451/1452: foreign key (parent / child row)
/// - 1048: column cannot be null
/// - 3819: check constraint
#[cfg(feature = "mysql")]
const MYSQL_CONSTRAINT_CODES: &[u16] = &[1062, 1451, 1452, 1048, 3819];

/// Classify a PostgreSQL error raised while writing to `table`.
pub fn postgres(table: &TableRef, err: tokio_postgres::Error) -> RouterError {
    let is_violation = err.code().is_some_and(|code| {
        *code == SqlState::UNIQUE_VIOLATION
            || *code == SqlState::FOREIGN_KEY_VIOLATION
            || *code == SqlState::NOT_NULL_VIOLATION
            || *code == SqlState::CHECK_VIOLATION
            || *code == SqlState::EXCLUSION_VIOLATION
    });
    if is_violation {
        RouterError::constraint_violation(table, err)
    } else {
        RouterError::Postgres(err)
    }
}

/// Classify a SQL Server error raised while writing to `table`.
pub fn mssql(table: &TableRef, err: tiberius::error::Error) -> RouterError {
    match &err {
        tiberius::error::Error::Server(token) if MSSQL_CONSTRAINT_CODES.contains(&token.code()) => {
            RouterError::constraint_violation(table, err)
        }
        _ => RouterError::Mssql(err),
    }
}

/// Classify a MySQL error raised while writing to `table`.
#[cfg(feature = "mysql")]
pub fn mysql(table: &TableRef, err: mysql_async::Error) -> RouterError {
    match &err {
        mysql_async::Error::Server(server) if MYSQL_CONSTRAINT_CODES.contains(&server.code) => {
            RouterError::constraint_violation(table, err)
        }
        _ => RouterError::Mysql(err),
    }
}
