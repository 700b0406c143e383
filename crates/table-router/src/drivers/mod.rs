//! Database driver implementations.
//!
//! Each driver module provides:
//! - a `Dialect`: SQL syntax strategy for the database engine
//! - an `Executor`: runs built statements over a connection pool
//!
//! - [`postgres`]: PostgreSQL (deadpool-postgres)
//! - [`mssql`]: Microsoft SQL Server (bb8 + tiberius)
//! - [`mysql`]: MySQL/MariaDB (mysql_async, `mysql` feature)
//! - [`memory`]: in-process tables for tests and dry runs
//! - [`common`]: shared TLS and error classification helpers
//!
//! Dialects are always compiled so statements can be built for any engine;
//! only the MySQL executor is gated behind its feature.

use std::sync::Arc;

pub mod common;
pub mod memory;
pub mod mssql;
pub mod mysql;
pub mod postgres;

pub use common::SslMode;
pub use memory::MemoryExecutor;
pub use mssql::{MssqlDialect, MssqlExecutor};
#[cfg(feature = "mysql")]
pub use mysql::MysqlExecutor;
pub use mysql::MysqlDialect;
pub use postgres::{PgExecutor, PostgresDialect};

use crate::config::{DatabaseConfig, DatabaseKind};
use crate::core::traits::{Dialect, Executor};
use crate::error::Result;

/// Dialect for a database kind.
pub fn dialect_for(kind: DatabaseKind) -> Box<dyn Dialect> {
    match kind {
        DatabaseKind::Postgres => Box::new(PostgresDialect::new()),
        DatabaseKind::Mssql => Box::new(MssqlDialect::new()),
        DatabaseKind::Mysql => Box::new(MysqlDialect::new()),
    }
}

/// Connect an executor for the configured database.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Executor>> {
    match config.r#type {
        DatabaseKind::Postgres => Ok(Arc::new(PgExecutor::connect(config).await?)),
        DatabaseKind::Mssql => Ok(Arc::new(MssqlExecutor::connect(config).await?)),
        #[cfg(feature = "mysql")]
        DatabaseKind::Mysql => Ok(Arc::new(MysqlExecutor::connect(config).await?)),
        #[cfg(not(feature = "mysql"))]
        DatabaseKind::Mysql => Err(crate::error::RouterError::Config(
            "MySQL support requires the 'mysql' feature".to_string(),
        )),
    }
}
