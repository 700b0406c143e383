//! PostgreSQL driver.
//!
//! - [`PostgresDialect`]: SQL syntax strategy for PostgreSQL
//! - [`PgExecutor`]: executor over a deadpool-postgres pool

mod dialect;
mod executor;

pub use dialect::PostgresDialect;
pub use executor::PgExecutor;
