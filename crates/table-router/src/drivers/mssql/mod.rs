//! Microsoft SQL Server driver.
//!
//! - [`MssqlDialect`]: SQL syntax strategy for MSSQL
//! - [`MssqlExecutor`]: executor over a bb8 pool of Tiberius clients

mod dialect;
mod executor;

pub use dialect::MssqlDialect;
pub use executor::{MssqlExecutor, TiberiusConnectionManager};
