//! MySQL/MariaDB database driver.
//!
//! - [`MysqlDialect`]: SQL syntax strategy
//! - [`MysqlExecutor`]: executor over a mysql_async pool
//!
//! # Feature Flag
//!
//! The executor is only available when the `mysql` feature is enabled
//! (on by default). The dialect is always available.
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod dialect;
#[cfg(feature = "mysql")]
mod executor;

pub use dialect::MysqlDialect;
#[cfg(feature = "mysql")]
pub use executor::MysqlExecutor;
