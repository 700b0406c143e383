//! # table-router
//!
//! Route INSERT, UPDATE and DELETE statements to a table chosen at call
//! time instead of the table statically declared for a record type.
//!
//! This library provides:
//!
//! - **Table resolvers** picking a physical table per record: static,
//!   modulo shards or monthly partitions, always yielding to a per-record
//!   override
//! - **Statement building** for PostgreSQL, SQL Server and MySQL with bound
//!   parameters and quoted identifiers
//! - **Executors** over deadpool-postgres, bb8/tiberius and mysql_async pools,
//!   plus an in-memory executor for tests
//! - **Persister**: create, update and delete records by primary key against
//!   the resolved table
//!
//! ## Example
//!
//! ```rust,no_run
//! use table_router::Config;
//!
//! #[tokio::main]
//! async fn main() -> table_router::Result<()> {
//!     let config = Config::load("router.yaml")?;
//!     let executor = config.connect().await?;
//!     let users = config.persister("users", executor)?;
//!
//!     let mut record = users.record().with("name", "a").with_table("users_2");
//!     let id = users.create(&mut record).await?;
//!     println!("Created {:?}", id);
//!
//!     record.set("name", "b");
//!     users.update(&mut record).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod persist;
pub mod routing;
pub mod statement;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, DatabaseKind, RouteConfig};
pub use crate::core::{
    Constraints, Dialect, Executor, HasTableOverride, KeyStrategy, Record, SqlNullType, SqlValue,
    TableRef, TableResolver, Values,
};
pub use drivers::{MemoryExecutor, SslMode};
pub use error::{Result, RouterError};
pub use persist::Persister;
pub use routing::{ModuloShards, MonthlyPartitions, StaticTable};
pub use statement::{Statement, StatementBuilder};
