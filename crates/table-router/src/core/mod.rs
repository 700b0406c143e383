//! Core types and traits shared by the routing, statement and driver layers.
//!
//! - [`value`]: Typed bind values
//! - [`identifier`]: Identifier validation and quoting
//! - [`record`]: Records, value maps, constraints and table references
//! - [`traits`]: Dialect, executor and table resolver traits
//!
//! Driver modules (`drivers/postgres`, `drivers/mssql`, ...) implement the
//! traits; nothing here performs I/O.

pub mod identifier;
pub mod record;
pub mod traits;
pub mod value;

pub use record::{Constraints, HasTableOverride, KeyStrategy, Record, TableRef, Values};
pub use traits::{Dialect, Executor, TableResolver};
pub use value::{SqlNullType, SqlValue};
