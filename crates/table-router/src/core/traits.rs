//! Core traits for table routing and statement execution.
//!
//! - [`Dialect`]: SQL syntax strategy for different database engines
//! - [`Executor`]: Runs built statements against a database connection
//! - [`TableResolver`]: Picks the physical table for a record
//!
//! # Design Patterns
//!
//! - **Strategy**: Dialect and TableResolver provide interchangeable algorithms
//! - **Template Method**: Default implementations in traits define algorithm skeletons

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::statement::Statement;

use super::record::{HasTableOverride, TableRef, Values};
use super::value::SqlValue;

/// SQL syntax differences between database engines.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Get the dialect identifier (e.g., "mssql", "postgres").
    fn name(&self) -> &str;

    /// Validate and quote an identifier (table name, column name, etc.).
    ///
    /// - MSSQL: `[identifier]`
    /// - PostgreSQL: `"identifier"`
    /// - MySQL: `` `identifier` ``
    fn quote_ident(&self, name: &str) -> Result<String>;

    /// Get a parameter placeholder for the given 1-based index.
    ///
    /// The value is passed so dialects can attach an explicit type to the
    /// placeholder.
    ///
    /// - MSSQL: `@P1`, `@P2`, etc.
    /// - PostgreSQL: `$1::bigint`, `$2::text`, etc.
    /// - MySQL: `?`
    fn param_placeholder(&self, index: usize, value: &SqlValue) -> String;

    /// Row-source clause of an INSERT that supplies no columns.
    ///
    /// - PostgreSQL, MSSQL: `DEFAULT VALUES`
    /// - MySQL: `() VALUES ()`
    fn empty_insert_values(&self) -> &'static str {
        "DEFAULT VALUES"
    }

    /// Clause placed between the column list and `VALUES` to return the
    /// generated key (MSSQL `OUTPUT INSERTED.[id]`).
    fn insert_output_clause(&self, _quoted_pk: &str) -> Option<String> {
        None
    }

    /// Clause appended to an INSERT to return the generated key
    /// (PostgreSQL `RETURNING "id"`).
    fn insert_returning_clause(&self, _quoted_pk: &str) -> Option<String> {
        None
    }

    /// Query (with bind values) that fetches the next value of a sequence.
    ///
    /// Returns `None` when the dialect has no sequences.
    fn next_sequence_query(&self, _sequence: &str) -> Result<Option<(String, Vec<SqlValue>)>> {
        Ok(None)
    }

    /// Quote a possibly schema-qualified table reference.
    fn qualify(&self, table: &TableRef) -> Result<String> {
        match &table.schema {
            Some(schema) => Ok(format!(
                "{}.{}",
                self.quote_ident(schema)?,
                self.quote_ident(&table.name)?
            )),
            None => self.quote_ident(&table.name),
        }
    }
}

/// Runs built statements against a database connection.
///
/// Driver errors are surfaced without retry. Constraint violations reported
/// by the database map to [`RouterError::ConstraintViolation`](crate::RouterError::ConstraintViolation).
#[async_trait]
pub trait Executor: Send + Sync {
    /// Dialect statements for this executor must be built with.
    fn dialect(&self) -> &dyn Dialect;

    /// Execute an INSERT. Returns the generated primary key when
    /// `primary_key` is given and the database reports one.
    async fn insert(
        &self,
        statement: &Statement,
        primary_key: Option<&str>,
    ) -> Result<Option<SqlValue>>;

    /// Execute an UPDATE, returning the number of rows affected.
    async fn update(&self, statement: &Statement) -> Result<u64>;

    /// Execute a DELETE, returning the number of rows affected.
    async fn delete(&self, statement: &Statement) -> Result<u64>;

    /// Fetch the next value of `sequence`, for keys that must exist before
    /// the insert is built.
    async fn next_sequence_value(&self, sequence: &str) -> Result<SqlValue>;
}

/// Picks the physical table a record is written to.
///
/// A record that exposes a table override is always written to that table.
/// Otherwise [`route`](TableResolver::route) decides; the default is the
/// static table.
pub trait TableResolver: Send + Sync + fmt::Debug {
    /// Statically declared table of the record type.
    fn static_table(&self) -> &TableRef;

    /// Table for a record without an override.
    fn route(&self, _values: &Values) -> TableRef {
        self.static_table().clone()
    }

    /// Column whose value picks the table, if routing depends on one.
    fn routing_column(&self) -> Option<&str> {
        None
    }

    /// Resolve the target table for a record holding `values`.
    fn resolve(&self, record: &dyn HasTableOverride, values: &Values) -> TableRef {
        match record.table_override() {
            Some(table) => table.clone(),
            None => self.route(values),
        }
    }
}
