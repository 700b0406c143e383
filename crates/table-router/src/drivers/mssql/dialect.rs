//! MSSQL SQL dialect (Strategy pattern).

use crate::core::identifier::quote_mssql;
use crate::core::traits::Dialect;
use crate::core::value::SqlValue;
use crate::error::Result;

/// Microsoft SQL Server dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct MssqlDialect;

impl MssqlDialect {
    /// Create a new MSSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MssqlDialect {
    fn name(&self) -> &str {
        "mssql"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_mssql(name)
    }

    fn param_placeholder(&self, index: usize, _value: &SqlValue) -> String {
        // tiberius names positional parameters @P1, @P2, ...
        format!("@P{}", index)
    }

    fn insert_output_clause(&self, quoted_pk: &str) -> Option<String> {
        Some(format!("OUTPUT INSERTED.{}", quoted_pk))
    }

    fn next_sequence_query(&self, sequence: &str) -> Result<Option<(String, Vec<SqlValue>)>> {
        // NEXT VALUE FOR takes an object name, not a parameter
        let name = sequence
            .split('.')
            .map(quote_mssql)
            .collect::<Result<Vec<_>>>()?
            .join(".");
        Ok(Some((format!("SELECT NEXT VALUE FOR {}", name), Vec::new())))
    }
}
