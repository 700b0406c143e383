//! MySQL/MariaDB SQL dialect (Strategy pattern).

use crate::core::identifier::quote_mysql;
use crate::core::traits::Dialect;
use crate::core::value::SqlValue;
use crate::error::Result;

/// MySQL/MariaDB dialect implementation.
///
/// Compatible with MySQL 5.7+, 8.0+, and MariaDB 10.2+. MySQL has no
/// `RETURNING`; the executor reads the generated key from the connection's
/// `LAST_INSERT_ID()`.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_mysql(name)
    }

    fn param_placeholder(&self, _index: usize, _value: &SqlValue) -> String {
        "?".to_string()
    }

    fn empty_insert_values(&self) -> &'static str {
        "() VALUES ()"
    }
}
