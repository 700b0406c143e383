//! PostgreSQL SQL dialect (Strategy pattern).

use crate::core::identifier::quote_pg;
use crate::core::traits::Dialect;
use crate::core::value::{SqlNullType, SqlValue};
use crate::error::Result;

/// PostgreSQL dialect implementation.
///
/// Placeholders carry an explicit cast (`$1::bigint`) so each parameter's
/// type is fixed by the bound value, not inferred from the column. The
/// server then applies its normal assignment and comparison casts.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_pg(name)
    }

    fn param_placeholder(&self, index: usize, value: &SqlValue) -> String {
        format!("${}::{}", index, pg_type_name(value.null_type()))
    }

    fn insert_returning_clause(&self, quoted_pk: &str) -> Option<String> {
        Some(format!("RETURNING {}", quoted_pk))
    }

    fn next_sequence_query(&self, sequence: &str) -> Result<Option<(String, Vec<SqlValue>)>> {
        // regclass resolves `schema.seq` the same way the server resolves table names
        Ok(Some((
            "SELECT nextval($1::text::regclass)".to_string(),
            vec![SqlValue::Text(sequence.to_string())],
        )))
    }
}

/// PostgreSQL type a bound value is cast to.
fn pg_type_name(ty: SqlNullType) -> &'static str {
    match ty {
        SqlNullType::Bool => "boolean",
        SqlNullType::I16 => "smallint",
        SqlNullType::I32 => "integer",
        SqlNullType::I64 => "bigint",
        SqlNullType::F32 => "real",
        SqlNullType::F64 => "double precision",
        SqlNullType::String => "text",
        SqlNullType::Bytes => "bytea",
        SqlNullType::Uuid => "uuid",
        SqlNullType::Decimal => "numeric",
        SqlNullType::DateTime => "timestamp",
        SqlNullType::DateTimeOffset => "timestamptz",
        SqlNullType::Date => "date",
        SqlNullType::Time => "time",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::TableRef;

    #[test]
    fn test_quote_ident() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.quote_ident("name").unwrap(), "\"name\"");
        assert_eq!(
            dialect.quote_ident("table\"name").unwrap(),
            "\"table\"\"name\""
        );
        assert!(dialect.quote_ident("").is_err());
    }

    #[test]
    fn test_param_placeholder_casts_by_value() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.param_placeholder(1, &SqlValue::I64(1)), "$1::bigint");
        assert_eq!(dialect.param_placeholder(10, &SqlValue::from("a")), "$10::text");
        assert_eq!(
            dialect.param_placeholder(2, &SqlValue::Null(SqlNullType::Uuid)),
            "$2::uuid"
        );
    }

    #[test]
    fn test_qualify() {
        let dialect = PostgresDialect::new();
        assert_eq!(
            dialect.qualify(&TableRef::qualified("public", "users")).unwrap(),
            "\"public\".\"users\""
        );
        assert_eq!(
            dialect.qualify(&TableRef::new("users")).unwrap(),
            "\"users\""
        );
    }

    #[test]
    fn test_next_sequence_query_binds_name() {
        let dialect = PostgresDialect::new();
        let (sql, params) = dialect
            .next_sequence_query("public.users_id_seq")
            .unwrap()
            .unwrap();
        assert_eq!(sql, "SELECT nextval($1::text::regclass)");
        assert_eq!(params, vec![SqlValue::from("public.users_id_seq")]);
    }
}
