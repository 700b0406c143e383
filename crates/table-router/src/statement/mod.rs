//! Parameterized INSERT/UPDATE/DELETE statement building.
//!
//! Statements are always built against an already resolved [`TableRef`];
//! the table is carried inside the [`Statement`] so it cannot change between
//! build and execution. Values are never interpolated into SQL text: each one
//! becomes a dialect placeholder plus a bind parameter.

use tracing::debug;

use crate::core::record::{Constraints, TableRef, Values};
use crate::core::traits::Dialect;
use crate::core::value::SqlValue;
use crate::error::{Result, RouterError};

/// One WHERE-clause term of an update or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `column = <param>`; consumes one bind parameter.
    Eq(String),
    /// `column IS NULL`; consumes no bind parameter.
    IsNull(String),
}

impl Predicate {
    pub fn column(&self) -> &str {
        match self {
            Predicate::Eq(c) | Predicate::IsNull(c) => c,
        }
    }
}

/// Structured description of a built statement.
///
/// Bind parameters are ordered as: assigned columns first, then `Eq`
/// predicates in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Insert {
        columns: Vec<String>,
        returning: Option<String>,
    },
    Update {
        columns: Vec<String>,
        predicates: Vec<Predicate>,
    },
    Delete {
        predicates: Vec<Predicate>,
    },
}

impl Operation {
    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Insert { .. } => "insert",
            Operation::Update { .. } => "update",
            Operation::Delete { .. } => "delete",
        }
    }
}

/// SQL text, bind parameters and target table of one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub table: TableRef,
    pub operation: Operation,
}

/// Builds statements in one dialect.
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder<'a> {
    dialect: &'a dyn Dialect,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Build an INSERT of `values` into `table`.
    ///
    /// With no values the dialect's empty-row form is used. When `returning`
    /// names the primary key column, the dialect's returned-key clause is
    /// included.
    pub fn build_insert(
        &self,
        table: &TableRef,
        values: &Values,
        returning: Option<&str>,
    ) -> Result<Statement> {
        let target = self.dialect.qualify(table)?;
        let quoted_pk = returning.map(|pk| self.dialect.quote_ident(pk)).transpose()?;
        let output = quoted_pk
            .as_deref()
            .and_then(|pk| self.dialect.insert_output_clause(pk))
            .map(|clause| format!(" {}", clause))
            .unwrap_or_default();
        let returning_clause = quoted_pk
            .as_deref()
            .and_then(|pk| self.dialect.insert_returning_clause(pk))
            .map(|clause| format!(" {}", clause))
            .unwrap_or_default();

        let mut params = Vec::with_capacity(values.len());
        let sql = if values.is_empty() {
            format!(
                "INSERT INTO {}{} {}{}",
                target,
                output,
                self.dialect.empty_insert_values(),
                returning_clause
            )
        } else {
            let mut cols = Vec::with_capacity(values.len());
            let mut placeholders = Vec::with_capacity(values.len());
            for (column, value) in values.iter() {
                cols.push(self.dialect.quote_ident(column)?);
                params.push(value.clone());
                placeholders.push(self.dialect.param_placeholder(params.len(), value));
            }
            format!(
                "INSERT INTO {} ({}){} VALUES ({}){}",
                target,
                cols.join(", "),
                output,
                placeholders.join(", "),
                returning_clause
            )
        };

        debug!("Built insert for {}: {}", table, sql);
        Ok(Statement {
            sql,
            params,
            table: table.clone(),
            operation: Operation::Insert {
                columns: values.columns().map(str::to_string).collect(),
                returning: returning.map(str::to_string),
            },
        })
    }

    /// Build an UPDATE of `values` on the rows of `table` matching all
    /// `constraints`.
    ///
    /// Fails with [`RouterError::EmptyConstraint`] when `constraints` is
    /// empty and [`RouterError::NothingToUpdate`] when `values` is empty.
    pub fn build_update(
        &self,
        table: &TableRef,
        values: &Values,
        constraints: &Constraints,
    ) -> Result<Statement> {
        if constraints.is_empty() {
            return Err(RouterError::empty_constraint("update", table));
        }
        if values.is_empty() {
            return Err(RouterError::NothingToUpdate {
                table: table.to_string(),
            });
        }

        let target = self.dialect.qualify(table)?;
        let mut params = Vec::with_capacity(values.len() + constraints.len());
        let mut assignments = Vec::with_capacity(values.len());
        for (column, value) in values.iter() {
            params.push(value.clone());
            assignments.push(format!(
                "{} = {}",
                self.dialect.quote_ident(column)?,
                self.dialect.param_placeholder(params.len(), value)
            ));
        }
        let (where_sql, predicates) = self.where_clause(constraints, &mut params)?;

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            target,
            assignments.join(", "),
            where_sql
        );

        debug!("Built update for {}: {}", table, sql);
        Ok(Statement {
            sql,
            params,
            table: table.clone(),
            operation: Operation::Update {
                columns: values.columns().map(str::to_string).collect(),
                predicates,
            },
        })
    }

    /// Build a DELETE of the rows of `table` matching all `constraints`.
    ///
    /// Fails with [`RouterError::EmptyConstraint`] when `constraints` is empty.
    pub fn build_delete(&self, table: &TableRef, constraints: &Constraints) -> Result<Statement> {
        if constraints.is_empty() {
            return Err(RouterError::empty_constraint("delete", table));
        }

        let target = self.dialect.qualify(table)?;
        let mut params = Vec::with_capacity(constraints.len());
        let (where_sql, predicates) = self.where_clause(constraints, &mut params)?;
        let sql = format!("DELETE FROM {} WHERE {}", target, where_sql);

        debug!("Built delete for {}: {}", table, sql);
        Ok(Statement {
            sql,
            params,
            table: table.clone(),
            operation: Operation::Delete { predicates },
        })
    }

    fn where_clause(
        &self,
        constraints: &Constraints,
        params: &mut Vec<SqlValue>,
    ) -> Result<(String, Vec<Predicate>)> {
        let mut terms = Vec::with_capacity(constraints.len());
        let mut predicates = Vec::with_capacity(constraints.len());
        for (column, value) in constraints.iter() {
            let quoted = self.dialect.quote_ident(column)?;
            if value.is_null() {
                terms.push(format!("{} IS NULL", quoted));
                predicates.push(Predicate::IsNull(column.to_string()));
            } else {
                params.push(value.clone());
                terms.push(format!(
                    "{} = {}",
                    quoted,
                    self.dialect.param_placeholder(params.len(), value)
                ));
                predicates.push(Predicate::Eq(column.to_string()));
            }
        }
        Ok((terms.join(" AND "), predicates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlNullType;
    use crate::drivers::{MssqlDialect, MysqlDialect, PostgresDialect};

    fn users() -> TableRef {
        TableRef::qualified("public", "users")
    }

    #[test]
    fn test_insert_postgres_with_returning() {
        let dialect = PostgresDialect::new();
        let values = Values::new().with("name", "a").with("age", 30i32);
        let stmt = StatementBuilder::new(&dialect)
            .build_insert(&TableRef::new("shard_2"), &values, Some("id"))
            .unwrap();

        assert_eq!(
            stmt.sql,
            "INSERT INTO \"shard_2\" (\"name\", \"age\") VALUES ($1::text, $2::integer) RETURNING \"id\""
        );
        assert_eq!(stmt.params, vec![SqlValue::from("a"), SqlValue::I32(30)]);
        assert_eq!(stmt.table, TableRef::new("shard_2"));
    }

    #[test]
    fn test_insert_mssql_uses_output_clause() {
        let dialect = MssqlDialect::new();
        let values = Values::new().with("name", "a");
        let stmt = StatementBuilder::new(&dialect)
            .build_insert(&TableRef::qualified("dbo", "users"), &values, Some("id"))
            .unwrap();

        assert_eq!(
            stmt.sql,
            "INSERT INTO [dbo].[users] ([name]) OUTPUT INSERTED.[id] VALUES (@P1)"
        );
    }

    #[test]
    fn test_insert_mysql_has_no_returning() {
        let dialect = MysqlDialect::new();
        let values = Values::new().with("name", "a").with("n", 1i64);
        let stmt = StatementBuilder::new(&dialect)
            .build_insert(&TableRef::new("users"), &values, Some("id"))
            .unwrap();

        assert_eq!(stmt.sql, "INSERT INTO `users` (`name`, `n`) VALUES (?, ?)");
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_empty_insert_per_dialect() {
        let table = TableRef::new("events_7");
        let empty = Values::new();

        let pg = PostgresDialect::new();
        let stmt = StatementBuilder::new(&pg)
            .build_insert(&table, &empty, Some("id"))
            .unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"events_7\" DEFAULT VALUES RETURNING \"id\""
        );
        assert!(stmt.params.is_empty());

        let mssql = MssqlDialect::new();
        let stmt = StatementBuilder::new(&mssql)
            .build_insert(&table, &empty, Some("id"))
            .unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO [events_7] OUTPUT INSERTED.[id] DEFAULT VALUES"
        );

        let mysql = MysqlDialect::new();
        let stmt = StatementBuilder::new(&mysql)
            .build_insert(&table, &empty, None)
            .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO `events_7` () VALUES ()");
    }

    #[test]
    fn test_update_binds_values_then_constraints() {
        let dialect = PostgresDialect::new();
        let values = Values::new().with("name", "b");
        let constraints = Constraints::new().with("id", 7i64).with("tenant", 3i32);
        let stmt = StatementBuilder::new(&dialect)
            .build_update(&users(), &values, &constraints)
            .unwrap();

        assert_eq!(
            stmt.sql,
            "UPDATE \"public\".\"users\" SET \"name\" = $1::text WHERE \"id\" = $2::bigint AND \"tenant\" = $3::integer"
        );
        assert_eq!(
            stmt.params,
            vec![SqlValue::from("b"), SqlValue::I64(7), SqlValue::I32(3)]
        );
        assert_eq!(
            stmt.operation,
            Operation::Update {
                columns: vec!["name".to_string()],
                predicates: vec![
                    Predicate::Eq("id".to_string()),
                    Predicate::Eq("tenant".to_string())
                ],
            }
        );
    }

    #[test]
    fn test_update_rejects_empty_constraints() {
        let dialect = PostgresDialect::new();
        let values = Values::new().with("name", "b");
        let err = StatementBuilder::new(&dialect)
            .build_update(&users(), &values, &Constraints::new())
            .unwrap_err();
        assert!(matches!(
            err,
            RouterError::EmptyConstraint {
                operation: "update",
                ..
            }
        ));
    }

    #[test]
    fn test_update_rejects_empty_values() {
        let dialect = PostgresDialect::new();
        let constraints = Constraints::new().with("id", 1i64);
        let err = StatementBuilder::new(&dialect)
            .build_update(&users(), &Values::new(), &constraints)
            .unwrap_err();
        assert!(matches!(err, RouterError::NothingToUpdate { .. }));
    }

    #[test]
    fn test_delete_rejects_empty_constraints() {
        let dialect = MysqlDialect::new();
        let err = StatementBuilder::new(&dialect)
            .build_delete(&users(), &Constraints::new())
            .unwrap_err();
        assert!(matches!(
            err,
            RouterError::EmptyConstraint {
                operation: "delete",
                ..
            }
        ));
    }

    #[test]
    fn test_delete_null_constraint_uses_is_null() {
        let dialect = MssqlDialect::new();
        let constraints = Constraints::new()
            .with("id", 9i32)
            .with("deleted_at", SqlValue::Null(SqlNullType::DateTime));
        let stmt = StatementBuilder::new(&dialect)
            .build_delete(&TableRef::qualified("dbo", "users"), &constraints)
            .unwrap();

        assert_eq!(
            stmt.sql,
            "DELETE FROM [dbo].[users] WHERE [id] = @P1 AND [deleted_at] IS NULL"
        );
        assert_eq!(stmt.params, vec![SqlValue::I32(9)]);
    }

    #[test]
    fn test_identifiers_are_quoted_not_interpolated() {
        let dialect = PostgresDialect::new();
        let values = Values::new().with("na\"me", "x'); DROP TABLE users;--");
        let stmt = StatementBuilder::new(&dialect)
            .build_insert(&TableRef::new("users"), &values, None)
            .unwrap();

        assert_eq!(
            stmt.sql,
            "INSERT INTO \"users\" (\"na\"\"me\") VALUES ($1::text)"
        );
        assert!(!stmt.sql.contains("DROP"));
    }

    #[test]
    fn test_invalid_table_name_rejected() {
        let dialect = PostgresDialect::new();
        let err = StatementBuilder::new(&dialect)
            .build_delete(&TableRef::new(""), &Constraints::new().with("id", 1i32))
            .unwrap_err();
        assert!(matches!(err, RouterError::InvalidIdentifier(_)));
    }
}
