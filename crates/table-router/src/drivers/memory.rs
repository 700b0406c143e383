//! In-memory executor.
//!
//! Interprets built statements against in-process tables instead of sending
//! them to a server. Tables spring into existence on first insert. Integer
//! keys auto-increment per table, sequences count from 1 and a duplicate
//! primary key is a constraint violation, matching what a real database
//! would report. Every executed statement is kept for inspection.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::postgres::PostgresDialect;
use crate::core::record::{TableRef, Values};
use crate::core::traits::{Dialect, Executor};
use crate::core::value::SqlValue;
use crate::error::{Result, RouterError};
use crate::statement::{Operation, Predicate, Statement};

#[derive(Debug, Default)]
struct MemoryTable {
    rows: Vec<Values>,
    next_id: i64,
}

impl MemoryTable {
    fn allocate_id(&mut self) -> i64 {
        self.next_id = self.next_id.max(1);
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    /// Keep the counter ahead of caller-supplied integer keys.
    fn observe_id(&mut self, id: &SqlValue) {
        if let Some(id) = id.as_i64() {
            self.next_id = self.next_id.max(id.saturating_add(1));
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<TableRef, MemoryTable>,
    sequences: HashMap<String, i64>,
    executed: Vec<Statement>,
}

/// Executor over in-process tables.
pub struct MemoryExecutor {
    dialect: Box<dyn Dialect>,
    state: Mutex<MemoryState>,
}

impl Default for MemoryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryExecutor {
    /// Executor that builds statements in the PostgreSQL dialect.
    pub fn new() -> Self {
        Self::with_dialect(PostgresDialect::new())
    }

    /// Executor that builds statements in `dialect`.
    pub fn with_dialect(dialect: impl Dialect + 'static) -> Self {
        Self {
            dialect: Box::new(dialect),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Statements executed so far, oldest first.
    pub async fn executed(&self) -> Vec<Statement> {
        self.state.lock().await.executed.clone()
    }

    /// Current rows of `table`; empty if nothing was ever inserted.
    pub async fn rows(&self, table: &TableRef) -> Vec<Values> {
        self.state
            .lock()
            .await
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Tables that hold at least one row.
    pub async fn tables(&self) -> Vec<TableRef> {
        let state = self.state.lock().await;
        let mut tables: Vec<_> = state
            .tables
            .iter()
            .filter(|(_, t)| !t.rows.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        tables.sort();
        tables
    }
}

#[async_trait]
impl Executor for MemoryExecutor {
    fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    async fn insert(
        &self,
        statement: &Statement,
        primary_key: Option<&str>,
    ) -> Result<Option<SqlValue>> {
        let Operation::Insert { columns, .. } = &statement.operation else {
            return Err(mismatch(statement, "insert"));
        };
        debug!("Memory insert: {}", statement.sql);

        let mut row: Values = columns
            .iter()
            .cloned()
            .zip(statement.params.iter().cloned())
            .collect();

        let mut state = self.state.lock().await;
        state.executed.push(statement.clone());
        let table = state.tables.entry(statement.table.clone()).or_default();

        let Some(pk) = primary_key else {
            table.rows.push(row);
            return Ok(None);
        };

        let id = match row.get(pk).filter(|v| !v.is_null()).cloned() {
            Some(id) => id,
            None => {
                let id = SqlValue::I64(table.allocate_id());
                row.set(pk, id.clone());
                id
            }
        };
        let duplicate = table
            .rows
            .iter()
            .any(|r| r.get(pk).is_some_and(|v| v.same_value(&id)));
        if duplicate {
            let message = format!("duplicate key value for {} in {}", pk, statement.table);
            return Err(RouterError::ConstraintViolation {
                table: statement.table.to_string(),
                message: message.clone(),
                source: message.into(),
            });
        }
        table.observe_id(&id);

        table.rows.push(row);
        Ok(Some(id))
    }

    async fn update(&self, statement: &Statement) -> Result<u64> {
        let Operation::Update {
            columns,
            predicates,
        } = &statement.operation
        else {
            return Err(mismatch(statement, "update"));
        };
        debug!("Memory update: {}", statement.sql);

        let split = columns.len().min(statement.params.len());
        let (assigned, bound) = statement.params.split_at(split);
        let mut state = self.state.lock().await;
        state.executed.push(statement.clone());
        let Some(table) = state.tables.get_mut(&statement.table) else {
            return Ok(0);
        };

        let mut affected = 0;
        for row in table.rows.iter_mut() {
            if matches_all(row, predicates, bound) {
                for (column, value) in columns.iter().zip(assigned) {
                    row.set(column.as_str(), value.clone());
                }
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn delete(&self, statement: &Statement) -> Result<u64> {
        let Operation::Delete { predicates } = &statement.operation else {
            return Err(mismatch(statement, "delete"));
        };
        debug!("Memory delete: {}", statement.sql);

        let mut state = self.state.lock().await;
        state.executed.push(statement.clone());
        let Some(table) = state.tables.get_mut(&statement.table) else {
            return Ok(0);
        };

        let before = table.rows.len();
        table
            .rows
            .retain(|row| !matches_all(row, predicates, &statement.params));
        Ok((before - table.rows.len()) as u64)
    }

    async fn next_sequence_value(&self, sequence: &str) -> Result<SqlValue> {
        if self.dialect.next_sequence_query(sequence)?.is_none() {
            return Err(RouterError::Unsupported {
                dialect: self.dialect.name().to_string(),
                feature: "sequences",
            });
        }
        let mut state = self.state.lock().await;
        let counter = state.sequences.entry(sequence.to_string()).or_insert(0);
        *counter += 1;
        Ok(SqlValue::I64(*counter))
    }
}

/// Whether `row` satisfies every predicate. `Eq` predicates consume `params`
/// in order; `IsNull` matches a NULL or missing column.
fn matches_all(row: &Values, predicates: &[Predicate], params: &[SqlValue]) -> bool {
    let mut params = params.iter();
    predicates.iter().all(|predicate| match predicate {
        Predicate::IsNull(column) => row.get(column).map_or(true, SqlValue::is_null),
        Predicate::Eq(column) => match (row.get(column), params.next()) {
            (Some(actual), Some(expected)) => actual.same_value(expected),
            _ => false,
        },
    })
}

fn mismatch(statement: &Statement, expected: &str) -> RouterError {
    RouterError::UnexpectedStatement(format!(
        "expected {} statement, got {} for {}",
        expected,
        statement.operation.verb(),
        statement.table
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlNullType;
    use crate::drivers::MysqlDialect;
    use crate::statement::StatementBuilder;

    fn table() -> TableRef {
        TableRef::new("users_1")
    }

    async fn insert(executor: &MemoryExecutor, values: Values) -> Result<Option<SqlValue>> {
        let stmt =
            StatementBuilder::new(executor.dialect()).build_insert(&table(), &values, Some("id"))?;
        executor.insert(&stmt, Some("id")).await
    }

    #[tokio::test]
    async fn test_insert_generates_sequential_ids() {
        let executor = MemoryExecutor::new();
        let first = insert(&executor, Values::new().with("name", "a")).await.unwrap();
        let second = insert(&executor, Values::new()).await.unwrap();

        assert_eq!(first, Some(SqlValue::I64(1)));
        assert_eq!(second, Some(SqlValue::I64(2)));
        let rows = executor.rows(&table()).await;
        assert_eq!(rows[1].get("id"), Some(&SqlValue::I64(2)));
    }

    #[tokio::test]
    async fn test_manual_id_advances_counter_and_rejects_duplicates() {
        let executor = MemoryExecutor::new();
        insert(&executor, Values::new().with("id", 10i32)).await.unwrap();

        let next = insert(&executor, Values::new()).await.unwrap();
        assert_eq!(next, Some(SqlValue::I64(11)));

        let err = insert(&executor, Values::new().with("id", 10i64))
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(executor.rows(&table()).await.len(), 2);
    }

    #[tokio::test]
    async fn test_max_manual_id_does_not_overflow() {
        let executor = MemoryExecutor::new();
        let id = insert(&executor, Values::new().with("id", i64::MAX))
            .await
            .unwrap();
        assert_eq!(id, Some(SqlValue::I64(i64::MAX)));

        // the counter is exhausted; the next generated key collides
        let err = insert(&executor, Values::new()).await.unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn test_wrong_statement_kind_is_rejected() {
        let executor = MemoryExecutor::new();
        let stmt = StatementBuilder::new(executor.dialect())
            .build_delete(&table(), &Values::new().with("id", 1i32))
            .unwrap();
        let err = executor.insert(&stmt, Some("id")).await.unwrap_err();
        assert!(matches!(err, RouterError::UnexpectedStatement(_)));
        assert!(executor.executed().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete_match_predicates() {
        let executor = MemoryExecutor::new();
        insert(&executor, Values::new().with("name", "a")).await.unwrap();
        insert(
            &executor,
            Values::new()
                .with("name", "b")
                .with("deleted_at", SqlValue::Null(SqlNullType::DateTime)),
        )
        .await
        .unwrap();

        let builder = StatementBuilder::new(executor.dialect());
        let stmt = builder
            .build_update(
                &table(),
                &Values::new().with("name", "c"),
                &Values::new().with("id", 2i32),
            )
            .unwrap();
        assert_eq!(executor.update(&stmt).await.unwrap(), 1);
        let rows = executor.rows(&table()).await;
        assert_eq!(rows[1].get("name"), Some(&SqlValue::from("c")));

        // missing column counts as NULL
        let stmt = builder
            .build_delete(
                &table(),
                &Values::new().with("deleted_at", SqlValue::Null(SqlNullType::DateTime)),
            )
            .unwrap();
        assert_eq!(executor.delete(&stmt).await.unwrap(), 2);
        assert!(executor.rows(&table()).await.is_empty());
        assert_eq!(executor.executed().await.len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_table_affects_nothing() {
        let executor = MemoryExecutor::new();
        let stmt = StatementBuilder::new(executor.dialect())
            .build_delete(&TableRef::new("missing"), &Values::new().with("id", 1i32))
            .unwrap();
        assert_eq!(executor.delete(&stmt).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sequences() {
        let executor = MemoryExecutor::new();
        assert_eq!(
            executor.next_sequence_value("users_id_seq").await.unwrap(),
            SqlValue::I64(1)
        );
        assert_eq!(
            executor.next_sequence_value("users_id_seq").await.unwrap(),
            SqlValue::I64(2)
        );

        let mysql = MemoryExecutor::with_dialect(MysqlDialect::new());
        let err = mysql.next_sequence_value("users_id_seq").await.unwrap_err();
        assert!(matches!(err, RouterError::Unsupported { .. }));
    }
}
