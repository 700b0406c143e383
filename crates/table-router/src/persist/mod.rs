//! Data-access layer.
//!
//! [`Persister`] wires a [`TableResolver`], the statement builder and an
//! [`Executor`] together. It offers the three table-level primitives
//! (insert, update, delete against an optional explicit table) and the
//! record lifecycle built on them: create, update by primary key and delete
//! by primary key.
//!
//! Guards run before anything reaches the database: an update or delete
//! without constraints, or a record-level update without a primary key
//! value, fails without executing SQL.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::record::{Constraints, HasTableOverride, KeyStrategy, Record, TableRef, Values};
use crate::core::traits::{Executor, TableResolver};
use crate::core::value::SqlValue;
use crate::error::{Result, RouterError};
use crate::statement::StatementBuilder;

/// Default primary key column.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Routes record writes to resolved tables and runs them.
///
/// Cheap to clone; clones share the executor and resolver.
#[derive(Clone)]
pub struct Persister {
    executor: Arc<dyn Executor>,
    resolver: Arc<dyn TableResolver>,
    primary_key: Option<String>,
    key_strategy: KeyStrategy,
}

impl fmt::Debug for Persister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persister")
            .field("dialect", &self.executor.dialect().name())
            .field("resolver", &self.resolver)
            .field("primary_key", &self.primary_key)
            .field("key_strategy", &self.key_strategy)
            .finish()
    }
}

impl Persister {
    /// Persister with primary key `id` and database-generated keys.
    pub fn new(executor: Arc<dyn Executor>, resolver: Arc<dyn TableResolver>) -> Self {
        Self {
            executor,
            resolver,
            primary_key: Some(DEFAULT_PRIMARY_KEY.to_string()),
            key_strategy: KeyStrategy::Generated,
        }
    }

    /// Set the primary key column.
    #[must_use]
    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    /// Tables without a primary key: inserts return no id and record-level
    /// update/delete are unavailable.
    #[must_use]
    pub fn without_primary_key(mut self) -> Self {
        self.primary_key = None;
        self
    }

    /// Set how primary key values are produced.
    #[must_use]
    pub fn with_key_strategy(mut self, strategy: KeyStrategy) -> Self {
        if self.primary_key.is_none() && strategy != KeyStrategy::Generated {
            warn!(
                "Key strategy {:?} has no effect on {} without a primary key",
                strategy,
                self.resolver.static_table()
            );
        }
        if let KeyStrategy::Sequence(sequence) = &strategy {
            let dialect = self.executor.dialect();
            if matches!(dialect.next_sequence_query(sequence), Ok(None)) {
                warn!(
                    "Sequence {} configured for {} but {} has no sequences",
                    sequence,
                    self.resolver.static_table(),
                    dialect.name()
                );
            }
        }
        self.key_strategy = strategy;
        self
    }

    /// Empty record carrying this persister's primary key column.
    pub fn record(&self) -> Record {
        match &self.primary_key {
            Some(pk) => Record::new().with_primary_key(pk.clone()),
            None => Record::new(),
        }
    }

    pub fn resolver(&self) -> &dyn TableResolver {
        self.resolver.as_ref()
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    pub fn key_strategy(&self) -> &KeyStrategy {
        &self.key_strategy
    }

    fn builder(&self) -> StatementBuilder<'_> {
        StatementBuilder::new(self.executor.dialect())
    }

    fn table_or_static(&self, table: Option<&TableRef>) -> TableRef {
        table
            .cloned()
            .unwrap_or_else(|| self.resolver.static_table().clone())
    }

    /// Insert `values` into `table` (the static table when `None`).
    ///
    /// Returns the generated primary key when the database reports one.
    pub async fn insert_values(
        &self,
        table: Option<&TableRef>,
        values: &Values,
    ) -> Result<Option<SqlValue>> {
        let table = self.table_or_static(table);
        let pk = self.primary_key.as_deref();
        let statement = self.builder().build_insert(&table, values, pk)?;
        let id = self.executor.insert(&statement, pk).await?;
        debug!("Inserted into {} ({} columns)", table, values.len());
        Ok(id)
    }

    /// Update the rows of `table` (the static table when `None`) matching
    /// all `constraints`. Returns the number of rows affected.
    ///
    /// Empty `constraints` fail with [`RouterError::EmptyConstraint`]. Empty
    /// `values` affect nothing and make no database call.
    pub async fn update_values(
        &self,
        table: Option<&TableRef>,
        values: &Values,
        constraints: &Constraints,
    ) -> Result<u64> {
        let table = self.table_or_static(table);
        if constraints.is_empty() {
            return Err(RouterError::empty_constraint("update", &table));
        }
        if values.is_empty() {
            debug!("No columns to update in {}, skipping", table);
            return Ok(0);
        }
        let statement = self.builder().build_update(&table, values, constraints)?;
        let affected = self.executor.update(&statement).await?;
        debug!("Updated {} row(s) in {}", affected, table);
        Ok(affected)
    }

    /// Delete the rows of `table` (the static table when `None`) matching
    /// all `constraints`. Returns the number of rows affected.
    pub async fn delete_where(
        &self,
        table: Option<&TableRef>,
        constraints: &Constraints,
    ) -> Result<u64> {
        let table = self.table_or_static(table);
        let statement = self.builder().build_delete(&table, constraints)?;
        let affected = self.executor.delete(&statement).await?;
        debug!("Deleted {} row(s) from {}", affected, table);
        Ok(affected)
    }

    /// Insert `record` into its resolved table.
    ///
    /// With a sequence key strategy and no key value, the key is fetched
    /// first and written into the record before the insert is built. A key
    /// generated by the database is written back into the record. Returns
    /// the record's key.
    ///
    /// A record routed on its own key column must carry the key before the
    /// insert; otherwise this fails with
    /// [`RouterError::UnassignedRoutingKey`] and nothing is executed.
    pub async fn create(&self, record: &mut Record) -> Result<Option<SqlValue>> {
        let pk = record
            .primary_key()
            .or(self.primary_key.as_deref())
            .map(str::to_string);

        if let Some(pk) = &pk {
            let has_key = record.get(pk).is_some_and(|v| !v.is_null());
            match &self.key_strategy {
                KeyStrategy::Sequence(sequence) if !has_key => {
                    let id = self.executor.next_sequence_value(sequence).await?;
                    debug!("Prefetched {} from sequence {}", pk, sequence);
                    record.set(pk.as_str(), id);
                }
                KeyStrategy::Manual if !has_key => {
                    return Err(RouterError::MissingPrimaryKey {
                        table: self.resolver.resolve(&*record, record.values()).to_string(),
                    });
                }
                _ => {}
            }
            self.check_routing_key(record, pk)?;
        }

        if record.primary_key().is_none() {
            record.set_primary_key(pk.clone());
        }
        let table = self.resolver.resolve(&*record, record.values());
        // a NULL key column would override the database default
        let values = match &pk {
            Some(pk) if record.get(pk).is_some_and(SqlValue::is_null) => {
                record.values().without(pk)
            }
            _ => record.values().clone(),
        };

        let statement = self.builder().build_insert(&table, &values, pk.as_deref())?;
        let returned = self.executor.insert(&statement, pk.as_deref()).await?;

        let Some(pk) = pk else {
            debug!("Created record in {}", table);
            return Ok(None);
        };
        let id = match record.get(&pk).filter(|v| !v.is_null()).cloned() {
            Some(existing) => Some(existing),
            None => {
                if let Some(id) = &returned {
                    record.set(pk.as_str(), id.clone());
                } else {
                    warn!("Insert into {} returned no value for {}", table, pk);
                }
                returned
            }
        };
        record.set_persisted_id(id.clone());
        debug!("Created record in {}", table);
        Ok(id)
    }

    /// Update every column of `record` in its resolved table, by the key it
    /// is stored under. Returns the number of rows affected.
    ///
    /// The key column is only written when the record's key was changed;
    /// the stored key then follows the new value.
    pub async fn update(&self, record: &mut Record) -> Result<u64> {
        let (table, pk, id) = self.identify(record)?;
        let values = if record.key_changed() {
            record.values().clone()
        } else {
            record.values().without(&pk)
        };
        let affected = self
            .update_values(Some(&table), &values, &Constraints::new().with(pk, id))
            .await?;
        Self::key_written(record, affected);
        Ok(affected)
    }

    /// Update only `columns` of `record`, by the key it is stored under.
    ///
    /// Columns the record does not hold are ignored, and so is the key
    /// column unless the record's key was changed.
    pub async fn update_columns<S: AsRef<str>>(
        &self,
        record: &mut Record,
        columns: &[S],
    ) -> Result<u64> {
        let (table, pk, id) = self.identify(record)?;
        let mut values = record.values().only(columns);
        if !record.key_changed() {
            values = values.without(&pk);
        }
        let affected = self
            .update_values(Some(&table), &values, &Constraints::new().with(pk.as_str(), id))
            .await?;
        if values.contains(&pk) {
            Self::key_written(record, affected);
        }
        Ok(affected)
    }

    /// Delete `record` from its resolved table, by the key it is stored
    /// under.
    pub async fn delete(&self, record: &Record) -> Result<u64> {
        let (table, pk, id) = self.identify(record)?;
        self.delete_where(Some(&table), &Constraints::new().with(pk, id))
            .await
    }

    /// Move the stored key to the record's current key after a write.
    fn key_written(record: &mut Record, affected: u64) {
        if affected > 0 {
            let id = record.id().cloned();
            record.set_persisted_id(id);
        }
    }

    /// Refuse to insert a record whose table depends on a key that only
    /// the database can assign.
    fn check_routing_key(&self, record: &Record, pk: &str) -> Result<()> {
        if self.resolver.routing_column() != Some(pk) {
            return Ok(());
        }
        if let Some(table) = record.table_override() {
            if table == self.resolver.static_table() {
                warn!(
                    "Override {} bypasses routing on {} for this record",
                    table, pk
                );
            }
            return Ok(());
        }
        if record.get(pk).is_some_and(|v| !v.is_null()) {
            return Ok(());
        }
        Err(RouterError::UnassignedRoutingKey {
            table: self.resolver.static_table().to_string(),
            column: pk.to_string(),
        })
    }

    /// Resolved table, key column and stored key value of a record.
    ///
    /// Routing sees the stored key, so a changed key still finds the row
    /// where it was written.
    fn identify(&self, record: &Record) -> Result<(TableRef, String, SqlValue)> {
        let pk = record.primary_key().or(self.primary_key.as_deref());
        let id = record
            .persisted_id()
            .or_else(|| pk.and_then(|pk| record.get(pk)).filter(|v| !v.is_null()))
            .cloned();

        let mut routing = record.values().clone();
        if let (Some(pk), Some(id)) = (pk, &id) {
            routing.set(pk, id.clone());
        }
        let table = self.resolver.resolve(record, &routing);

        match (pk, id) {
            (Some(pk), Some(id)) => Ok((table, pk.to_string(), id)),
            _ => Err(RouterError::MissingPrimaryKey {
                table: table.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{MemoryExecutor, MssqlDialect};
    use crate::routing::{ModuloShards, StaticTable};

    fn persister(executor: &Arc<MemoryExecutor>) -> Persister {
        Persister::new(executor.clone(), Arc::new(StaticTable::new("users")))
    }

    #[tokio::test]
    async fn test_create_assigns_generated_id() {
        let executor = Arc::new(MemoryExecutor::new());
        let persister = persister(&executor);

        let mut record = persister.record().with("name", "a");
        let id = persister.create(&mut record).await.unwrap();

        assert_eq!(id, Some(SqlValue::I64(1)));
        assert_eq!(record.id(), Some(&SqlValue::I64(1)));
        let executed = executor.executed().await;
        assert_eq!(
            executed[0].sql,
            "INSERT INTO \"users\" (\"name\") VALUES ($1::text) RETURNING \"id\""
        );
    }

    #[tokio::test]
    async fn test_create_drops_null_key_column() {
        let executor = Arc::new(MemoryExecutor::with_dialect(MssqlDialect::new()));
        let persister = persister(&executor);

        let mut record = persister
            .record()
            .with("id", SqlValue::Null(crate::core::value::SqlNullType::I64))
            .with("name", "a");
        persister.create(&mut record).await.unwrap();

        let executed = executor.executed().await;
        assert_eq!(
            executed[0].sql,
            "INSERT INTO [users] ([name]) OUTPUT INSERTED.[id] VALUES (@P1)"
        );
        assert_eq!(record.id(), Some(&SqlValue::I64(1)));
    }

    #[tokio::test]
    async fn test_create_with_sequence_prefetches_before_insert() {
        let executor = Arc::new(MemoryExecutor::new());
        let persister = persister(&executor)
            .with_key_strategy(KeyStrategy::Sequence("users_id_seq".to_string()));

        let mut record = persister.record().with("name", "a");
        let id = persister.create(&mut record).await.unwrap();

        assert_eq!(id, Some(SqlValue::I64(1)));
        let executed = executor.executed().await;
        assert_eq!(executed.len(), 1);
        assert_eq!(
            executed[0].sql,
            "INSERT INTO \"users\" (\"name\", \"id\") VALUES ($1::text, $2::bigint) RETURNING \"id\""
        );
    }

    #[tokio::test]
    async fn test_create_manual_requires_key() {
        let executor = Arc::new(MemoryExecutor::new());
        let persister = persister(&executor).with_key_strategy(KeyStrategy::Manual);

        let mut record = persister.record().with("name", "a");
        let err = persister.create(&mut record).await.unwrap_err();
        assert!(matches!(err, RouterError::MissingPrimaryKey { .. }));
        assert!(executor.executed().await.is_empty());

        let mut record = persister.record().with("id", 42i64).with("name", "a");
        let id = persister.create(&mut record).await.unwrap();
        assert_eq!(id, Some(SqlValue::I64(42)));
    }

    #[tokio::test]
    async fn test_update_without_id_makes_no_call() {
        let executor = Arc::new(MemoryExecutor::new());
        let persister = persister(&executor);

        let mut record = persister.record().with("name", "a");
        let err = persister.update(&mut record).await.unwrap_err();
        assert!(matches!(err, RouterError::MissingPrimaryKey { .. }));
        let err = persister.delete(&record).await.unwrap_err();
        assert!(matches!(err, RouterError::MissingPrimaryKey { .. }));
        assert!(executor.executed().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_columns_restricts_set_list() {
        let executor = Arc::new(MemoryExecutor::new());
        let persister = persister(&executor);

        let mut record = persister.record().with("name", "a").with("email", "a@x");
        persister.create(&mut record).await.unwrap();
        record.set("name", "b");
        record.set("email", "b@x");

        let affected = persister
            .update_columns(&mut record, &["email", "id"])
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let rows = executor.rows(&TableRef::new("users")).await;
        assert_eq!(rows[0].get("name"), Some(&SqlValue::from("a")));
        assert_eq!(rows[0].get("email"), Some(&SqlValue::from("b@x")));
    }

    #[tokio::test]
    async fn test_update_with_no_columns_skips_database() {
        let executor = Arc::new(MemoryExecutor::new());
        let persister = persister(&executor);

        let affected = persister
            .update_values(None, &Values::new(), &Constraints::new().with("id", 1i64))
            .await
            .unwrap();
        assert_eq!(affected, 0);
        assert!(executor.executed().await.is_empty());
    }

    #[tokio::test]
    async fn test_generated_key_cannot_pick_shard() {
        let executor = Arc::new(MemoryExecutor::new());
        let persister = Persister::new(
            executor.clone(),
            Arc::new(ModuloShards::new("events", "id", 4)),
        );

        let mut record = persister.record().with("name", "a");
        let err = persister.create(&mut record).await.unwrap_err();
        assert!(matches!(
            err,
            RouterError::UnassignedRoutingKey { ref column, .. } if column == "id"
        ));
        assert!(executor.executed().await.is_empty());

        // an override decides the table without the key
        let mut record = persister.record().with("name", "a").with_table("events_0");
        persister.create(&mut record).await.unwrap();
        assert_eq!(persister.delete(&record).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sequence_key_routes_create_and_update_to_same_shard() {
        let executor = Arc::new(MemoryExecutor::new());
        let persister = Persister::new(
            executor.clone(),
            Arc::new(ModuloShards::new("events", "id", 4)),
        )
        .with_key_strategy(KeyStrategy::Sequence("events_id_seq".to_string()));

        let mut record = persister.record().with("name", "a");
        persister.create(&mut record).await.unwrap();
        record.set("name", "b");
        assert_eq!(persister.update(&mut record).await.unwrap(), 1);

        let executed = executor.executed().await;
        assert!(executed.iter().all(|s| s.table == TableRef::new("events_1")));
    }

    #[tokio::test]
    async fn test_changed_key_updates_stored_row() {
        let executor = Arc::new(MemoryExecutor::new());
        let persister = persister(&executor);

        let mut record = persister.record().with("name", "a");
        persister.create(&mut record).await.unwrap();
        let mut other = persister.record().with("name", "b");
        persister.create(&mut other).await.unwrap();

        record.set("id", 10i64);
        assert_eq!(persister.update(&mut record).await.unwrap(), 1);
        assert_eq!(record.persisted_id(), Some(&SqlValue::I64(10)));

        let executed = executor.executed().await;
        assert_eq!(
            executed[2].sql,
            "UPDATE \"users\" SET \"name\" = $1::text, \"id\" = $2::bigint WHERE \"id\" = $3::bigint"
        );
        let rows = executor.rows(&TableRef::new("users")).await;
        assert_eq!(rows[0].get("id"), Some(&SqlValue::I64(10)));
        assert_eq!(rows[1].get("id"), Some(&SqlValue::I64(2)));

        // later writes follow the new key
        record.set("name", "c");
        assert_eq!(persister.update(&mut record).await.unwrap(), 1);
        assert_eq!(persister.delete(&record).await.unwrap(), 1);
        assert_eq!(executor.rows(&TableRef::new("users")).await.len(), 1);
    }

    #[tokio::test]
    async fn test_loaded_record_targets_stored_key() {
        let executor = Arc::new(MemoryExecutor::new());
        let persister = persister(&executor);
        persister
            .insert_values(None, &Values::new().with("id", 7i64).with("name", "a"))
            .await
            .unwrap();

        let row = executor.rows(&TableRef::new("users")).await.remove(0);
        let mut record = Record::from_values(row).with_primary_key("id").persisted();
        record.set("id", 8i64);
        persister.update_columns(&mut record, &["name"]).await.unwrap();

        // only listed columns are written, so the key stays put
        assert_eq!(record.persisted_id(), Some(&SqlValue::I64(7)));
        assert_eq!(persister.delete(&record).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_record_routes_through_resolver() {
        let executor = Arc::new(MemoryExecutor::new());
        let persister = Persister::new(
            executor.clone(),
            Arc::new(ModuloShards::new("events", "tenant", 4)),
        );

        let mut record = persister.record().with("tenant", 7i64);
        persister.create(&mut record).await.unwrap();
        assert_eq!(persister.delete(&record).await.unwrap(), 1);

        let executed = executor.executed().await;
        assert!(executed.iter().all(|s| s.table == TableRef::new("events_3")));
    }
}
