//! Records, column value maps and table references.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::SqlValue;

/// Identifier of the physical table a statement targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema (PostgreSQL/SQL Server) or database (MySQL). `None` uses the
    /// connection default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Table name.
    pub name: String,
}

impl TableRef {
    /// Unqualified table reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Schema-qualified table reference.
    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Parse `schema.table` or `table`.
    ///
    /// Only the first dot separates schema from table.
    pub fn parse(s: &str) -> Self {
        match s.split_once('.') {
            Some((schema, name)) => Self::qualified(schema, name),
            None => Self::new(s),
        }
    }

    /// Same schema, table name with `_{suffix}` appended (`events` -> `events_3`).
    pub fn with_suffix(&self, suffix: impl fmt::Display) -> Self {
        Self {
            schema: self.schema.clone(),
            name: format!("{}_{}", self.name, suffix),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl From<&str> for TableRef {
    fn from(s: &str) -> Self {
        TableRef::parse(s)
    }
}

/// Insertion-ordered mapping from column name to value.
///
/// Column order is preserved so generated SQL is deterministic. Setting a
/// column that is already present replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    entries: Vec<(String, SqlValue)>,
}

/// Column/value pairs identifying the rows an update or delete targets.
///
/// Pairs are combined with `AND`; a NULL value matches with `IS NULL`.
pub type Constraints = Values;

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Values::set).
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column value, replacing any existing value for that column.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn remove(&mut self, column: &str) -> Option<SqlValue> {
        let idx = self.entries.iter().position(|(c, _)| c == column)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    /// Copy of these values restricted to `columns`, in this map's order.
    pub fn only<S: AsRef<str>>(&self, columns: &[S]) -> Values {
        self.entries
            .iter()
            .filter(|(c, _)| columns.iter().any(|k| k.as_ref() == c))
            .cloned()
            .collect()
    }

    /// Copy of these values without `column`.
    pub fn without(&self, column: &str) -> Values {
        self.entries
            .iter()
            .filter(|(c, _)| c != column)
            .cloned()
            .collect()
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for Values {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = Values::new();
        for (k, v) in iter {
            values.set(k, v);
        }
        values
    }
}

impl IntoIterator for Values {
    type Item = (String, SqlValue);
    type IntoIter = std::vec::IntoIter<(String, SqlValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// How a table's primary key value is produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    /// The database assigns the key (identity/serial/auto-increment) and the
    /// insert returns it.
    #[default]
    Generated,
    /// The key is fetched from the named sequence before the insert is built.
    Sequence(String),
    /// The caller always supplies the key.
    Manual,
}

impl KeyStrategy {
    /// Whether a missing key must be fetched before building the insert.
    pub fn prefetches(&self) -> bool {
        matches!(self, KeyStrategy::Sequence(_))
    }
}

/// A record exposing a per-record table override.
///
/// This is the typed replacement for probing a record at runtime for an
/// override method: a type either returns `Some(table)` or `None`.
pub trait HasTableOverride {
    fn table_override(&self) -> Option<&TableRef>;
}

/// Column values of one row, with its primary key column and optional
/// per-record table override.
///
/// A record also remembers the key it was stored under. Updates and
/// deletes target that key, so changing the key column of a stored record
/// moves the row instead of addressing a different one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: Values,
    primary_key: Option<String>,
    table: Option<TableRef>,
    persisted_id: Option<SqlValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record whose values are `values`.
    pub fn from_values(values: Values) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    /// Name the primary key column.
    #[must_use]
    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    /// Route this record to `table` regardless of the resolver.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<TableRef>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Builder-style column assignment.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.values.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.values.set(column, value);
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column)
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn set_primary_key(&mut self, column: Option<String>) {
        self.primary_key = column;
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Primary key value, if the key column is named and holds a non-NULL value.
    pub fn id(&self) -> Option<&SqlValue> {
        self.primary_key
            .as_deref()
            .and_then(|pk| self.values.get(pk))
            .filter(|v| !v.is_null())
    }

    pub fn set_table(&mut self, table: Option<TableRef>) {
        self.table = table;
    }

    /// Mark a record read from the database as stored under its current key.
    #[must_use]
    pub fn persisted(mut self) -> Self {
        self.persisted_id = self.id().cloned();
        self
    }

    /// Key the record is stored under, if it was created or loaded.
    pub fn persisted_id(&self) -> Option<&SqlValue> {
        self.persisted_id.as_ref()
    }

    pub fn set_persisted_id(&mut self, id: Option<SqlValue>) {
        self.persisted_id = id;
    }

    /// Whether the key column differs from the stored key.
    pub fn key_changed(&self) -> bool {
        match (&self.persisted_id, self.id()) {
            (Some(stored), Some(current)) => !stored.same_value(current),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

impl HasTableOverride for Record {
    fn table_override(&self) -> Option<&TableRef> {
        self.table.as_ref()
    }
}
