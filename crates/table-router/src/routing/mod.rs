//! Table resolvers.
//!
//! A resolver picks the physical table a record is written to. Every
//! resolver yields to a per-record override first (see
//! [`TableResolver::resolve`]); the resolvers here only differ in how they
//! route records that carry no override.
//!
//! - [`StaticTable`]: always the declared table
//! - [`ModuloShards`]: `{base}_{n}` from a shard key column
//! - [`MonthlyPartitions`]: `{base}_{YYYY}_{MM}` from a date column

use crate::core::record::{TableRef, Values};
use crate::core::traits::TableResolver;
use crate::core::value::SqlValue;

/// Resolver that routes every record to one declared table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticTable {
    table: TableRef,
}

impl StaticTable {
    pub fn new(table: impl Into<TableRef>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

impl TableResolver for StaticTable {
    fn static_table(&self) -> &TableRef {
        &self.table
    }
}

/// Resolver that spreads records over `shards` tables named `{base}_{n}`.
///
/// Integer keys use `key mod shards` (always non-negative); text, UUID and
/// binary keys use a stable FNV-1a hash. A record whose shard column is
/// missing or NULL goes to the base table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuloShards {
    base: TableRef,
    column: String,
    shards: u32,
}

impl ModuloShards {
    /// `shards` is clamped to at least 1.
    pub fn new(base: impl Into<TableRef>, column: impl Into<String>, shards: u32) -> Self {
        Self {
            base: base.into(),
            column: column.into(),
            shards: shards.max(1),
        }
    }

    /// Shard number for a key value, `None` for NULL or unhashable values.
    pub fn shard_for(&self, value: &SqlValue) -> Option<u32> {
        let shards = u64::from(self.shards);
        let n = match value {
            SqlValue::I16(_) | SqlValue::I32(_) | SqlValue::I64(_) => {
                let key = value.as_i64()?;
                key.rem_euclid(i64::from(self.shards)) as u64
            }
            SqlValue::Text(s) => fnv1a(s.as_bytes()) % shards,
            SqlValue::Bytes(b) => fnv1a(b) % shards,
            SqlValue::Uuid(u) => fnv1a(u.as_bytes()) % shards,
            _ => return None,
        };
        Some(n as u32)
    }
}

impl TableResolver for ModuloShards {
    fn static_table(&self) -> &TableRef {
        &self.base
    }

    fn route(&self, values: &Values) -> TableRef {
        match values.get(&self.column).and_then(|v| self.shard_for(v)) {
            Some(n) => self.base.with_suffix(n),
            None => self.base.clone(),
        }
    }

    fn routing_column(&self) -> Option<&str> {
        Some(&self.column)
    }
}

/// Resolver that writes records to monthly tables `{base}_{YYYY}_{MM}`.
///
/// The month comes from a date or timestamp column. Records whose partition
/// column is missing, NULL or not temporal go to the base table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyPartitions {
    base: TableRef,
    column: String,
}

impl MonthlyPartitions {
    pub fn new(base: impl Into<TableRef>, column: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            column: column.into(),
        }
    }
}

impl TableResolver for MonthlyPartitions {
    fn static_table(&self) -> &TableRef {
        &self.base
    }

    fn route(&self, values: &Values) -> TableRef {
        match values.get(&self.column).and_then(SqlValue::year_month) {
            Some((year, month)) => self.base.with_suffix(format!("{:04}_{:02}", year, month)),
            None => self.base.clone(),
        }
    }

    fn routing_column(&self) -> Option<&str> {
        Some(&self.column)
    }
}

/// 64-bit FNV-1a. Stable across processes and platforms, unlike the std
/// `Hash` implementations.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}
