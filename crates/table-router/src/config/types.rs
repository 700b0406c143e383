//! Configuration types.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::record::{KeyStrategy, TableRef};
use crate::core::traits::TableResolver;
use crate::drivers::common::SslMode;
use crate::routing::{ModuloShards, MonthlyPartitions, StaticTable};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection.
    pub database: DatabaseConfig,

    /// Named table routes.
    #[serde(default)]
    pub routes: BTreeMap<String, RouteConfig>,
}

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    #[serde(alias = "sqlserver")]
    Mssql,
    #[serde(alias = "mariadb")]
    Mysql,
}

impl DatabaseKind {
    /// Default TCP port of the engine.
    pub fn default_port(&self) -> u16 {
        match self {
            DatabaseKind::Postgres => 5432,
            DatabaseKind::Mssql => 1433,
            DatabaseKind::Mysql => 3306,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::Postgres => "postgres",
            DatabaseKind::Mssql => "mssql",
            DatabaseKind::Mysql => "mysql",
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database engine.
    pub r#type: DatabaseKind,

    /// Database host.
    pub host: String,

    /// Database port (default: the engine's standard port).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password. Never written back out.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Schema applied to routes that do not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// SSL mode (default: require).
    #[serde(default)]
    pub ssl_mode: SslMode,

    /// Maximum pooled connections (default: 10).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Connection timeout in seconds (default: 30).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

// Custom Debug implementation that redacts the password
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port())
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl DatabaseConfig {
    /// Connection settings with defaults for everything but the essentials.
    pub fn new(
        kind: DatabaseKind,
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            r#type: kind,
            host: host.into(),
            port: None,
            database: database.into(),
            user: user.into(),
            password: String::new(),
            schema: None,
            ssl_mode: SslMode::default(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }

    /// Configured port, or the engine's default.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.r#type.default_port())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Routing of one record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Declared table, optionally `schema.table`.
    pub table: String,

    /// Schema; overrides the database default schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Primary key column (default: "id").
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// Sequence the primary key is prefetched from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,

    /// The caller always supplies the primary key.
    #[serde(default)]
    pub manual_key: bool,

    /// Spread rows over `{table}_{n}` shard tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<ShardConfig>,

    /// Write rows to monthly `{table}_{YYYY}_{MM}` partition tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<PartitionConfig>,
}

/// Modulo sharding on a key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
    pub column: String,
    pub count: u32,
}

/// Monthly partitioning on a date or timestamp column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub column: String,
}

impl RouteConfig {
    /// Declared table, qualified with the route schema or else
    /// `default_schema`.
    pub fn table_ref(&self, default_schema: Option<&str>) -> TableRef {
        let parsed = TableRef::parse(&self.table);
        let schema = self
            .schema
            .clone()
            .or(parsed.schema)
            .or_else(|| default_schema.map(str::to_string));
        TableRef {
            schema,
            name: parsed.name,
        }
    }

    /// Resolver for this route.
    pub fn resolver(&self, default_schema: Option<&str>) -> Arc<dyn TableResolver> {
        let table = self.table_ref(default_schema);
        match (&self.shard, &self.partition) {
            (Some(shard), _) => Arc::new(ModuloShards::new(table, shard.column.clone(), shard.count)),
            (None, Some(partition)) => {
                Arc::new(MonthlyPartitions::new(table, partition.column.clone()))
            }
            (None, None) => Arc::new(StaticTable::new(table)),
        }
    }

    /// Column the shard or partition is chosen by, if any.
    pub fn routing_column(&self) -> Option<&str> {
        match (&self.shard, &self.partition) {
            (Some(shard), _) => Some(&shard.column),
            (None, Some(partition)) => Some(&partition.column),
            (None, None) => None,
        }
    }

    /// How this route's primary key is produced.
    pub fn key_strategy(&self) -> KeyStrategy {
        match &self.sequence {
            Some(sequence) => KeyStrategy::Sequence(sequence.clone()),
            None if self.manual_key => KeyStrategy::Manual,
            None => KeyStrategy::Generated,
        }
    }
}

// Default value functions for serde
fn default_primary_key() -> String {
    "id".to_string()
}

fn default_max_connections() -> usize {
    10
}

fn default_connect_timeout_secs() -> u64 {
    30
}
