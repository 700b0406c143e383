//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::core::traits::Executor;
use crate::error::{Result, RouterError};
use crate::persist::Persister;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Look up a route by name.
    pub fn route(&self, name: &str) -> Result<&RouteConfig> {
        self.routes
            .get(name)
            .ok_or_else(|| RouterError::Config(format!("Unknown route '{}'", name)))
    }

    /// Persister for the named route over `executor`.
    pub fn persister(&self, name: &str, executor: Arc<dyn Executor>) -> Result<Persister> {
        let route = self.route(name)?;
        let resolver = route.resolver(self.database.schema.as_deref());
        debug!("Route {} -> {:?}", name, resolver);
        Ok(Persister::new(executor, resolver)
            .with_primary_key(route.primary_key.clone())
            .with_key_strategy(route.key_strategy()))
    }

    /// Connect an executor for the configured database.
    pub async fn connect(&self) -> Result<Arc<dyn Executor>> {
        crate::drivers::connect(&self.database).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{KeyStrategy, TableRef};
    use crate::drivers::common::SslMode;
    use crate::drivers::MemoryExecutor;
    use std::io::Write;

    const YAML: &str = r#"
database:
  type: postgresql
  host: db.internal
  database: app
  user: app
  password: hunter2
  schema: public
  ssl_mode: verify-full
routes:
  users:
    table: users
    sequence: public.users_id_seq
  events:
    table: analytics.events
    primary_key: event_id
    shard:
      column: tenant_id
      count: 8
  metrics:
    table: metrics
    partition:
      column: recorded_at
"#;

    #[test]
    fn test_from_yaml() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.database.r#type, DatabaseKind::Postgres);
        assert_eq!(config.database.port(), 5432);
        assert_eq!(config.database.ssl_mode, SslMode::VerifyFull);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.routes.len(), 3);

        let users = config.route("users").unwrap();
        assert_eq!(
            users.key_strategy(),
            KeyStrategy::Sequence("public.users_id_seq".to_string())
        );
        assert_eq!(users.primary_key, "id");
    }

    #[test]
    fn test_route_resolvers() {
        let config = Config::from_yaml(YAML).unwrap();
        let schema = config.database.schema.as_deref();

        let users = config.route("users").unwrap().resolver(schema);
        assert_eq!(users.static_table(), &TableRef::qualified("public", "users"));

        // schema in the table name beats the database default
        let events = config.route("events").unwrap().resolver(schema);
        assert_eq!(
            events.static_table(),
            &TableRef::qualified("analytics", "events")
        );

        assert!(config.route("missing").is_err());
    }

    #[test]
    fn test_password_not_serialized() {
        let config = Config::from_yaml(YAML).unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("hunter2"));
        assert!(yaml.contains("db.internal"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.database.host, "db.internal");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, RouterError::Io(_)));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = Config::from_yaml("database: [").unwrap_err();
        assert!(matches!(err, RouterError::Yaml(_)));
    }

    #[test]
    fn test_unknown_database_type() {
        let yaml = "database:\n  type: oracle\n  host: h\n  database: d\n  user: u\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_mssql_defaults() {
        let yaml = "database:\n  type: sqlserver\n  host: h\n  database: d\n  user: sa\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.database.r#type, DatabaseKind::Mssql);
        assert_eq!(config.database.port(), 1433);
        assert_eq!(config.database.ssl_mode, SslMode::Require);
        assert!(config.routes.is_empty());
    }

    #[tokio::test]
    async fn test_persister_for_route() {
        let config = Config::from_yaml(YAML).unwrap();
        let executor = Arc::new(MemoryExecutor::new());
        let persister = config.persister("events", executor.clone()).unwrap();
        assert_eq!(persister.primary_key(), Some("event_id"));

        let mut record = persister.record().with("tenant_id", 10i64);
        let id = persister.create(&mut record).await.unwrap();
        assert_eq!(id, Some(crate::SqlValue::I64(1)));
        assert_eq!(
            executor.tables().await,
            vec![TableRef::qualified("analytics", "events_2")]
        );

        assert!(config.persister("missing", executor).is_err());
    }
}
