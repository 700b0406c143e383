//! Configuration validation.

use super::Config;
use crate::core::identifier::validate_identifier;
use crate::core::record::KeyStrategy;
use crate::error::{Result, RouterError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    let db = &config.database;
    if db.host.is_empty() {
        return Err(RouterError::Config("database.host is required".into()));
    }
    if db.database.is_empty() {
        return Err(RouterError::Config("database.database is required".into()));
    }
    if db.user.is_empty() {
        return Err(RouterError::Config("database.user is required".into()));
    }
    if db.max_connections == 0 {
        return Err(RouterError::Config(
            "database.max_connections must be at least 1".into(),
        ));
    }
    if let Some(schema) = &db.schema {
        validate_identifier(schema)?;
    }

    for (name, route) in &config.routes {
        let table = route.table_ref(db.schema.as_deref());
        validate_identifier(&table.name)
            .map_err(|e| RouterError::Config(format!("routes.{}.table: {}", name, e)))?;
        if let Some(schema) = &table.schema {
            validate_identifier(schema)
                .map_err(|e| RouterError::Config(format!("routes.{}.schema: {}", name, e)))?;
        }
        validate_identifier(&route.primary_key)
            .map_err(|e| RouterError::Config(format!("routes.{}.primary_key: {}", name, e)))?;

        if route.shard.is_some() && route.partition.is_some() {
            return Err(RouterError::Config(format!(
                "routes.{}: shard and partition cannot both be set",
                name
            )));
        }
        if let Some(shard) = &route.shard {
            if shard.count == 0 {
                return Err(RouterError::Config(format!(
                    "routes.{}.shard.count must be at least 1",
                    name
                )));
            }
        }
        if route.sequence.is_some() && route.manual_key {
            return Err(RouterError::Config(format!(
                "routes.{}: sequence and manual_key cannot both be set",
                name
            )));
        }
        if route.routing_column() == Some(route.primary_key.as_str())
            && route.key_strategy() == KeyStrategy::Generated
        {
            return Err(RouterError::Config(format!(
                "routes.{}: routing on primary key {} needs a sequence or manual_key",
                name, route.primary_key
            )));
        }
    }

    Ok(())
}
