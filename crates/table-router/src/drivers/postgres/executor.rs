//! PostgreSQL executor.
//!
//! Uses deadpool-postgres for connection pooling. Generated keys come back
//! through the `RETURNING` clause the dialect adds to inserts.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Config as PgConfig, Row};
use tracing::{debug, info};

use super::dialect::PostgresDialect;
use crate::config::DatabaseConfig;
use crate::core::traits::{Dialect, Executor};
use crate::core::value::{SqlNullType, SqlValue};
use crate::drivers::common::violation;
use crate::error::{Result, RouterError};
use crate::statement::Statement;

/// Boxed PostgreSQL bind parameter.
type PgParam = Box<dyn ToSql + Sync + Send>;

/// PostgreSQL executor backed by a deadpool pool.
pub struct PgExecutor {
    pool: Pool,
    dialect: PostgresDialect,
}

impl PgExecutor {
    /// Connect a pool from configuration and test one connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port());
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(config.connect_timeout());

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = match config.ssl_mode.postgres_connector()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config),
        };
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .build()
            .map_err(|e| RouterError::pool(e, "creating PostgreSQL pool"))?;

        let executor = Self::from_pool(pool);
        executor.client().await?.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host,
            config.port(),
            config.database
        );
        Ok(executor)
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: Pool) -> Self {
        Self {
            pool,
            dialect: PostgresDialect::new(),
        }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn client(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| RouterError::pool(e, "getting PostgreSQL connection"))
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        let client = self.client().await?;
        let params = to_params(&statement.params);
        let refs = param_refs(&params);
        debug!("PostgreSQL {}: {}", statement.operation.verb(), statement.sql);
        client
            .execute(statement.sql.as_str(), &refs)
            .await
            .map_err(|e| violation::postgres(&statement.table, e))
    }
}

#[async_trait]
impl Executor for PgExecutor {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn insert(
        &self,
        statement: &Statement,
        primary_key: Option<&str>,
    ) -> Result<Option<SqlValue>> {
        if primary_key.is_none() {
            self.execute(statement).await?;
            return Ok(None);
        }

        let client = self.client().await?;
        let params = to_params(&statement.params);
        let refs = param_refs(&params);
        debug!("PostgreSQL insert: {}", statement.sql);
        let row = client
            .query_opt(statement.sql.as_str(), &refs)
            .await
            .map_err(|e| violation::postgres(&statement.table, e))?;

        match row {
            Some(row) => first_column(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn update(&self, statement: &Statement) -> Result<u64> {
        self.execute(statement).await
    }

    async fn delete(&self, statement: &Statement) -> Result<u64> {
        self.execute(statement).await
    }

    async fn next_sequence_value(&self, sequence: &str) -> Result<SqlValue> {
        let (sql, values) = self
            .dialect
            .next_sequence_query(sequence)?
            .ok_or_else(|| RouterError::Unsupported {
                dialect: "postgres".to_string(),
                feature: "sequences",
            })?;
        let client = self.client().await?;
        let params = to_params(&values);
        let refs = param_refs(&params);
        let row = client.query_one(sql.as_str(), &refs).await?;
        first_column(&row)
    }
}

fn param_refs(params: &[PgParam]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

/// Convert values to native parameters matching the casts the dialect puts
/// on each placeholder.
fn to_params(values: &[SqlValue]) -> Vec<PgParam> {
    values.iter().map(to_param).collect()
}

fn to_param(value: &SqlValue) -> PgParam {
    match value {
        SqlValue::Null(ty) => null_param(*ty),
        SqlValue::Bool(v) => Box::new(*v),
        SqlValue::I16(v) => Box::new(*v),
        SqlValue::I32(v) => Box::new(*v),
        SqlValue::I64(v) => Box::new(*v),
        SqlValue::F32(v) => Box::new(*v),
        SqlValue::F64(v) => Box::new(*v),
        SqlValue::Text(v) => Box::new(v.clone()),
        SqlValue::Bytes(v) => Box::new(v.clone()),
        SqlValue::Uuid(v) => Box::new(*v),
        SqlValue::Decimal(v) => Box::new(*v),
        SqlValue::DateTime(v) => Box::new(*v),
        SqlValue::DateTimeOffset(v) => Box::new(*v),
        SqlValue::Date(v) => Box::new(*v),
        SqlValue::Time(v) => Box::new(*v),
    }
}

fn null_param(ty: SqlNullType) -> PgParam {
    match ty {
        SqlNullType::Bool => Box::new(None::<bool>),
        SqlNullType::I16 => Box::new(None::<i16>),
        SqlNullType::I32 => Box::new(None::<i32>),
        SqlNullType::I64 => Box::new(None::<i64>),
        SqlNullType::F32 => Box::new(None::<f32>),
        SqlNullType::F64 => Box::new(None::<f64>),
        SqlNullType::String => Box::new(None::<String>),
        SqlNullType::Bytes => Box::new(None::<Vec<u8>>),
        SqlNullType::Uuid => Box::new(None::<uuid::Uuid>),
        SqlNullType::Decimal => Box::new(None::<rust_decimal::Decimal>),
        SqlNullType::DateTime => Box::new(None::<chrono::NaiveDateTime>),
        SqlNullType::DateTimeOffset => Box::new(None::<chrono::DateTime<chrono::Utc>>),
        SqlNullType::Date => Box::new(None::<chrono::NaiveDate>),
        SqlNullType::Time => Box::new(None::<chrono::NaiveTime>),
    }
}

/// Read the first column of a returned row (generated key or sequence value).
fn first_column(row: &Row) -> Result<SqlValue> {
    let column = row.columns().first().ok_or_else(|| {
        RouterError::UnexpectedResult("PostgreSQL returned a row without columns".to_string())
    })?;
    let ty = column.type_().clone();

    let value = if ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(0)?
            .map_or(SqlValue::Null(SqlNullType::I16), SqlValue::I16)
    } else if ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(0)?
            .map_or(SqlValue::Null(SqlNullType::I32), SqlValue::I32)
    } else if ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(0)?
            .map_or(SqlValue::Null(SqlNullType::I64), SqlValue::I64)
    } else if ty == Type::UUID {
        row.try_get::<_, Option<uuid::Uuid>>(0)?
            .map_or(SqlValue::Null(SqlNullType::Uuid), SqlValue::Uuid)
    } else if ty == Type::NUMERIC {
        row.try_get::<_, Option<rust_decimal::Decimal>>(0)?
            .map_or(SqlValue::Null(SqlNullType::Decimal), SqlValue::Decimal)
    } else {
        row.try_get::<_, Option<String>>(0)?
            .map_or(SqlValue::Null(SqlNullType::String), SqlValue::Text)
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_param_accepts_cast_types() {
        // Each parameter must accept the type its placeholder is cast to.
        let cases = [
            (SqlValue::I16(1), Type::INT2),
            (SqlValue::I32(1), Type::INT4),
            (SqlValue::I64(1), Type::INT8),
            (SqlValue::from("a"), Type::TEXT),
            (SqlValue::Bool(true), Type::BOOL),
            (SqlValue::Bytes(vec![1]), Type::BYTEA),
            (SqlValue::Null(SqlNullType::Uuid), Type::UUID),
            (SqlValue::Null(SqlNullType::I64), Type::INT8),
        ];
        for (value, ty) in cases {
            let mut buf = bytes::BytesMut::new();
            let param = to_param(&value);
            assert!(
                param.to_sql_checked(&ty, &mut buf).is_ok(),
                "{:?} should bind as {}",
                value,
                ty
            );
        }
    }
}
