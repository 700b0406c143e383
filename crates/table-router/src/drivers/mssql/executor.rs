//! SQL Server executor.
//!
//! Uses Tiberius with bb8 connection pooling. Generated keys come back
//! through the `OUTPUT INSERTED.` clause the dialect adds to inserts.

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use rust_decimal::Decimal;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, Row, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

use super::dialect::MssqlDialect;
use crate::config::DatabaseConfig;
use crate::core::traits::{Dialect, Executor};
use crate::core::value::{SqlNullType, SqlValue};
use crate::drivers::common::violation;
use crate::error::{Result, RouterError};
use crate::statement::Statement;

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    config: DatabaseConfig,
}

impl TiberiusConnectionManager {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port());
        config.database(&self.config.database);
        config.authentication(AuthMethod::sql_server(
            &self.config.user,
            &self.config.password,
        ));

        if self.config.ssl_mode.requires_tls() {
            if !self.config.ssl_mode.verifies_certificate() {
                config.trust_cert();
            }
            config.encryption(EncryptionLevel::Required);
        } else {
            warn!("SQL Server encryption is disabled. Credentials will be transmitted in plaintext.");
            config.encryption(EncryptionLevel::NotSupported);
        }

        config
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;

        tcp.set_nodelay(true).ok();

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// SQL Server executor backed by a bb8 pool.
pub struct MssqlExecutor {
    pool: Pool<TiberiusConnectionManager>,
    dialect: MssqlDialect,
}

impl MssqlExecutor {
    /// Connect a pool from configuration and test one connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let manager = TiberiusConnectionManager::new(config.clone());
        let pool = Pool::builder()
            .max_size(config.max_connections as u32)
            .connection_timeout(config.connect_timeout())
            .build(manager)
            .await
            .map_err(|e| RouterError::pool(e, "creating SQL Server pool"))?;

        let executor = Self {
            pool,
            dialect: MssqlDialect::new(),
        };
        executor
            .conn()
            .await?
            .simple_query("SELECT 1")
            .await?
            .into_row()
            .await?;

        info!(
            "Connected to SQL Server: {}:{}/{}",
            config.host,
            config.port(),
            config.database
        );
        Ok(executor)
    }

    async fn conn(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| RouterError::pool(e, "getting SQL Server connection"))
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        let mut conn = self.conn().await?;
        let params = to_params(&statement.params);
        let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        debug!("SQL Server {}: {}", statement.operation.verb(), statement.sql);
        let result = conn
            .execute(statement.sql.as_str(), &refs)
            .await
            .map_err(|e| violation::mssql(&statement.table, e))?;
        Ok(result.total())
    }

    async fn query_first(&self, statement: &Statement) -> Result<Option<Row>> {
        let mut conn = self.conn().await?;
        let params = to_params(&statement.params);
        let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        debug!("SQL Server {}: {}", statement.operation.verb(), statement.sql);
        let stream = conn
            .query(statement.sql.as_str(), &refs)
            .await
            .map_err(|e| violation::mssql(&statement.table, e))?;
        stream
            .into_row()
            .await
            .map_err(|e| violation::mssql(&statement.table, e))
    }
}

#[async_trait]
impl Executor for MssqlExecutor {
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
        Ok(self.query_first(statement).await?.and_then(first_column))
    }

    async fn update(&self, statement: &Statement) -> Result<u64> {
        self.execute(statement).await
    }

    async fn delete(&self, statement: &Statement) -> Result<u64> {
        self.execute(statement).await
    }

    async fn next_sequence_value(&self, sequence: &str) -> Result<SqlValue> {
        let (sql, _) = self
            .dialect
            .next_sequence_query(sequence)?
            .ok_or_else(|| RouterError::Unsupported {
                dialect: "mssql".to_string(),
                feature: "sequences",
            })?;
        let mut conn = self.conn().await?;
        let row = conn.simple_query(sql).await?.into_row().await?;
        row.and_then(first_column)
            .ok_or_else(|| RouterError::Unsupported {
                dialect: "mssql".to_string(),
                feature: "non-numeric sequence values",
            })
    }
}

fn to_params(values: &[SqlValue]) -> Vec<Box<dyn ToSql>> {
    values.iter().map(to_param).collect()
}

fn to_param(value: &SqlValue) -> Box<dyn ToSql> {
    match value {
        SqlValue::Null(ty) => null_param(*ty),
        SqlValue::Bool(b) => Box::new(*b),
        SqlValue::I16(i) => Box::new(*i),
        SqlValue::I32(i) => Box::new(*i),
        SqlValue::I64(i) => Box::new(*i),
        SqlValue::F32(f) => Box::new(*f),
        SqlValue::F64(f) => Box::new(*f),
        SqlValue::Text(s) => Box::new(s.clone()),
        SqlValue::Bytes(b) => Box::new(b.clone()),
        SqlValue::Uuid(u) => Box::new(*u),
        SqlValue::Decimal(d) => Box::new(*d),
        SqlValue::DateTime(dt) => Box::new(*dt),
        SqlValue::DateTimeOffset(dto) => Box::new(*dto),
        SqlValue::Date(d) => Box::new(*d),
        SqlValue::Time(t) => Box::new(*t),
    }
}

fn null_param(ty: SqlNullType) -> Box<dyn ToSql> {
    match ty {
        SqlNullType::Bool => Box::new(Option::<bool>::None),
        SqlNullType::I16 => Box::new(Option::<i16>::None),
        SqlNullType::I32 => Box::new(Option::<i32>::None),
        SqlNullType::I64 => Box::new(Option::<i64>::None),
        SqlNullType::F32 => Box::new(Option::<f32>::None),
        SqlNullType::F64 => Box::new(Option::<f64>::None),
        SqlNullType::String => Box::new(Option::<String>::None),
        SqlNullType::Bytes => Box::new(Option::<Vec<u8>>::None),
        SqlNullType::Uuid => Box::new(Option::<uuid::Uuid>::None),
        SqlNullType::Decimal => Box::new(Option::<Decimal>::None),
        SqlNullType::DateTime => Box::new(Option::<chrono::NaiveDateTime>::None),
        SqlNullType::DateTimeOffset => {
            Box::new(Option::<chrono::DateTime<chrono::FixedOffset>>::None)
        }
        SqlNullType::Date => Box::new(Option::<chrono::NaiveDate>::None),
        SqlNullType::Time => Box::new(Option::<chrono::NaiveTime>::None),
    }
}

/// First column of an OUTPUT/SELECT row as a key value.
///
/// Keys are integers, GUIDs, decimals or strings; anything else yields `None`.
fn first_column(row: Row) -> Option<SqlValue> {
    let value = match row.into_iter().next()? {
        ColumnData::U8(v) => v.map(|v| SqlValue::I16(i16::from(v))),
        ColumnData::I16(v) => v.map(SqlValue::I16),
        ColumnData::I32(v) => v.map(SqlValue::I32),
        ColumnData::I64(v) => v.map(SqlValue::I64),
        ColumnData::Guid(v) => v.map(SqlValue::Uuid),
        ColumnData::Numeric(v) => {
            v.map(|n| SqlValue::Decimal(Decimal::from_i128_with_scale(n.value(), n.scale() as u32)))
        }
        ColumnData::String(v) => v.map(|s| SqlValue::Text(s.into_owned())),
        _ => return None,
    };
    Some(value.unwrap_or(SqlValue::Null(SqlNullType::I64)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseKind;

    #[test]
    fn test_build_config_uses_dialect_default_port() {
        let config = DatabaseConfig::new(DatabaseKind::Mssql, "db.internal", "orders", "sa");
        let manager = TiberiusConnectionManager::new(config);
        assert_eq!(manager.build_config().get_addr(), "db.internal:1433");
    }

    #[test]
    fn test_to_param_null_is_typed() {
        let param = to_param(&SqlValue::Null(SqlNullType::I32));
        assert!(matches!(param.to_sql(), ColumnData::I32(None)));

        let param = to_param(&SqlValue::from("a"));
        assert!(matches!(param.to_sql(), ColumnData::String(Some(_))));
    }
}
