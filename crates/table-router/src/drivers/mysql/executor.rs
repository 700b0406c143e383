//! MySQL/MariaDB executor.
//!
//! MySQL has no `RETURNING`, so a generated key is read from the
//! connection's `LAST_INSERT_ID()` right after the insert, on the same
//! connection.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, SslOpts, Value};
use tracing::{debug, info, warn};

use super::dialect::MysqlDialect;
use crate::config::DatabaseConfig;
use crate::core::traits::{Dialect, Executor};
use crate::core::value::SqlValue;
use crate::drivers::common::{violation, SslMode};
use crate::error::{Result, RouterError};
use crate::statement::Statement;

/// MySQL executor backed by a mysql_async pool.
pub struct MysqlExecutor {
    pool: Pool,
    dialect: MysqlDialect,
}

impl MysqlExecutor {
    /// Connect a pool from configuration and test one connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let executor = Self::from_pool(Pool::new(opts(config)?));
        executor
            .conn()
            .await?
            .query_drop("SELECT 1")
            .await
            .map_err(|e| RouterError::pool(e, "testing MySQL connection"))?;

        info!(
            "Connected to MySQL: {}:{}/{}",
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
            dialect: MysqlDialect::new(),
        }
    }

    /// Get a clone of the underlying connection pool.
    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }

    async fn conn(&self) -> Result<Conn> {
        self.pool
            .get_conn()
            .await
            .map_err(|e| RouterError::pool(e, "getting MySQL connection"))
    }

    /// Execute on a fresh connection and hand it back for result metadata.
    async fn execute(&self, statement: &Statement) -> Result<Conn> {
        let mut conn = self.conn().await?;
        let params: Vec<Value> = statement.params.iter().map(to_mysql).collect();
        debug!("MySQL {}: {}", statement.operation.verb(), statement.sql);
        conn.exec_drop(statement.sql.as_str(), params)
            .await
            .map_err(|e| violation::mysql(&statement.table, e))?;
        Ok(conn)
    }
}

#[async_trait]
impl Executor for MysqlExecutor {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn insert(
        &self,
        statement: &Statement,
        primary_key: Option<&str>,
    ) -> Result<Option<SqlValue>> {
        let conn = self.execute(statement).await?;
        if primary_key.is_none() {
            return Ok(None);
        }
        // LAST_INSERT_ID() is 0 when the table has no AUTO_INCREMENT column
        Ok(conn
            .last_insert_id()
            .filter(|id| *id != 0)
            .and_then(|id| i64::try_from(id).ok())
            .map(SqlValue::I64))
    }

    async fn update(&self, statement: &Statement) -> Result<u64> {
        Ok(self.execute(statement).await?.affected_rows())
    }

    async fn delete(&self, statement: &Statement) -> Result<u64> {
        Ok(self.execute(statement).await?.affected_rows())
    }

    async fn next_sequence_value(&self, _sequence: &str) -> Result<SqlValue> {
        Err(RouterError::Unsupported {
            dialect: "mysql".to_string(),
            feature: "sequences",
        })
    }
}

/// Pool options for `config`.
///
/// `client_found_rows` makes UPDATE report matched rows rather than changed
/// rows, like PostgreSQL and SQL Server do.
fn opts(config: &DatabaseConfig) -> Result<Opts> {
    let ssl_opts = match config.ssl_mode {
        SslMode::Disable => {
            warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
            None
        }
        SslMode::Require => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
        SslMode::VerifyCa => Some(SslOpts::default().with_danger_skip_domain_validation(true)),
        SslMode::VerifyFull => Some(SslOpts::default()),
    };

    let mut builder = OptsBuilder::default()
        .ip_or_hostname(&config.host)
        .tcp_port(config.port())
        .db_name(Some(&config.database))
        .user(Some(&config.user))
        .pass(Some(&config.password))
        .client_found_rows(true)
        // Use utf8mb4 for full Unicode support
        .init(vec!["SET NAMES utf8mb4"]);

    if let Some(ssl) = ssl_opts {
        builder = builder.ssl_opts(ssl);
    }

    let constraints = PoolConstraints::new(1, config.max_connections).ok_or_else(|| {
        RouterError::Config(format!(
            "max_connections must be at least 1, got {}",
            config.max_connections
        ))
    })?;
    Ok(builder
        .pool_opts(PoolOpts::new().with_constraints(constraints))
        .into())
}

/// Convert SqlValue to mysql_async::Value.
fn to_mysql(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null(_) => Value::NULL,
        SqlValue::Bool(b) => Value::from(*b),
        SqlValue::I16(i) => Value::from(*i),
        SqlValue::I32(i) => Value::from(*i),
        SqlValue::I64(i) => Value::from(*i),
        SqlValue::F32(f) => Value::from(*f),
        SqlValue::F64(f) => Value::from(*f),
        SqlValue::Text(s) => Value::from(s.as_str()),
        SqlValue::Bytes(b) => Value::from(b.as_slice()),
        SqlValue::Uuid(u) => Value::from(u.to_string()),
        SqlValue::Decimal(d) => Value::from(d.to_string()),
        SqlValue::DateTime(dt) => datetime_value(dt),
        SqlValue::DateTimeOffset(dto) => datetime_value(&dto.naive_utc()),
        SqlValue::Date(d) => date_value(d),
        SqlValue::Time(t) => time_value(t),
    }
}

fn datetime_value(dt: &NaiveDateTime) -> Value {
    Value::Date(
        dt.year() as u16,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
        dt.nanosecond() / 1_000,
    )
}

fn date_value(d: &NaiveDate) -> Value {
    Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0)
}

fn time_value(t: &NaiveTime) -> Value {
    Value::Time(
        false,
        0,
        t.hour() as u8,
        t.minute() as u8,
        t.second() as u8,
        t.nanosecond() / 1_000,
    )
}
