//! Error types for the table router.

use thiserror::Error;

/// Boxed driver error kept as the source of a classified failure.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for routing and persistence operations.
#[derive(Error, Debug)]
pub enum RouterError {
    /// Update or delete attempted without a row-identifying constraint.
    ///
    /// Raised before any SQL reaches the database so a missing constraint can
    /// never turn into a full-table write.
    #[error("Refusing to {operation} {table} without constraints")]
    EmptyConstraint {
        operation: &'static str,
        table: String,
    },

    /// Update attempted with no column assignments.
    #[error("Nothing to update in {table}: no column values given")]
    NothingToUpdate { table: String },

    /// Record-level update or delete on a record without a primary key value.
    #[error("Record for {table} has no primary key value")]
    MissingPrimaryKey { table: String },

    /// Record routed on its key column before the key exists.
    ///
    /// A database-generated key is only known after the insert, so the
    /// insert and later writes would land in different tables.
    #[error("Cannot route {table} on key column {column} before the key is assigned")]
    UnassignedRoutingKey { table: String, column: String },

    /// Identifier failed validation (empty, null byte, too long).
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Uniqueness, foreign key, not-null or check failure reported by the database.
    #[error("Constraint violation on {table}: {message}")]
    ConstraintViolation {
        table: String,
        message: String,
        #[source]
        source: DriverError,
    },

    /// PostgreSQL connection or query error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// SQL Server connection or query error
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// MySQL connection or query error
    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Dialect does not support the requested feature
    #[error("{dialect} does not support {feature}")]
    Unsupported {
        dialect: String,
        feature: &'static str,
    },

    /// Executor handed a statement of the wrong kind
    #[error("Unexpected statement: {0}")]
    UnexpectedStatement(String),

    /// Database returned a result the executor cannot read
    #[error("Unexpected result: {0}")]
    UnexpectedResult(String),

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RouterError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        RouterError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create an EmptyConstraint error
    pub fn empty_constraint(operation: &'static str, table: impl ToString) -> Self {
        RouterError::EmptyConstraint {
            operation,
            table: table.to_string(),
        }
    }

    /// Wrap a driver error as a constraint violation.
    pub fn constraint_violation(
        table: impl ToString,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RouterError::ConstraintViolation {
            table: table.to_string(),
            message: source.to_string(),
            source: Box::new(source),
        }
    }

    /// Whether this error is a database-level constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, RouterError::ConstraintViolation { .. })
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
