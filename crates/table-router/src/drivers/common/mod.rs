//! Utilities shared across database drivers.
//!
//! - [`tls`]: `ssl_mode` handling for all three drivers
//! - [`violation`]: Classification of driver errors into constraint violations

pub mod tls;
pub mod violation;

pub use tls::SslMode;
