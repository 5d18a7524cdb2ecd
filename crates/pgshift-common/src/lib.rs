//! pgshift common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared foundations for the pgshift workspace:
//!
//! - **Error Handling**: the `PgShiftError` enum and `Result` alias used by
//!   every pipeline component
//! - **Logging**: tracing subscriber configuration for the binaries
//! - **Credentials**: `CREDENTIALS` clause strings for warehouse COPY and
//!   UNLOAD statements

pub mod credentials;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use credentials::RedshiftCredentials;
pub use error::{PgShiftError, Result};
