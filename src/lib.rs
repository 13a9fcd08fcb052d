//! Async SQL session over a pooled `SQLite` connection.
//!
//! A [`Session`] checks its connection out of a process-wide, per-connection-
//! string pool (via [`ConnectionProvider`]), executes raw or named-parameter
//! SQL, and brackets writes in an explicit transaction when asked:
//!
//! ```rust,no_run
//! use sql_session::{ConnectionProvider, Profiles, Session, SqlValue};
//!
//! # async fn demo() -> Result<(), sql_session::SessionError> {
//! let profiles = Profiles::new("dev")
//!     .with_entry("dev", "app_dev.db")
//!     .with_entry("production", "app.db");
//! let mut session = Session::connect(ConnectionProvider::new(profiles), "dev").await?;
//!
//! session.begin_transaction().await?;
//! session
//!     .write_with(
//!         "INSERT INTO users (id, name) VALUES (:ID, :NAME)",
//!         &[("ID", SqlValue::Int(7)), ("NAME", SqlValue::Text("alice".into()))],
//!     )
//!     .await?;
//! session.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Every operation returns a `Result`; an empty result set, zero rows
//! affected, and a failed execution are three different things. For values
//! that genuinely cannot be parameterized there is a best-effort literal
//! sanitizer in [`sanitize`], documented with its limits.

pub mod error;
pub mod provider;
pub mod results;
pub mod sanitize;
pub mod session;
pub mod types;

mod convenience;
mod sqlite;

pub use error::SessionError;
pub use provider::{ConnectionProvider, Profiles};
pub use results::{ResultSet, Row};
pub use sanitize::{SanitizeLevel, safe_sql_literal};
pub use session::{Session, TxOutcome};
pub use types::SqlValue;
