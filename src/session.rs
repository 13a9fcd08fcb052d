use deadpool_sqlite::{Object, rusqlite};
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::provider::ConnectionProvider;
use crate::results::ResultSet;
use crate::sqlite::{bind_named, build_result_set, to_sqlite_value};
use crate::types::SqlValue;

/// Outcome of [`Session::commit`] or [`Session::rollback`].
///
/// Committing or rolling back with nothing pending is a non-fatal no-op, not
/// a failure; `NoTransaction` is how that surfaces to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// An open transaction was committed.
    Committed,
    /// An open transaction was rolled back.
    RolledBack,
    /// There was no open transaction; nothing was applied.
    NoTransaction,
}

impl TxOutcome {
    #[must_use]
    pub fn is_no_transaction(&self) -> bool {
        matches!(self, Self::NoTransaction)
    }
}

/// A checked-out pooled connection plus its transaction flag.
struct SessionConnection {
    conn: Object,
    in_transaction: bool,
}

/// A data-access session over one pooled database connection.
///
/// The session acquires its connection lazily from a [`ConnectionProvider`],
/// holds at most one open transaction, and keeps the connection checked out
/// across calls until [`Session::close`] or drop. A session is single-caller
/// state: methods take `&mut self` and the type is not meant to be shared
/// between tasks. The provider and its pool registry are the shared,
/// synchronized layer.
///
/// Statements run while a transaction is open bind to that transaction
/// (same connection, no implicit commit); statements outside one auto-commit
/// per the driver's default.
pub struct Session {
    provider: ConnectionProvider,
    env: String,
    conn: Option<SessionConnection>,
}

impl Session {
    /// Create a session that will connect on first use.
    #[must_use]
    pub fn new(provider: ConnectionProvider, env: impl Into<String>) -> Self {
        Self {
            provider,
            env: env.into(),
            conn: None,
        }
    }

    /// Create a session and connect eagerly.
    ///
    /// # Errors
    ///
    /// Returns the provider's acquisition error if no connection can be
    /// checked out.
    pub async fn connect(
        provider: ConnectionProvider,
        env: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(provider, env);
        session.ensure_connection().await?;
        Ok(session)
    }

    /// The environment this session acquires connections against.
    #[must_use]
    pub fn env(&self) -> &str {
        &self.env
    }

    /// Whether a connection is currently checked out.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Whether a transaction is currently open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(|sc| sc.in_transaction)
    }

    /// Check a connection out of the pool if none is held.
    ///
    /// Every execution operation calls this first; if acquisition fails the
    /// operation aborts before any SQL is attempted.
    async fn ensure_connection(&mut self) -> Result<(), SessionError> {
        if self.conn.is_none() {
            let conn = self.provider.acquire(&self.env).await?;
            self.conn = Some(SessionConnection {
                conn,
                in_transaction: false,
            });
        }
        Ok(())
    }

    fn connection(&self) -> Result<&SessionConnection, SessionError> {
        self.conn
            .as_ref()
            .ok_or_else(|| SessionError::ConnectionError("no open connection".to_string()))
    }

    fn connection_mut(&mut self) -> Result<&mut SessionConnection, SessionError> {
        self.conn
            .as_mut()
            .ok_or_else(|| SessionError::ConnectionError("no open connection".to_string()))
    }

    /// Run synchronous driver work on the held connection.
    pub(crate) async fn run<F, R>(&self, func: F) -> Result<R, SessionError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, SessionError> + Send + 'static,
        R: Send + 'static,
    {
        let sc = self.connection()?;
        sc.conn.interact(func).await?
    }

    /// Execute a query and materialize the full result set.
    ///
    /// # Errors
    ///
    /// Connection acquisition and execution failures are returned as-is; an
    /// empty result set is a successful read, never an error.
    pub async fn read(&mut self, sql: &str) -> Result<ResultSet, SessionError> {
        self.ensure_connection().await?;
        let sql_owned = sql.to_owned();
        self.run(move |conn| {
            let mut stmt = conn.prepare(&sql_owned)?;
            build_result_set(&mut stmt)
        })
        .await
    }

    /// Execute a statement and return the number of rows affected.
    ///
    /// Zero rows affected is a successful write; failures are `Err`, so the
    /// two cannot be confused.
    ///
    /// # Errors
    ///
    /// Connection acquisition and execution failures are returned as-is.
    pub async fn write(&mut self, sql: &str) -> Result<usize, SessionError> {
        self.ensure_connection().await?;
        let sql_owned = sql.to_owned();
        self.run(move |conn| {
            let affected = conn.execute(&sql_owned, [])?;
            Ok(affected)
        })
        .await
    }

    /// Execute a query with named bindings and materialize the result set.
    ///
    /// Placeholders are bound strictly by name; names may be given with or
    /// without the leading `:`.
    ///
    /// ```rust,no_run
    /// # use sql_session::{Session, SqlValue};
    /// # async fn demo(session: &mut Session) -> Result<(), sql_session::SessionError> {
    /// let rs = session
    ///     .read_with(
    ///         "SELECT * FROM users WHERE id = :ID",
    ///         &[("ID", SqlValue::Int(7))],
    ///     )
    ///     .await?;
    /// # let _ = rs; Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// `SessionError::ParameterError` if a supplied name matches no
    /// placeholder or a placeholder receives no value; otherwise as
    /// [`Session::read`].
    pub async fn read_with(
        &mut self,
        sql: &str,
        params: &[(&str, SqlValue)],
    ) -> Result<ResultSet, SessionError> {
        self.ensure_connection().await?;
        let sql_owned = sql.to_owned();
        let bindings = convert_bindings(params);
        self.run(move |conn| {
            let mut stmt = conn.prepare(&sql_owned)?;
            bind_named(&mut stmt, &bindings)?;
            build_result_set(&mut stmt)
        })
        .await
    }

    /// Execute a statement with named bindings and return rows affected.
    ///
    /// # Errors
    ///
    /// As [`Session::read_with`] for binding failures, [`Session::write`]
    /// otherwise.
    pub async fn write_with(
        &mut self,
        sql: &str,
        params: &[(&str, SqlValue)],
    ) -> Result<usize, SessionError> {
        self.ensure_connection().await?;
        let sql_owned = sql.to_owned();
        let bindings = convert_bindings(params);
        self.run(move |conn| {
            let mut stmt = conn.prepare(&sql_owned)?;
            bind_named(&mut stmt, &bindings)?;
            let affected = stmt.raw_execute()?;
            Ok(affected)
        })
        .await
    }

    /// Begin a transaction on the current connection.
    ///
    /// Requires an already-open connection; this call does not acquire one.
    ///
    /// # Errors
    ///
    /// `SessionError::ConnectionError` if no connection is held,
    /// `SessionError::ExecutionError` if a transaction is already open, and
    /// driver errors from `BEGIN` itself.
    pub async fn begin_transaction(&mut self) -> Result<(), SessionError> {
        let sc = self.connection_mut()?;
        if sc.in_transaction {
            return Err(SessionError::ExecutionError(
                "transaction already in progress".to_string(),
            ));
        }
        sc.conn
            .interact(|conn| conn.execute_batch("BEGIN").map_err(SessionError::from))
            .await??;
        sc.in_transaction = true;
        Ok(())
    }

    /// Commit the open transaction, if any.
    ///
    /// With no transaction open this is a successful no-op reported as
    /// [`TxOutcome::NoTransaction`].
    ///
    /// # Errors
    ///
    /// Driver errors from `COMMIT`; the transaction flag is cleared only on
    /// success.
    pub async fn commit(&mut self) -> Result<TxOutcome, SessionError> {
        match self.conn.as_mut() {
            Some(sc) if sc.in_transaction => {
                sc.conn
                    .interact(|conn| conn.execute_batch("COMMIT").map_err(SessionError::from))
                    .await??;
                sc.in_transaction = false;
                Ok(TxOutcome::Committed)
            }
            _ => {
                warn!("commit requested with no transaction found");
                Ok(TxOutcome::NoTransaction)
            }
        }
    }

    /// Roll back the open transaction, if any.
    ///
    /// With no transaction open this is a successful no-op reported as
    /// [`TxOutcome::NoTransaction`].
    ///
    /// # Errors
    ///
    /// Driver errors from `ROLLBACK`; the transaction flag is cleared only
    /// on success.
    pub async fn rollback(&mut self) -> Result<TxOutcome, SessionError> {
        match self.conn.as_mut() {
            Some(sc) if sc.in_transaction => {
                sc.conn
                    .interact(|conn| conn.execute_batch("ROLLBACK").map_err(SessionError::from))
                    .await??;
                sc.in_transaction = false;
                Ok(TxOutcome::RolledBack)
            }
            _ => {
                warn!("rollback requested with no transaction found");
                Ok(TxOutcome::NoTransaction)
            }
        }
    }

    /// Release the connection back to the pool, rolling back any open
    /// transaction first.
    ///
    /// # Errors
    ///
    /// Driver errors from the rollback; the connection is released either
    /// way.
    pub async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(sc) = self.conn.take() {
            if sc.in_transaction {
                let rolled_back = sc
                    .conn
                    .interact(|conn| conn.execute_batch("ROLLBACK").map_err(SessionError::from))
                    .await
                    .map_err(SessionError::from)
                    .and_then(|res| res);
                if let Err(e) = rolled_back {
                    // Rollback failed; keep the connection out of the pool.
                    drop(deadpool::managed::Object::take(sc.conn));
                    return Err(e);
                }
            }
            debug!("returned connection to pool");
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(sc) = self.conn.take() {
            if sc.in_transaction {
                // Never hand a connection with an open transaction back to
                // the pool; detach it so the driver rolls back on close.
                drop(deadpool::managed::Object::take(sc.conn));
            }
        }
    }
}

fn convert_bindings(
    params: &[(&str, SqlValue)],
) -> Vec<(String, rusqlite::types::Value)> {
    params
        .iter()
        .map(|(name, value)| ((*name).to_string(), to_sqlite_value(value)))
        .collect()
}
