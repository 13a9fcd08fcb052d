use std::time::Duration;

use deadpool_sqlite::rusqlite;

use crate::error::SessionError;
use crate::results::ResultSet;
use crate::session::Session;
use crate::sqlite::to_sqlite_value;
use crate::types::SqlValue;

// Generous ceiling for a bulk load; restored to the driver default after.
const BULK_LOAD_TIMEOUT: Duration = Duration::from_secs(3600);

impl Session {
    /// Fetch the next value of an integer sequence.
    ///
    /// The query is expected to return a single row whose value is aliased
    /// `sequence`, e.g.
    /// `SELECT seq + 1 AS sequence FROM sqlite_sequence WHERE name = 'orders'`.
    /// Blank SQL, zero rows, and a NULL value all yield `Ok(None)`; failures
    /// are `Err`, so "no value" and "query failed" stay distinguishable.
    ///
    /// # Errors
    ///
    /// Execution failures, a missing `sequence` column, or a non-integer
    /// value in it.
    pub async fn next_sequence(&mut self, sql: &str) -> Result<Option<i64>, SessionError> {
        if sql.trim().is_empty() {
            return Ok(None);
        }

        let rs = self.read(sql).await?;
        let Some(row) = rs.rows().first() else {
            return Ok(None);
        };

        match row.get("sequence") {
            Some(SqlValue::Int(i)) => Ok(Some(*i)),
            Some(SqlValue::Null) => Ok(None),
            Some(SqlValue::Text(s)) => s.trim().parse::<i64>().map(Some).map_err(|e| {
                SessionError::ExecutionError(format!(
                    "sequence value {s:?} is not an integer: {e}"
                ))
            }),
            Some(other) => Err(SessionError::ExecutionError(format!(
                "sequence value has unexpected type: {other:?}"
            ))),
            None => Err(SessionError::ExecutionError(
                "query returned no column aliased \"sequence\"".to_string(),
            )),
        }
    }

    /// The database server's current timestamp, as text.
    ///
    /// # Errors
    ///
    /// Execution failures; zero rows yield `Ok(None)`.
    pub async fn current_server_time(&mut self) -> Result<Option<String>, SessionError> {
        let rs = self.read("SELECT CURRENT_TIMESTAMP AS server_time").await?;
        Ok(rs
            .rows()
            .first()
            .and_then(|row| row.get("server_time"))
            .and_then(SqlValue::as_text)
            .map(str::to_owned))
    }

    /// Stream a materialized result set into `destination` in a single
    /// transaction, one prepared insert reused per row.
    ///
    /// Unlike the execution operations, this requires a connection to
    /// already be checked out and will not acquire one.
    ///
    /// # Errors
    ///
    /// `SessionError::ConnectionError` if no connection is held,
    /// `SessionError::ExecutionError` if a transaction is open,
    /// `SessionError::ParameterError` if the source has no columns, and
    /// driver errors from the load itself (the transaction rolls back on
    /// drop).
    pub async fn bulk_load(
        &mut self,
        rows: &ResultSet,
        destination: &str,
    ) -> Result<usize, SessionError> {
        if !self.is_connected() {
            return Err(SessionError::ConnectionError(
                "bulk load requires an already-open connection".to_string(),
            ));
        }
        if self.in_transaction() {
            return Err(SessionError::ExecutionError(
                "bulk load not permitted while a transaction is open".to_string(),
            ));
        }

        let Some(column_names) = rows.column_names().filter(|c| !c.is_empty()) else {
            return Err(SessionError::ParameterError(
                "source result set has no columns".to_string(),
            ));
        };

        let columns = column_names
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; column_names.len()].join(", ");
        let insert_sql = format!(
            "INSERT INTO {} ({columns}) VALUES ({placeholders})",
            quote_identifier(destination)
        );

        let data: Vec<Vec<rusqlite::types::Value>> = rows
            .rows()
            .iter()
            .map(|row| row.values.iter().map(to_sqlite_value).collect())
            .collect();

        self.run(move |conn| {
            conn.busy_timeout(BULK_LOAD_TIMEOUT)?;
            let result = (|| {
                let tx = conn.transaction()?;
                let mut loaded = 0;
                {
                    let mut stmt = tx.prepare(&insert_sql)?;
                    for row in &data {
                        let refs: Vec<&dyn rusqlite::ToSql> =
                            row.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
                        loaded += stmt.execute(&refs[..])?;
                    }
                }
                tx.commit()?;
                Ok::<usize, SessionError>(loaded)
            })();
            conn.busy_timeout(Duration::ZERO)?;
            result
        })
        .await
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
