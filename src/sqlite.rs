use std::sync::Arc;

use deadpool_sqlite::rusqlite;
use rusqlite::Statement;
use rusqlite::types::ValueRef;

use crate::error::SessionError;
use crate::results::{ResultSet, Row};
use crate::types::SqlValue;

/// Convert a session value into the driver's value type.
pub(crate) fn to_sqlite_value(value: &SqlValue) -> rusqlite::types::Value {
    match value {
        SqlValue::Int(i) => rusqlite::types::Value::Integer(*i),
        SqlValue::Float(f) => rusqlite::types::Value::Real(*f),
        SqlValue::Text(s) => rusqlite::types::Value::Text(s.clone()),
        SqlValue::Bool(b) => rusqlite::types::Value::Integer(i64::from(*b)),
        SqlValue::Timestamp(dt) => {
            let formatted = dt.format("%F %T%.f").to_string();
            rusqlite::types::Value::Text(formatted)
        }
        SqlValue::Null => rusqlite::types::Value::Null,
        SqlValue::JSON(jsval) => rusqlite::types::Value::Text(jsval.to_string()),
        SqlValue::Blob(bytes) => rusqlite::types::Value::Blob(bytes.clone()),
    }
}

fn extract_value(row: &rusqlite::Row, idx: usize) -> Result<SqlValue, SessionError> {
    match row.get_ref(idx) {
        Err(e) => Err(SessionError::SqliteError(e)),
        Ok(ValueRef::Null) => Ok(SqlValue::Null),
        Ok(ValueRef::Integer(i)) => Ok(SqlValue::Int(i)),
        Ok(ValueRef::Real(f)) => Ok(SqlValue::Float(f)),
        Ok(ValueRef::Text(bytes)) => {
            let s = String::from_utf8_lossy(bytes).into_owned();
            Ok(SqlValue::Text(s))
        }
        Ok(ValueRef::Blob(b)) => Ok(SqlValue::Blob(b.to_vec())),
    }
}

/// Placeholder names may be supplied with or without the `:` prefix the
/// statement text uses.
fn normalize_placeholder(name: &str) -> String {
    if name.starts_with(':') || name.starts_with('@') || name.starts_with('$') {
        name.to_string()
    } else {
        format!(":{name}")
    }
}

/// Bind name/value pairs onto a prepared statement, strictly by name.
///
/// Every supplied name must appear in the statement and every placeholder in
/// the statement must receive a value; anything else is a
/// [`SessionError::ParameterError`].
pub(crate) fn bind_named(
    stmt: &mut Statement<'_>,
    bindings: &[(String, rusqlite::types::Value)],
) -> Result<(), SessionError> {
    let mut bound = vec![false; stmt.parameter_count()];

    for (name, value) in bindings {
        let placeholder = normalize_placeholder(name);
        let Some(idx) = stmt.parameter_index(&placeholder)? else {
            return Err(SessionError::ParameterError(format!(
                "binding {name:?} does not match any placeholder in the statement"
            )));
        };
        stmt.raw_bind_parameter(idx, value)?;
        bound[idx - 1] = true;
    }

    for (i, was_bound) in bound.iter().enumerate() {
        if !was_bound {
            let placeholder = stmt
                .parameter_name(i + 1)
                .unwrap_or("?")
                .to_string();
            return Err(SessionError::ParameterError(format!(
                "no value supplied for placeholder {placeholder}"
            )));
        }
    }

    Ok(())
}

/// Run a prepared (and already bound) statement and materialize every row.
pub(crate) fn build_result_set(stmt: &mut Statement<'_>) -> Result<ResultSet, SessionError> {
    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    // Store column names once, shared by every row
    let column_names_rc = Arc::new(column_names);

    let mut result_set = ResultSet::default();
    result_set.set_column_names(Arc::clone(&column_names_rc));

    let mut rows_iter = stmt.raw_query();
    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(column_names_rc.len());

        for i in 0..column_names_rc.len() {
            row_values.push(extract_value(row, i)?);
        }

        result_set.add_row(Row::new(Arc::clone(&column_names_rc), row_values));
    }

    Ok(result_set)
}
