use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OpenFlags};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Result;

/// Default bound on how long a query waits on a locked database
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(2000);

/// Read-only, parameterized row queries returning one JSON object per row
///
/// Parameters are bound positionally (`?1`, `?2`, ...), never interpolated.
pub trait RowQuery: Send + Sync {
    fn query_json(&self, sql: &str, params: &[Value]) -> Result<Vec<Map<String, Value>>>;

    fn has_table(&self, table: &str) -> bool {
        self.query_json(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[Value::from(table)],
        )
        .map(|rows| !rows.is_empty())
        .unwrap_or(false)
    }
}

/// `RowQuery` over a SQLite file owned by another process
///
/// A fresh read-only connection is opened per query so a concurrently writing
/// tool never sees a long-lived reader holding its WAL.
#[derive(Debug, Clone)]
pub struct SqliteRows {
    path: PathBuf,
    timeout: Duration,
}

impl SqliteRows {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.busy_timeout(self.timeout)?;
        Ok(conn)
    }
}

impl RowQuery for SqliteRows {
    fn query_json(&self, sql: &str, params: &[Value]) -> Result<Vec<Map<String, Value>>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let bound: Vec<SqlValue> = params.iter().map(to_sql_value).collect();

        let rows = stmt
            .query_map(rusqlite::params_from_iter(bound.iter()), |row| {
                let mut object = Map::with_capacity(columns.len());
                for (i, name) in columns.iter().enumerate() {
                    object.insert(name.clone(), from_value_ref(row.get_ref(i)?));
                }
                Ok(object)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            Value::String(String::from_utf8_lossy(t).into_owned())
        }
    }
}

/// Column as string, accepting numeric ids
pub(crate) fn str_col(row: &Map<String, Value>, name: &str) -> Option<String> {
    match row.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn i64_col(row: &Map<String, Value>, name: &str) -> Option<i64> {
    match row.get(name)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// A `data` column holding a JSON document
pub(crate) fn json_col(row: &Map<String, Value>, name: &str) -> Option<Value> {
    match row.get(name)? {
        Value::String(s) => serde_json::from_str(s).ok(),
        Value::Object(_) => row.get(name).cloned(),
        _ => None,
    }
}
