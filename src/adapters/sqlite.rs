//! SQLite-backed data store.
//!
//! Views are queried by name; identifiers come from configuration and are
//! quoted, values are always bound as parameters.

use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OpenFlags, Row, params_from_iter};
use tracing::{debug, info, warn};

use crate::domain::error::StoreError;
use crate::engine::cache::{DataStore, QueryParam, StoredRow};

/// Owns the single connection for a run; closed on drop.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens an existing database read-only. `file:` URIs are accepted.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        info!("connecting to database: {url}");
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(url, flags).map_err(|source| {
            StoreError::Connect {
                url: url.to_string(),
                source,
            }
        })?;
        Ok(Self { conn })
    }

    /// Wraps an already open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn query_error(statement: &str) -> impl FnOnce(rusqlite::Error) -> StoreError + '_ {
        move |source| StoreError::Query {
            statement: statement.to_string(),
            source,
        }
    }
}

impl DataStore for SqliteStore {
    fn key_exists(&self, view: &str, key_column: &str, key: &str) -> Result<bool, StoreError> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
            quote_identifier(view),
            quote_identifier(key_column)
        );
        let mut stmt = self.conn.prepare(&sql).map_err(Self::query_error(&sql))?;
        stmt.exists([key]).map_err(Self::query_error(&sql))
    }

    fn fetch_row(
        &self,
        view: &str,
        key_column: &str,
        key: &str,
    ) -> Result<Option<StoredRow>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1",
            quote_identifier(view),
            quote_identifier(key_column)
        );
        let mut stmt = self.conn.prepare(&sql).map_err(Self::query_error(&sql))?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(ToOwned::to_owned)
            .collect();

        let mut rows = stmt.query([key]).map_err(Self::query_error(&sql))?;
        let Some(row) = rows.next().map_err(Self::query_error(&sql))? else {
            debug!("no row in {view} for {key}");
            return Ok(None);
        };

        let mut columns = Vec::with_capacity(names.len());
        for (index, name) in names.into_iter().enumerate() {
            let value = column_text(row, index).map_err(Self::query_error(&sql))?;
            debug!("column {name} = {value:?}");
            columns.push((name, value));
        }
        Ok(Some(StoredRow::new(columns)))
    }

    fn fetch_column(
        &self,
        view: &str,
        column: &str,
        key_column: &str,
        key: &str,
    ) -> Result<Option<Option<String>>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            quote_identifier(column),
            quote_identifier(view),
            quote_identifier(key_column)
        );
        debug!("existence check query: {sql}");
        let mut stmt = self.conn.prepare(&sql).map_err(Self::query_error(&sql))?;
        let mut rows = stmt.query([key]).map_err(Self::query_error(&sql))?;
        match rows.next().map_err(Self::query_error(&sql))? {
            Some(row) => Ok(Some(column_text(row, 0).map_err(Self::query_error(&sql))?)),
            None => Ok(None),
        }
    }

    fn query_first(
        &self,
        template: &str,
        params: &[QueryParam],
    ) -> Result<Option<Option<String>>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(template)
            .map_err(Self::query_error(template))?;
        let bound = params.iter().map(to_sql_value);
        let mut rows = stmt
            .query(params_from_iter(bound))
            .map_err(Self::query_error(template))?;
        match rows.next().map_err(Self::query_error(template))? {
            Some(row) => Ok(Some(
                column_text(row, 0).map_err(Self::query_error(template))?,
            )),
            None => Ok(None),
        }
    }
}

fn to_sql_value(param: &QueryParam) -> Value {
    match param {
        QueryParam::Decimal { value, text } => match value.to_f64() {
            Some(number) => Value::Real(number),
            None => {
                warn!("numeric value {text} exceeds the REAL range; binding it as text");
                Value::Text(text.clone())
            }
        },
        QueryParam::Text(text) => Value::Text(text.clone()),
    }
}

fn column_text(row: &Row<'_>, index: usize) -> Result<Option<String>, rusqlite::Error> {
    Ok(match row.get_ref(index)? {
        ValueRef::Null => None,
        ValueRef::Integer(value) => Some(value.to_string()),
        ValueRef::Real(value) => Some(value.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    })
}

/// Double-quotes each dotted segment, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|segment| format!("\"{}\"", segment.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}
