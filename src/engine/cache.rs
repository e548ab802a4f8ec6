use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::{debug, info};

use crate::domain::error::StoreError;
use crate::engine::compare::{self, CUSTOM_QUERY_EPSILON, Decimal};

/// Positional parameter bound into a custom query template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParam {
    /// Numeric document value together with the text it was parsed from.
    Decimal { value: Decimal, text: String },
    Text(String),
}

/// One row of a view, column name to textual value (`None` for SQL NULL).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredRow {
    columns: Vec<(String, Option<String>)>,
}

impl StoredRow {
    pub fn new(columns: Vec<(String, Option<String>)>) -> Self {
        Self { columns }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Exact column name first, then an ASCII case-insensitive match.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(column))
            })
            .and_then(|(_, value)| value.as_deref())
    }
}

/// Narrow interface to the authoritative data store.
pub trait DataStore {
    fn key_exists(&self, view: &str, key_column: &str, key: &str) -> Result<bool, StoreError>;

    /// First row of `view` whose `key_column` equals `key`.
    fn fetch_row(
        &self,
        view: &str,
        key_column: &str,
        key: &str,
    ) -> Result<Option<StoredRow>, StoreError>;

    /// `Some(value)` when a row exists; the inner option is `None` for SQL NULL.
    fn fetch_column(
        &self,
        view: &str,
        column: &str,
        key_column: &str,
        key: &str,
    ) -> Result<Option<Option<String>>, StoreError>;

    /// Runs a verbatim template and returns the first column of its first row.
    fn query_first(
        &self,
        template: &str,
        params: &[QueryParam],
    ) -> Result<Option<Option<String>>, StoreError>;
}

/// Match outcome of one data-store comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub matched: bool,
    pub stored_value: Option<String>,
}

impl Lookup {
    pub fn unmatched(stored_value: Option<String>) -> Self {
        Self {
            matched: false,
            stored_value,
        }
    }
}

/// Single point of contact with the data store, caching whole rows for the
/// active document key.
pub struct DataAccessCache<S> {
    store: S,
    key_column: String,
    rows: BTreeMap<String, StoredRow>,
    current_key: Option<String>,
    row_loads: usize,
}

impl<S: DataStore> DataAccessCache<S> {
    pub fn new(store: S, key_column: impl Into<String>) -> Self {
        Self {
            store,
            key_column: key_column.into(),
            rows: BTreeMap::new(),
            current_key: None,
            row_loads: 0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of full-row loads issued so far.
    pub fn row_loads(&self) -> usize {
        self.row_loads
    }

    pub fn confirm_document_key(&self, view: &str, key: &str) -> Result<bool, StoreError> {
        self.store.key_exists(view, &self.key_column, key)
    }

    pub fn lookup_column(
        &mut self,
        view: &str,
        column: &str,
        document_value: &str,
        document_key: &str,
    ) -> Result<Lookup, StoreError> {
        let row = self.cached_row(view, document_key)?;
        let stored_value = row.get(column).map(ToOwned::to_owned);
        let matched = stored_value
            .as_deref()
            .is_some_and(|stored| compare::equals(document_value, stored));
        Ok(Lookup {
            matched,
            stored_value,
        })
    }

    pub fn column_has_non_empty_value(
        &self,
        view: &str,
        column: &str,
        document_key: &str,
    ) -> Result<bool, StoreError> {
        let value = self
            .store
            .fetch_column(view, column, &self.key_column, document_key)?;
        Ok(value
            .flatten()
            .is_some_and(|value| !value.trim().is_empty()))
    }

    pub fn run_custom_query(
        &self,
        template: &str,
        document_key: &str,
        document_value: &str,
    ) -> Result<Lookup, StoreError> {
        let value_param = match Decimal::parse(document_value) {
            Some(value) => QueryParam::Decimal {
                value,
                text: document_value.to_string(),
            },
            None => QueryParam::Text(document_value.to_string()),
        };
        let params = [value_param, QueryParam::Text(document_key.to_string())];

        debug!("executing custom query: {template}");
        let Some(stored_value) = self.store.query_first(template, &params)? else {
            return Ok(Lookup::unmatched(None));
        };

        let matched = match (parse_number(document_value), stored_value.as_deref()) {
            (Some(document), Some(stored)) => parse_number(stored)
                .is_some_and(|stored| {
                    compare::approximately_equals(document, stored, CUSTOM_QUERY_EPSILON)
                }),
            _ => false,
        };
        Ok(Lookup {
            matched,
            stored_value,
        })
    }

    fn cached_row(&mut self, view: &str, document_key: &str) -> Result<&StoredRow, StoreError> {
        if self.current_key.as_deref() != Some(document_key) {
            if !self.rows.is_empty() {
                info!("cleared cached rows; starting document {document_key}");
            }
            self.rows.clear();
            self.current_key = Some(document_key.to_string());
        }

        let cache_key = format!("{view}:{document_key}");
        match self.rows.entry(cache_key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                info!("loading row from view {view} for document {document_key}");
                let row = self
                    .store
                    .fetch_row(view, &self.key_column, document_key)?
                    .unwrap_or_default();
                self.row_loads += 1;
                debug!("loaded {} columns from {view}", row.len());
                Ok(entry.insert(row))
            }
        }
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}
