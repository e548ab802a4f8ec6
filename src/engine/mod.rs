pub mod cache;
pub mod compare;
pub mod validate;

use crate::domain::error::LocatorError;

pub use cache::{DataAccessCache, DataStore, Lookup, QueryParam, StoredRow};
pub use validate::ValidationEngine;

/// Evaluates a locator against a parsed document.
///
/// Returns the text value of every selected node in document order; an empty
/// vector means the locator matched nothing.
pub trait DocumentQuery {
    fn evaluate(&self, locator: &str) -> Result<Vec<String>, LocatorError>;
}
