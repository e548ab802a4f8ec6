use std::fmt;

use thiserror::Error;

/// Malformed or incomplete configuration; fatal at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid configuration: {message}")]
pub struct ConfigurationError {
    message: String,
}

impl ConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure raised by the data store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open data store `{url}`: {source}")]
    Connect {
        url: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("query `{statement}` failed: {source}")]
    Query {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("data store unavailable: {0}")]
    Unavailable(String),
}

/// Why a locator was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorErrorKind {
    /// Not a well-formed path expression.
    Malformed,
    /// Valid XPath, but outside the supported path subset.
    Unsupported,
}

impl fmt::Display for LocatorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => f.write_str("invalid locator"),
            Self::Unsupported => f.write_str("unsupported locator expression"),
        }
    }
}

/// A locator could not be evaluated against the document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} `{locator}`: {reason}")]
pub struct LocatorError {
    kind: LocatorErrorKind,
    locator: String,
    reason: String,
}

impl LocatorError {
    pub fn new(locator: &str, reason: impl Into<String>) -> Self {
        Self {
            kind: LocatorErrorKind::Malformed,
            locator: locator.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(locator: &str, reason: impl Into<String>) -> Self {
        Self {
            kind: LocatorErrorKind::Unsupported,
            ..Self::new(locator, reason)
        }
    }

    pub fn kind(&self) -> LocatorErrorKind {
        self.kind
    }

    pub fn is_unsupported(&self) -> bool {
        self.kind == LocatorErrorKind::Unsupported
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }
}

/// Errors that abort a validation run. No partial report is produced.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("document key not found or empty at `{locator}`")]
    DocumentKeyMissing {
        locator: String,
        #[source]
        source: Option<LocatorError>,
    },

    #[error("document key `{key}` not found in view {view}")]
    DocumentKeyNotFound { key: String, view: String },

    #[error("{context}: {source}")]
    DataStore {
        context: String,
        #[source]
        source: StoreError,
    },
}

impl ValidateError {
    pub fn data_store(context: impl Into<String>, source: StoreError) -> Self {
        Self::DataStore {
            context: context.into(),
            source,
        }
    }
}
