pub mod config;
pub mod error;
pub mod report;

use std::fs;
use std::path::Path;

pub use error::IoError;

/// Reads a whole input file as UTF-8 text.
pub fn read_text(path: &Path) -> Result<String, IoError> {
    fs::read_to_string(path).map_err(|source| IoError::Open {
        path: path.display().to_string(),
        source,
    })
}
