use thiserror::Error;

use crate::domain::error::ConfigurationError;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to open `{path}`: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("toml parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
