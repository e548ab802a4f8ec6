use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::domain::config::{
    ConfigModel, CustomQueryMapping, DatabaseSettings, DocumentKeyRule, FieldMapping, GroupKind,
    MultiPathGroup, NamespaceBinding,
};
use crate::domain::error::ConfigurationError;
use crate::io::{IoError, read_text};

/// Configuration file looked up in the working directory by default.
pub const DEFAULT_CONFIG_FILE: &str = "docmatch.toml";

/// Parsed configuration: store settings plus the resolved mapping rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub database: DatabaseSettings,
    pub model: ConfigModel,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    database: RawDatabase,
    #[serde(default)]
    document_key: RawDocumentKey,
    #[serde(default)]
    namespaces: BTreeMap<String, String>,
    #[serde(default)]
    mappings: Vec<RawMapping>,
    #[serde(default)]
    custom_queries: Vec<RawCustomQuery>,
    #[serde(default)]
    priority_groups: Vec<RawPriorityGroup>,
    #[serde(default)]
    standalone_groups: Vec<RawStandaloneGroup>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawDatabase {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawDocumentKey {
    locator: Option<String>,
    view: Option<String>,
    column: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMapping {
    view: String,
    column: String,
    locator: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCustomQuery {
    name: String,
    locator: String,
    query: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPriorityGroup {
    view: String,
    column: String,
    rank: i64,
    locators: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStandaloneGroup {
    view: String,
    column: String,
    locators: Vec<String>,
}

pub fn load_config(path: &Path) -> Result<LoadedConfig, IoError> {
    parse_config(&read_text(path)?)
}

pub fn parse_config(text: &str) -> Result<LoadedConfig, IoError> {
    let raw: RawConfig = toml::from_str(text)?;
    Ok(resolve(raw)?)
}

fn resolve(raw: RawConfig) -> Result<LoadedConfig, ConfigurationError> {
    let url = raw
        .database
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ConfigurationError::new("database.url is required"))?;

    let RawDocumentKey {
        locator,
        view,
        column,
    } = raw.document_key;
    let document_key = DocumentKeyRule::new(
        locator.unwrap_or_default(),
        view.unwrap_or_default(),
        column.unwrap_or_default(),
    )?;

    let namespaces = raw
        .namespaces
        .into_iter()
        .map(|(prefix, uri)| NamespaceBinding { prefix, uri })
        .collect();

    let mappings = raw
        .mappings
        .into_iter()
        .map(|mapping| FieldMapping {
            locator: mapping.locator,
            view: mapping.view,
            column: mapping.column,
        })
        .collect();

    let custom_queries = raw
        .custom_queries
        .into_iter()
        .map(|custom| CustomQueryMapping {
            name: custom.name,
            locator: custom.locator,
            query: custom.query,
        })
        .collect();

    let priority = raw.priority_groups.into_iter().map(|group| MultiPathGroup {
        view: group.view,
        column: group.column,
        kind: GroupKind::Priority { rank: group.rank },
        locators: trimmed(group.locators),
    });
    let standalone = raw.standalone_groups.into_iter().map(|group| MultiPathGroup {
        view: group.view,
        column: group.column,
        kind: GroupKind::Standalone,
        locators: trimmed(group.locators),
    });
    let groups = priority.chain(standalone).collect();

    let model = ConfigModel::new(document_key, namespaces, mappings, custom_queries, groups)?;
    Ok(LoadedConfig {
        database: DatabaseSettings { url },
        model,
    })
}

fn trimmed(locators: Vec<String>) -> Vec<String> {
    locators
        .into_iter()
        .map(|locator| locator.trim().to_string())
        .collect()
}
