use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::domain::error::ConfigurationError;

/// Connection settings for the authoritative data store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseSettings {
    pub url: String,
}

/// How the document's unique key is located and where it lives in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentKeyRule {
    locator: String,
    view: String,
    column: String,
}

impl DocumentKeyRule {
    pub fn new(
        locator: impl Into<String>,
        view: impl Into<String>,
        column: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let rule = Self {
            locator: locator.into(),
            view: view.into(),
            column: column.into(),
        };
        if is_blank(&rule.locator) || is_blank(&rule.view) || is_blank(&rule.column) {
            return Err(ConfigurationError::new(
                "document key configuration is incomplete: locator, view and column are required",
            ));
        }
        Ok(rule)
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn view(&self) -> &str {
        &self.view
    }

    pub fn column(&self) -> &str {
        &self.column
    }
}

/// One document location validated against one view column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMapping {
    pub locator: String,
    pub view: String,
    pub column: String,
}

/// Document location validated by a parameterized SQL template.
///
/// The template binds the extracted value first and the document key second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomQueryMapping {
    pub name: String,
    pub locator: String,
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupKind {
    /// Lower rank is resolved first.
    Priority { rank: i64 },
    Standalone,
}

/// One logical field reachable through several alternative locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiPathGroup {
    pub view: String,
    pub column: String,
    pub kind: GroupKind,
    pub locators: Vec<String>,
}

impl MultiPathGroup {
    pub fn rank(&self) -> Option<i64> {
        match self.kind {
            GroupKind::Priority { rank } => Some(rank),
            GroupKind::Standalone => None,
        }
    }

    pub fn is_priority(&self) -> bool {
        matches!(self.kind, GroupKind::Priority { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceBinding {
    pub prefix: String,
    pub uri: String,
}

/// Immutable, fully resolved mapping rules for one validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigModel {
    document_key: DocumentKeyRule,
    namespaces: Vec<NamespaceBinding>,
    mappings: Vec<FieldMapping>,
    custom_queries: BTreeMap<String, CustomQueryMapping>,
    groups: Vec<MultiPathGroup>,
}

impl ConfigModel {
    pub fn new(
        document_key: DocumentKeyRule,
        namespaces: Vec<NamespaceBinding>,
        mappings: Vec<FieldMapping>,
        custom_queries: Vec<CustomQueryMapping>,
        groups: Vec<MultiPathGroup>,
    ) -> Result<Self, ConfigurationError> {
        let mut seen_prefixes = BTreeSet::new();
        for binding in &namespaces {
            if is_blank(&binding.prefix) || is_blank(&binding.uri) {
                return Err(ConfigurationError::new(
                    "namespace bindings require a non-empty prefix and uri",
                ));
            }
            if !seen_prefixes.insert(binding.prefix.as_str()) {
                return Err(ConfigurationError::new(format!(
                    "namespace prefix `{}` is bound more than once",
                    binding.prefix
                )));
            }
        }

        for mapping in &mappings {
            if is_blank(&mapping.locator) || is_blank(&mapping.view) || is_blank(&mapping.column)
            {
                return Err(ConfigurationError::new(
                    "field mappings require locator, view and column",
                ));
            }
        }
        let mappings = mappings
            .into_iter()
            .filter(|mapping| mapping.column != document_key.column)
            .collect();

        let mut indexed = BTreeMap::new();
        for custom in custom_queries {
            if is_blank(&custom.name) || is_blank(&custom.locator) || is_blank(&custom.query) {
                return Err(ConfigurationError::new(
                    "custom queries require name, locator and query",
                ));
            }
            if indexed.contains_key(&custom.locator) {
                return Err(ConfigurationError::new(format!(
                    "custom query locator `{}` is configured more than once",
                    custom.locator
                )));
            }
            indexed.insert(custom.locator.clone(), custom);
        }

        let mut seen_groups = BTreeSet::new();
        for group in &groups {
            if is_blank(&group.view) || is_blank(&group.column) {
                return Err(ConfigurationError::new("groups require view and column"));
            }
            if group.locators.is_empty() || group.locators.iter().any(|l| is_blank(l)) {
                return Err(ConfigurationError::new(format!(
                    "group {}.{} requires at least one non-empty locator",
                    group.view, group.column
                )));
            }
            let slot = (
                group.is_priority(),
                group.view.as_str(),
                group.column.as_str(),
            );
            if !seen_groups.insert(slot) {
                return Err(ConfigurationError::new(format!(
                    "group {}.{} is configured more than once",
                    group.view, group.column
                )));
            }
        }

        Ok(Self {
            document_key,
            namespaces,
            mappings,
            custom_queries: indexed,
            groups,
        })
    }

    pub fn document_key(&self) -> &DocumentKeyRule {
        &self.document_key
    }

    pub fn namespaces(&self) -> &[NamespaceBinding] {
        &self.namespaces
    }

    /// Simple mappings, document-key column excluded.
    pub fn mappings(&self) -> &[FieldMapping] {
        &self.mappings
    }

    pub fn custom_queries(&self) -> impl Iterator<Item = &CustomQueryMapping> {
        self.custom_queries.values()
    }

    pub fn custom_query_for(&self, locator: &str) -> Option<&CustomQueryMapping> {
        self.custom_queries.get(locator)
    }

    /// Priority groups in ascending rank; equal ranks keep configuration order.
    pub fn priority_groups(&self) -> Vec<&MultiPathGroup> {
        let mut groups: Vec<&MultiPathGroup> =
            self.groups.iter().filter(|group| group.is_priority()).collect();
        groups.sort_by_key(|group| group.rank());
        groups
    }

    pub fn standalone_groups(&self) -> impl Iterator<Item = &MultiPathGroup> {
        self.groups.iter().filter(|group| !group.is_priority())
    }

    pub fn priority_group(&self, view: &str, column: &str) -> Option<&MultiPathGroup> {
        self.find_group(view, column, true)
    }

    pub fn standalone_group(&self, view: &str, column: &str) -> Option<&MultiPathGroup> {
        self.find_group(view, column, false)
    }

    fn find_group(&self, view: &str, column: &str, priority: bool) -> Option<&MultiPathGroup> {
        self.groups.iter().find(|group| {
            group.is_priority() == priority && group.view == view && group.column == column
        })
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
