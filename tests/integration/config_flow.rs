use std::fs;

use docmatch::io::IoError;
use docmatch::io::config::{load_config, parse_config};
use tempfile::tempdir;

const BASE: &str = r#"
[database]
url = "store.db"

[document_key]
locator = "/Invoice/ID"
view = "HEADER_V"
column = "INV_NO"
"#;

#[test]
fn loads_full_configuration_from_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("docmatch.toml");
    fs::write(
        &path,
        format!(
            r#"{BASE}
[namespaces]
cbc = "urn:cbc"

[[mappings]]
view = "HEADER_V"
column = "NOTE"
locator = "/Invoice/cbc:Note"

[[custom_queries]]
name = "LINE_TOTAL"
locator = "/Invoice/Total"
query = "SELECT SUM(AMOUNT) FROM LINES_V WHERE ?1 IS NOT NULL AND INV_NO = ?2"

[[priority_groups]]
view = "HEADER_V"
column = "TaxCurrencyCode"
rank = 2
locators = ["/Invoice/TaxCurrency"]

[[priority_groups]]
view = "HEADER_V"
column = "DocumentCurrencyCode"
rank = 1
locators = [" /Invoice/Currency ", "/Invoice/Header/Currency"]

[[standalone_groups]]
view = "PARTY_V"
column = "NAME"
locators = ["/Invoice/Seller/Name"]
"#
        ),
    )
    .expect("write config");

    let loaded = load_config(&path).expect("load config");
    assert_eq!(loaded.database.url, "store.db");
    assert_eq!(loaded.model.document_key().column(), "INV_NO");
    assert_eq!(loaded.model.namespaces().len(), 1);
    assert_eq!(loaded.model.mappings().len(), 1);
    assert!(loaded.model.custom_query_for("/Invoice/Total").is_some());

    let ranked: Vec<&str> = loaded
        .model
        .priority_groups()
        .iter()
        .map(|group| group.column.as_str())
        .collect();
    assert_eq!(ranked, vec!["DocumentCurrencyCode", "TaxCurrencyCode"]);
    assert_eq!(
        loaded.model.priority_groups()[0].locators,
        vec!["/Invoice/Currency", "/Invoice/Header/Currency"]
    );
    assert_eq!(loaded.model.standalone_groups().count(), 1);
}

#[test]
fn missing_file_reports_path() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");

    let error = load_config(&path).expect_err("missing file");
    assert!(matches!(error, IoError::Open { .. }));
    assert!(error.to_string().contains("absent.toml"));
}

#[test]
fn rejects_unknown_sections() {
    let text = format!("{BASE}\n[reporting]\nformat = \"xlsx\"\n");
    let error = parse_config(&text).expect_err("unknown section");
    assert!(matches!(error, IoError::TomlParse(_)));
}

#[test]
fn rejects_missing_document_key() {
    let text = "[database]\nurl = \"store.db\"\n";
    let error = parse_config(text).expect_err("no document key");
    assert!(matches!(error, IoError::Configuration(_)));
}

#[test]
fn drops_mappings_on_the_key_column() {
    let text = format!(
        r#"{BASE}
[[mappings]]
view = "HEADER_V"
column = "INV_NO"
locator = "/Invoice/ID"
"#
    );
    let loaded = parse_config(&text).expect("valid config");
    assert!(loaded.model.mappings().is_empty());
}
