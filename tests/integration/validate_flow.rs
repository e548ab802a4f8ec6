use std::path::Path;

use docmatch::adapters::sqlite::SqliteStore;
use docmatch::adapters::xml::XmlDocument;
use docmatch::domain::error::ValidateError;
use docmatch::domain::report::EMPTY_TAG;
use docmatch::engine::ValidationEngine;
use docmatch::io::config::{LoadedConfig, parse_config};
use rusqlite::Connection;
use tempfile::tempdir;

const CONFIG: &str = r#"
[database]
url = "unused"

[document_key]
locator = "/inv:Invoice/cbc:ID"
view = "HEADER_V"
column = "INV_NO"

[namespaces]
inv = "urn:example:invoice"
cbc = "urn:example:basic"

[[mappings]]
view = "HEADER_V"
column = "ISSUE_DATE"
locator = "/inv:Invoice/cbc:IssueDate"

[[mappings]]
view = "HEADER_V"
column = "TOTAL"
locator = "/inv:Invoice/cbc:PayableAmount"

[[mappings]]
view = "HEADER_V"
column = "NOTE"
locator = "/inv:Invoice/cbc:Note"

[[mappings]]
view = "HEADER_V"
column = "TaxCurrencyCode"
locator = "/inv:Invoice/cbc:TaxCurrencyCode"

[[custom_queries]]
name = "LINE_TOTAL"
locator = "/inv:Invoice/cbc:LineSum"
query = "SELECT SUM(AMOUNT) FROM LINES_V WHERE ?1 IS NOT NULL AND INV_NO = ?2"

[[priority_groups]]
view = "HEADER_V"
column = "TaxCurrencyCode"
rank = 1
locators = ["/inv:Invoice/cbc:TaxCurrencyCode"]

[[priority_groups]]
view = "HEADER_V"
column = "DocumentCurrencyCode"
rank = 2
locators = ["/inv:Invoice/cbc:DocumentCurrencyCode", "/inv:Invoice/cbc:Currency"]
"#;

const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Invoice xmlns="urn:example:invoice" xmlns:cbc="urn:example:basic">
  <cbc:ID> INV-1001 </cbc:ID>
  <cbc:IssueDate>2024-01-15</cbc:IssueDate>
  <cbc:PayableAmount>100.00</cbc:PayableAmount>
  <cbc:LineSum>100</cbc:LineSum>
  <cbc:Note></cbc:Note>
  <cbc:DocumentCurrencyCode>USD</cbc:DocumentCurrencyCode>
  <cbc:TaxCurrencyCode>EUR</cbc:TaxCurrencyCode>
</Invoice>
"#;

fn seed_store(path: &Path, tax_currency: Option<&str>) {
    let conn = Connection::open(path).expect("open db");
    conn.execute_batch(
        "CREATE TABLE HEADER_V (
             INV_NO TEXT,
             ISSUE_DATE TEXT,
             TOTAL REAL,
             NOTE TEXT,
             TaxCurrencyCode TEXT,
             DocumentCurrencyCode TEXT
         );
         CREATE TABLE LINES_V (INV_NO TEXT, AMOUNT REAL);
         INSERT INTO LINES_V VALUES ('INV-1001', 60.0), ('INV-1001', 40.0);",
    )
    .expect("schema");
    conn.execute(
        "INSERT INTO HEADER_V VALUES ('INV-1001', '2024-01-15', 100.0, NULL, ?1, 'USD')",
        [tax_currency],
    )
    .expect("header row");
}

fn config() -> LoadedConfig {
    parse_config(CONFIG).expect("valid config")
}

#[test]
fn validates_namespaced_document_against_sqlite_views() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("store.db");
    seed_store(&db_path, None);

    let loaded = config();
    let document = XmlDocument::parse(DOCUMENT, loaded.model.namespaces()).expect("parse xml");
    let store = SqliteStore::open(&db_path.display().to_string()).expect("open store");
    let mut engine = ValidationEngine::new(&loaded.model, store);

    let run = engine.validate(&document).expect("validation run");
    assert_eq!(run.document_key, "INV-1001");

    let rows: Vec<(&str, &str, bool)> = run
        .results
        .iter()
        .map(|result| (result.view.as_str(), result.column.as_str(), result.matched))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("SQL_VALIDATION", "LINE_TOTAL", true),
            ("HEADER_V", "DocumentCurrencyCode", true),
            ("HEADER_V", "ISSUE_DATE", true),
            ("HEADER_V", "TOTAL", true),
            ("HEADER_V", "NOTE", false),
        ]
    );
    assert_eq!(run.successful, 4);
    assert_eq!(run.failed, 1);

    let note = &run.results[4];
    assert_eq!(note.document_value, EMPTY_TAG);
    assert_eq!(note.stored_value, None);

    let currency = &run.results[1];
    assert_eq!(currency.locators, "/inv:Invoice/cbc:DocumentCurrencyCode");
    assert_eq!(currency.stored_value.as_deref(), Some("USD"));

    assert_eq!(engine.cache().row_loads(), 1);
}

#[test]
fn tax_currency_takes_precedence_when_stored() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("store.db");
    seed_store(&db_path, Some("EUR"));

    let loaded = config();
    let document = XmlDocument::parse(DOCUMENT, loaded.model.namespaces()).expect("parse xml");
    let store = SqliteStore::open(&db_path.display().to_string()).expect("open store");
    let mut engine = ValidationEngine::new(&loaded.model, store);

    let run = engine.validate(&document).expect("validation run");
    let currency_columns: Vec<&str> = run
        .results
        .iter()
        .filter(|result| result.column.ends_with("CurrencyCode"))
        .map(|result| result.column.as_str())
        .collect();
    assert_eq!(currency_columns, vec!["TaxCurrencyCode"]);
    assert_eq!(run.failed, 1);
}

#[test]
fn unknown_document_key_stops_before_any_result() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("store.db");
    seed_store(&db_path, None);

    let loaded = config();
    let text = DOCUMENT.replace("INV-1001", "INV-2002");
    let document = XmlDocument::parse(&text, loaded.model.namespaces()).expect("parse xml");
    let store = SqliteStore::open(&db_path.display().to_string()).expect("open store");
    let mut engine = ValidationEngine::new(&loaded.model, store);

    let error = engine.validate(&document).expect_err("unknown key");
    assert!(matches!(
        error,
        ValidateError::DocumentKeyNotFound { ref key, .. } if key == "INV-2002"
    ));
    assert_eq!(engine.cache().row_loads(), 0);
}

#[test]
fn mismatched_line_total_is_reported_with_stored_sum() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("store.db");
    seed_store(&db_path, None);

    let loaded = config();
    let text = DOCUMENT.replace("<cbc:LineSum>100</cbc:LineSum>", "<cbc:LineSum>99.5</cbc:LineSum>");
    let document = XmlDocument::parse(&text, loaded.model.namespaces()).expect("parse xml");
    let store = SqliteStore::open(&db_path.display().to_string()).expect("open store");
    let mut engine = ValidationEngine::new(&loaded.model, store);

    let run = engine.validate(&document).expect("validation run");
    let line_total = &run.results[0];
    assert_eq!(line_total.column, "LINE_TOTAL");
    assert!(!line_total.matched);
    assert_eq!(line_total.document_value, "99.5");
    assert_eq!(line_total.stored_value.as_deref(), Some("100"));
}
