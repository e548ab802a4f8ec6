use std::fs;
use std::path::Path;

use docmatch::cmd::validate::{ValidateCommandArgs, run};
use rusqlite::Connection;
use serde_json::json;
use tempfile::tempdir;

fn write_inputs(dir: &Path, document: &str) -> ValidateCommandArgs {
    let db_path = dir.join("store.db");
    let conn = Connection::open(&db_path).expect("open db");
    conn.execute_batch(
        "CREATE TABLE HEADER_V (INV_NO TEXT, BUYER TEXT, AMOUNT REAL, DocumentCurrencyCode TEXT);
         INSERT INTO HEADER_V VALUES ('INV-7', 'Acme, Inc.', 12.5, 'USD');",
    )
    .expect("schema");
    drop(conn);

    let config_path = dir.join("docmatch.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[database]
url = '{}'

[document_key]
locator = "/Invoice/@number"
view = "HEADER_V"
column = "INV_NO"

[[mappings]]
view = "HEADER_V"
column = "BUYER"
locator = "/Invoice/Buyer/Name"

[[mappings]]
view = "HEADER_V"
column = "AMOUNT"
locator = "/Invoice/Amount"

[[standalone_groups]]
view = "HEADER_V"
column = "DocumentCurrencyCode"
locators = ["/Invoice/Currency", "/Invoice/Amount/@currency"]
"#,
            db_path.display()
        ),
    )
    .expect("write config");

    let document_path = dir.join("invoice.xml");
    fs::write(&document_path, document).expect("write document");

    ValidateCommandArgs {
        document: document_path,
        config: Some(config_path),
        output: Some(dir.join("report.csv")),
    }
}

fn read_report(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .expect("open report");
    reader
        .records()
        .map(|record| {
            record
                .expect("record")
                .iter()
                .map(ToOwned::to_owned)
                .collect()
        })
        .collect()
}

#[test]
fn writes_report_rows_in_validation_order() {
    let dir = tempdir().expect("tempdir");
    let args = write_inputs(
        dir.path(),
        r#"<Invoice number="INV-7">
  <Buyer><Name>Acme, Inc.</Name></Buyer>
  <Amount currency="USD">12.50</Amount>
  <Currency>USD</Currency>
</Invoice>"#,
    );

    let response = run(&args);
    assert_eq!(response.exit_code, 0);
    assert_eq!(response.payload["document_key"], json!("INV-7"));
    assert_eq!(response.payload["total"], json!(3));

    let rows = read_report(&dir.path().join("report.csv"));
    assert_eq!(
        rows,
        vec![
            vec!["XML_Path", "View", "Field", "Match", "XML_Value", "DB_Value"],
            vec![
                "/Invoice/Currency, /Invoice/Amount/@currency",
                "HEADER_V",
                "DocumentCurrencyCode",
                "true",
                "USD",
                "USD",
            ],
            vec!["/Invoice/Buyer/Name", "HEADER_V", "BUYER", "true", "Acme, Inc.", "Acme, Inc."],
            vec!["/Invoice/Amount", "HEADER_V", "AMOUNT", "true", "12.50", "12.5"],
        ]
    );
}

#[test]
fn inconsistent_group_values_fail_without_lookup() {
    let dir = tempdir().expect("tempdir");
    let args = write_inputs(
        dir.path(),
        r#"<Invoice number="INV-7">
  <Buyer><Name>Acme, Inc.</Name></Buyer>
  <Amount currency="EUR">12.50</Amount>
  <Currency>USD</Currency>
</Invoice>"#,
    );

    let response = run(&args);
    assert_eq!(response.exit_code, 2);
    assert_eq!(response.payload["failed"], json!(1));

    let rows = read_report(&dir.path().join("report.csv"));
    assert_eq!(
        rows[1],
        vec![
            "/Invoice/Currency, /Invoice/Amount/@currency",
            "HEADER_V",
            "DocumentCurrencyCode",
            "false",
            "EUR, USD",
            "",
        ]
    );
}
