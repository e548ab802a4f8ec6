use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::adapters::sqlite::SqliteStore;
use crate::adapters::xml::XmlDocument;
use crate::domain::error::ValidateError;
use crate::domain::report::{ValidationRun, ValidationSummary};
use crate::engine::ValidationEngine;
use crate::io::config::{DEFAULT_CONFIG_FILE, load_config};
use crate::io::report::{CsvReportWriter, ReportSink};
use crate::io::{IoError, read_text};
use crate::util::time::default_report_file_name;

/// Input arguments for validate command execution API.
#[derive(Debug, Clone)]
pub struct ValidateCommandArgs {
    pub document: PathBuf,
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl ValidateCommandArgs {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }
}

/// Structured command response that carries exit-code mapping and JSON payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidateCommandResponse {
    pub exit_code: i32,
    pub payload: Value,
}

pub fn run(args: &ValidateCommandArgs) -> ValidateCommandResponse {
    match execute(args) {
        Ok(summary) => summary_response(summary),
        Err(CommandError::InputUsage(message)) => error_response(3, "input_usage_error", message),
        Err(CommandError::DocumentKey(message)) => error_response(3, "document_key_error", message),
        Err(CommandError::Internal(message)) => error_response(1, "internal_error", message),
    }
}

fn summary_response(summary: ValidationSummary) -> ValidateCommandResponse {
    let exit_code = if summary.all_matched() { 0 } else { 2 };
    match serde_json::to_value(&summary) {
        Ok(payload) => ValidateCommandResponse { exit_code, payload },
        Err(_) => error_response(
            1,
            "internal_error",
            "failed to serialize validation summary".to_string(),
        ),
    }
}

fn error_response(exit_code: i32, kind: &str, message: String) -> ValidateCommandResponse {
    debug!(kind, "{message}");
    ValidateCommandResponse {
        exit_code,
        payload: json!({
            "error": kind,
            "message": message,
        }),
    }
}

fn execute(args: &ValidateCommandArgs) -> Result<ValidationSummary, CommandError> {
    let config_path = args.config_path();
    if !args.document.exists() {
        return Err(CommandError::InputUsage(format!(
            "document does not exist: {}",
            args.document.display()
        )));
    }
    if !config_path.exists() {
        return Err(CommandError::InputUsage(format!(
            "configuration file not found: {}",
            config_path.display()
        )));
    }

    let loaded = load_config(&config_path).map_err(map_io_as_input_usage)?;
    let text = read_text(&args.document).map_err(map_io_as_input_usage)?;
    let document = XmlDocument::parse(&text, loaded.model.namespaces())
        .map_err(|err| CommandError::InputUsage(err.to_string()))?;

    let store = SqliteStore::open(&loaded.database.url)
        .map_err(|err| CommandError::Internal(err.to_string()))?;
    let run = {
        let mut engine = ValidationEngine::new(&loaded.model, store);
        engine.validate(&document).map_err(map_validate_error)?
    };

    let report_path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_report_file_name()));
    write_report(&report_path, &run)
}

fn write_report(path: &Path, run: &ValidationRun) -> Result<ValidationSummary, CommandError> {
    let mut sink = CsvReportWriter::create(path).map_err(map_io_as_internal)?;
    sink.write_results(&run.results).map_err(map_io_as_internal)?;
    info!(report = sink.identifier(), rows = run.results.len(), "report written");
    Ok(ValidationSummary::from_run(run, sink.identifier()))
}

fn map_io_as_input_usage(error: IoError) -> CommandError {
    CommandError::InputUsage(error.to_string())
}

fn map_io_as_internal(error: IoError) -> CommandError {
    CommandError::Internal(format!("failed to write report: {error}"))
}

fn map_validate_error(error: ValidateError) -> CommandError {
    match error {
        ValidateError::DocumentKeyMissing { .. } | ValidateError::DocumentKeyNotFound { .. } => {
            CommandError::DocumentKey(error_chain(&error))
        }
        ValidateError::DataStore { .. } => CommandError::Internal(error_chain(&error)),
    }
}

/// Display of the error followed by any source not already part of it.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

enum CommandError {
    InputUsage(String),
    DocumentKey(String),
    Internal(String),
}
