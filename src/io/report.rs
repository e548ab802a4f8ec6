use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::domain::report::{EMPTY_TAG, ValidationResult};
use crate::io::IoError;

pub const REPORT_HEADERS: [&str; 6] = [
    "XML_Path",
    "View",
    "Field",
    "Match",
    "XML_Value",
    "DB_Value",
];

/// Consumer of the ordered result sequence of a run.
pub trait ReportSink {
    fn write_results(&mut self, results: &[ValidationResult]) -> Result<(), IoError>;

    /// Where the report went, e.g. the output file path.
    fn identifier(&self) -> &str;
}

/// CSV report with one row per result; fields are quoted only when needed.
pub struct CsvReportWriter<W: Write> {
    writer: csv::Writer<W>,
    identifier: String,
}

impl CsvReportWriter<File> {
    pub fn create(path: &Path) -> Result<Self, IoError> {
        let file = File::create(path).map_err(|source| IoError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_writer(file, path.display().to_string())
    }
}

impl<W: Write> CsvReportWriter<W> {
    pub fn from_writer(writer: W, identifier: impl Into<String>) -> Result<Self, IoError> {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(writer);
        writer.write_record(REPORT_HEADERS)?;
        Ok(Self {
            writer,
            identifier: identifier.into(),
        })
    }

    pub fn into_inner(self) -> Result<W, IoError> {
        self.writer
            .into_inner()
            .map_err(|error| IoError::Io(error.into_error()))
    }
}

impl<W: Write> ReportSink for CsvReportWriter<W> {
    fn write_results(&mut self, results: &[ValidationResult]) -> Result<(), IoError> {
        for result in results {
            let document_value = if result.document_value.trim().is_empty() {
                EMPTY_TAG
            } else {
                result.document_value.as_str()
            };
            self.writer.write_record([
                result.locators.as_str(),
                result.view.as_str(),
                result.column.as_str(),
                if result.matched { "true" } else { "false" },
                document_value,
                result.stored_value.as_deref().unwrap_or_default(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
