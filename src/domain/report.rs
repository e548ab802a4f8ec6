use serde::Serialize;

/// Document value recorded when a location exists but holds no text.
pub const EMPTY_TAG: &str = "empty tag";

/// Outcome of one resolved mapping.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationResult {
    /// Locator, or `", "`-joined locators for multi-path groups.
    pub locators: String,
    pub view: String,
    pub column: String,
    pub matched: bool,
    pub document_value: String,
    pub stored_value: Option<String>,
}

impl ValidationResult {
    pub fn new(
        locators: impl Into<String>,
        view: impl Into<String>,
        column: impl Into<String>,
        matched: bool,
        document_value: impl Into<String>,
        stored_value: Option<String>,
    ) -> Self {
        Self {
            locators: locators.into(),
            view: view.into(),
            column: column.into(),
            matched,
            document_value: document_value.into(),
            stored_value,
        }
    }

    /// Failed result for a location that exists but is blank.
    pub fn empty_tag(
        locator: impl Into<String>,
        view: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self::new(locator, view, column, false, EMPTY_TAG, None)
    }
}

/// Ordered results of one run with running match counts.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ValidationRun {
    pub document_key: String,
    pub results: Vec<ValidationResult>,
    pub successful: usize,
    pub failed: usize,
}

impl ValidationRun {
    pub fn new(document_key: impl Into<String>) -> Self {
        Self {
            document_key: document_key.into(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, result: ValidationResult) {
        if result.matched {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    pub fn total(&self) -> usize {
        self.successful + self.failed
    }
}

/// Summary emitted once the report has been written.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationSummary {
    pub document_key: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub report: String,
}

impl ValidationSummary {
    pub fn from_run(run: &ValidationRun, report: impl Into<String>) -> Self {
        Self {
            document_key: run.document_key.clone(),
            total: run.total(),
            successful: run.successful,
            failed: run.failed,
            report: report.into(),
        }
    }

    pub fn all_matched(&self) -> bool {
        self.failed == 0
    }
}
