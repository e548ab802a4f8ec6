//! Validation run over one document.
//!
//! Stages run in a fixed order: extract the document key, confirm it in the
//! key view, custom queries, priority groups by ascending rank, standalone
//! groups, then the remaining simple mappings. Only key resolution and row
//! loading abort the run; every other failure degrades to a skipped mapping or
//! a failed result.

mod multipath;

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::domain::config::{ConfigModel, MultiPathGroup};
use crate::domain::error::ValidateError;
use crate::domain::report::{ValidationResult, ValidationRun};
use crate::engine::DocumentQuery;
use crate::engine::cache::{DataAccessCache, DataStore, Lookup};

use self::multipath::GroupValues;

/// View label recorded for results of the custom-query stage.
pub const CUSTOM_QUERY_VIEW: &str = "SQL_VALIDATION";

/// Column whose presence in the store selects which currency group applies.
pub const TAX_CURRENCY_COLUMN: &str = "TaxCurrencyCode";
pub const DOCUMENT_CURRENCY_COLUMN: &str = "DocumentCurrencyCode";

pub struct ValidationEngine<'c, S> {
    config: &'c ConfigModel,
    cache: DataAccessCache<S>,
}

#[derive(Debug, Default)]
struct Processed {
    locators: BTreeSet<String>,
    slots: BTreeSet<(String, String)>,
}

impl Processed {
    fn has_slot(&self, group: &MultiPathGroup) -> bool {
        self.slots
            .contains(&(group.view.clone(), group.column.clone()))
    }

    fn mark_locators(&mut self, group: &MultiPathGroup) {
        self.locators.extend(group.locators.iter().cloned());
    }

    fn mark_group(&mut self, group: &MultiPathGroup) {
        self.slots.insert((group.view.clone(), group.column.clone()));
        self.mark_locators(group);
    }
}

impl<'c, S: DataStore> ValidationEngine<'c, S> {
    pub fn new(config: &'c ConfigModel, store: S) -> Self {
        let cache = DataAccessCache::new(store, config.document_key().column());
        Self { config, cache }
    }

    pub fn cache(&self) -> &DataAccessCache<S> {
        &self.cache
    }

    pub fn validate<D: DocumentQuery + ?Sized>(
        &mut self,
        document: &D,
    ) -> Result<ValidationRun, ValidateError> {
        let config = self.config;
        let document_key = self.extract_key(document)?;
        self.confirm_key(&document_key)?;

        let mut run = ValidationRun::new(document_key.clone());
        let mut processed = Processed::default();

        info!("processing custom query validations");
        self.run_custom_queries(document, &document_key, &mut run, &mut processed);

        info!("processing priority groups");
        for group in config.priority_groups() {
            if processed.has_slot(group) {
                continue;
            }
            if !self.gate_allows(group, &document_key) {
                info!(
                    "skipping priority group {}.{}: currency gate closed",
                    group.view, group.column
                );
                processed.mark_locators(group);
                continue;
            }
            self.resolve_group(document, group, &document_key, &mut run, &mut processed)?;
        }

        info!("processing standalone groups");
        for group in config.standalone_groups() {
            if processed.has_slot(group) {
                info!(
                    "skipping standalone group for already processed column {}.{}",
                    group.view, group.column
                );
                continue;
            }
            self.resolve_group(document, group, &document_key, &mut run, &mut processed)?;
        }

        info!("processing simple mappings");
        self.run_simple_mappings(document, &document_key, &mut run, &processed)?;

        info!(
            "validated document {}: {} matched, {} failed",
            run.document_key, run.successful, run.failed
        );
        Ok(run)
    }

    fn extract_key<D: DocumentQuery + ?Sized>(&self, document: &D) -> Result<String, ValidateError> {
        let locator = self.config.document_key().locator();
        let values = document
            .evaluate(locator)
            .map_err(|error| ValidateError::DocumentKeyMissing {
                locator: locator.to_string(),
                source: Some(error),
            })?;

        match values.into_iter().next() {
            Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(ValidateError::DocumentKeyMissing {
                locator: locator.to_string(),
                source: None,
            }),
        }
    }

    fn confirm_key(&self, document_key: &str) -> Result<(), ValidateError> {
        let view = self.config.document_key().view();
        info!("validating document with key {document_key}");
        let exists = self
            .cache
            .confirm_document_key(view, document_key)
            .map_err(|error| ValidateError::data_store("failed to confirm document key", error))?;
        if !exists {
            return Err(ValidateError::DocumentKeyNotFound {
                key: document_key.to_string(),
                view: view.to_string(),
            });
        }
        Ok(())
    }

    fn run_custom_queries<D: DocumentQuery + ?Sized>(
        &self,
        document: &D,
        document_key: &str,
        run: &mut ValidationRun,
        processed: &mut Processed,
    ) {
        for custom in self.config.custom_queries() {
            processed.locators.insert(custom.locator.clone());
            let Some(value) = first_value(document, &custom.locator) else {
                continue;
            };
            if value.trim().is_empty() {
                run.push(ValidationResult::empty_tag(
                    &custom.locator,
                    CUSTOM_QUERY_VIEW,
                    &custom.name,
                ));
                continue;
            }

            let lookup = self.custom_lookup(&custom.query, document_key, &value);
            run.push(ValidationResult::new(
                &custom.locator,
                CUSTOM_QUERY_VIEW,
                &custom.name,
                lookup.matched,
                value,
                lookup.stored_value,
            ));
        }
    }

    /// Currency precedence: the tax currency group applies only when the store
    /// holds a tax currency; the document currency group only when it does not.
    fn gate_allows(&self, group: &MultiPathGroup, document_key: &str) -> bool {
        match group.column.as_str() {
            TAX_CURRENCY_COLUMN => self.tax_currency_present(&group.view, document_key),
            DOCUMENT_CURRENCY_COLUMN => !self.tax_currency_present(&group.view, document_key),
            _ => true,
        }
    }

    fn tax_currency_present(&self, view: &str, document_key: &str) -> bool {
        match self
            .cache
            .column_has_non_empty_value(view, TAX_CURRENCY_COLUMN, document_key)
        {
            Ok(present) => {
                info!("{TAX_CURRENCY_COLUMN} present in {view}: {present}");
                present
            }
            Err(error) => {
                warn!("{TAX_CURRENCY_COLUMN} probe failed for {view}: {error}");
                false
            }
        }
    }

    fn resolve_group<D: DocumentQuery + ?Sized>(
        &mut self,
        document: &D,
        group: &MultiPathGroup,
        document_key: &str,
        run: &mut ValidationRun,
        processed: &mut Processed,
    ) -> Result<(), ValidateError> {
        processed.mark_group(group);

        let values = match GroupValues::collect(document, group) {
            Ok(values) => values,
            Err(error) if error.is_unsupported() => {
                warn!(
                    "skipping group {}.{}, locator is not a supported expression: {error}",
                    group.view, group.column
                );
                return Ok(());
            }
            Err(error) => {
                warn!("skipping group {}.{}: {error}", group.view, group.column);
                return Ok(());
            }
        };
        if values.is_empty() {
            info!("no values found for {}.{}", group.view, group.column);
            return Ok(());
        }
        for (locator, value) in values.produced() {
            debug!("{locator} -> {value}");
        }

        let Some(value) = values.consistent_value() else {
            info!(
                "inconsistent values for {}.{}: {}",
                group.view,
                group.column,
                values.joined_values()
            );
            run.push(ValidationResult::new(
                values.locator_label(),
                &group.view,
                &group.column,
                false,
                values.joined_values(),
                None,
            ));
            return Ok(());
        };

        let lookup = self.direct_lookup(&group.view, &group.column, value, document_key)?;
        info!(
            "validated {}.{} = {value}: {}",
            group.view,
            group.column,
            if lookup.matched { "MATCH" } else { "NO MATCH" }
        );
        run.push(ValidationResult::new(
            values.locator_label(),
            &group.view,
            &group.column,
            lookup.matched,
            value,
            lookup.stored_value,
        ));
        Ok(())
    }

    fn run_simple_mappings<D: DocumentQuery + ?Sized>(
        &mut self,
        document: &D,
        document_key: &str,
        run: &mut ValidationRun,
        processed: &Processed,
    ) -> Result<(), ValidateError> {
        let config = self.config;
        for mapping in config.mappings() {
            if processed.locators.contains(&mapping.locator) {
                debug!("skipping already processed locator {}", mapping.locator);
                continue;
            }
            let Some(value) = first_value(document, &mapping.locator) else {
                continue;
            };
            if value.trim().is_empty() {
                info!("empty tag at {}", mapping.locator);
                run.push(ValidationResult::empty_tag(
                    &mapping.locator,
                    &mapping.view,
                    &mapping.column,
                ));
                continue;
            }

            let lookup = match config.custom_query_for(&mapping.locator) {
                Some(custom) => self.custom_lookup(&custom.query, document_key, &value),
                None => self.direct_lookup(&mapping.view, &mapping.column, &value, document_key)?,
            };
            info!(
                "validated {}.{}: {}",
                mapping.view,
                mapping.column,
                if lookup.matched { "MATCH" } else { "NO MATCH" }
            );
            run.push(ValidationResult::new(
                &mapping.locator,
                &mapping.view,
                &mapping.column,
                lookup.matched,
                value,
                lookup.stored_value,
            ));
        }
        Ok(())
    }

    fn direct_lookup(
        &mut self,
        view: &str,
        column: &str,
        value: &str,
        document_key: &str,
    ) -> Result<Lookup, ValidateError> {
        self.cache
            .lookup_column(view, column, value, document_key)
            .map_err(|error| ValidateError::data_store(format!("failed to load view {view}"), error))
    }

    fn custom_lookup(&self, query: &str, document_key: &str, value: &str) -> Lookup {
        match self.cache.run_custom_query(query, document_key, value) {
            Ok(lookup) => lookup,
            Err(error) => {
                warn!("custom query failed, recording as mismatch: {error}");
                Lookup::unmatched(None)
            }
        }
    }
}

/// First selected value, or `None` when the locator matches nothing or fails.
fn first_value<D: DocumentQuery + ?Sized>(document: &D, locator: &str) -> Option<String> {
    match document.evaluate(locator) {
        Ok(values) => {
            let value = values.into_iter().next();
            if value.is_none() {
                debug!("locator {locator} matched nothing; skipping");
            }
            value
        }
        Err(error) if error.is_unsupported() => {
            warn!("skipping mapping, locator is not a supported expression: {error}");
            None
        }
        Err(error) => {
            warn!("locator evaluation failed: {error}");
            None
        }
    }
}
