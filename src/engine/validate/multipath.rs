use std::collections::BTreeSet;

use crate::domain::config::MultiPathGroup;
use crate::domain::error::LocatorError;
use crate::engine::DocumentQuery;

/// Non-blank values collected across every locator of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct GroupValues {
    distinct: BTreeSet<String>,
    producing: Vec<(String, String)>,
}

impl GroupValues {
    pub(crate) fn collect<D: DocumentQuery + ?Sized>(
        document: &D,
        group: &MultiPathGroup,
    ) -> Result<Self, LocatorError> {
        let mut values = Self::default();
        for locator in &group.locators {
            for raw in document.evaluate(locator)? {
                let value = raw.trim();
                if value.is_empty() {
                    continue;
                }
                values.distinct.insert(value.to_string());
                match values.producing.iter_mut().find(|(seen, _)| seen == locator) {
                    Some(entry) => entry.1 = value.to_string(),
                    None => values.producing.push((locator.clone(), value.to_string())),
                }
            }
        }
        Ok(values)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.distinct.is_empty()
    }

    /// The single value shared by every producing locator, if consistent.
    pub(crate) fn consistent_value(&self) -> Option<&str> {
        let mut iter = self.distinct.iter();
        match (iter.next(), iter.next()) {
            (Some(value), None) => Some(value),
            _ => None,
        }
    }

    /// Locators that produced a value, in configured order.
    pub(crate) fn locator_label(&self) -> String {
        self.producing
            .iter()
            .map(|(locator, _)| locator.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Each producing locator with the last value it yielded.
    pub(crate) fn produced(&self) -> &[(String, String)] {
        &self.producing
    }

    pub(crate) fn joined_values(&self) -> String {
        self.distinct
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
