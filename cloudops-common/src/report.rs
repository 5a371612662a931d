use serde::Serialize;
use std::fmt;

/// One item of a batch that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub error: String,
}

/// Per-item outcome of a batch of remote calls.
///
/// Jobs keep going after a single item fails; the failure lands here instead of
/// aborting the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<ItemFailure>,
    /// Items that qualified but were deliberately left alone (dry run).
    pub skipped: Vec<T>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, item: T) {
        self.succeeded.push(item);
    }

    pub fn record_failure(&mut self, item: impl Into<String>, error: impl fmt::Display) {
        self.failed.push(ItemFailure {
            item: item.into(),
            error: error.to_string(),
        });
    }

    pub fn record_skip(&mut self, item: T) {
        self.skipped.push(item);
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// `"<label>: 3 ok, 1 failed, 0 skipped"`
    pub fn summary_line(&self, label: &str) -> String {
        format!(
            "{}: {} ok, {} failed, {} skipped",
            label,
            self.succeeded.len(),
            self.failed.len(),
            self.skipped.len()
        )
    }
}
