//! Console-log failure classification.
//!
//! `classify` is a pure ordered-rule lookup; `summarize` folds a sequence of
//! categories into a `FailureSummary`. Printing lives with the caller.

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FailureCategory {
    Timeout,
    Network,
    Dependency,
    DockerBuild,
    Other,
}

impl FailureCategory {
    /// Priority order; `classify` tests rules in this order.
    pub const ALL: [FailureCategory; 5] = [
        FailureCategory::Timeout,
        FailureCategory::Network,
        FailureCategory::Dependency,
        FailureCategory::DockerBuild,
        FailureCategory::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FailureCategory::Timeout => "Timeout Issue",
            FailureCategory::Network => "Network Issue",
            FailureCategory::Dependency => "Dependency Issue",
            FailureCategory::DockerBuild => "Docker Build Error",
            FailureCategory::Other => "Other Failure",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn dependency_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)failed to download|dependency").expect("static dependency pattern")
    })
}

/// First matching rule wins. Matching is case-insensitive; there is no error case.
pub fn classify(log_text: &str) -> FailureCategory {
    let lower = log_text.to_lowercase();
    if lower.contains("timeout") {
        FailureCategory::Timeout
    } else if lower.contains("connection refused") {
        FailureCategory::Network
    } else if dependency_pattern().is_match(log_text) {
        FailureCategory::Dependency
    } else if lower.contains("docker build") {
        FailureCategory::DockerBuild
    } else {
        FailureCategory::Other
    }
}

/// Count of failed builds per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureSummary {
    counts: [usize; 5],
}

impl FailureSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the accumulator with `category` counted once more.
    pub fn add(mut self, category: FailureCategory) -> Self {
        self.counts[category.index()] += 1;
        self
    }

    pub fn count(&self, category: FailureCategory) -> usize {
        self.counts[category.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Non-zero categories, in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (FailureCategory, usize)> + '_ {
        FailureCategory::ALL
            .iter()
            .map(|c| (*c, self.count(*c)))
            .filter(|(_, n)| *n > 0)
    }

    pub fn lines(&self) -> Vec<String> {
        self.iter()
            .map(|(c, n)| format!("{}: {} builds failed", c.label(), n))
            .collect()
    }
}

impl Serialize for FailureSummary {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(None)?;
        for (category, count) in self.iter() {
            map.serialize_entry(category.label(), &count)?;
        }
        map.end()
    }
}

pub fn summarize<I>(categories: I) -> FailureSummary
where
    I: IntoIterator<Item = FailureCategory>,
{
    categories
        .into_iter()
        .fold(FailureSummary::new(), FailureSummary::add)
}

pub fn render_report(date: NaiveDate, summary: &FailureSummary) -> String {
    let mut out = format!("Jenkins Failure Summary for {}\n\n", date.format("%Y-%m-%d"));
    for line in summary.lines() {
        out.push_str(&line);
        out.push('\n');
    }
    out
}
