use anyhow::Context;
use chrono::NaiveDate;
use cloudops_common::{BatchReport, JenkinsConfig};
use cloudops_providers::CiServer;
use serde::Serialize;

use crate::log_classifier::{classify, render_report, summarize, FailureCategory, FailureSummary};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedBuild {
    pub number: u64,
    pub category: FailureCategory,
}

#[derive(Debug, Serialize)]
pub struct FailureReport {
    pub job: String,
    /// Builds inside the window, successful ones included.
    pub builds_examined: usize,
    pub summary: FailureSummary,
    /// Failed builds that were classified, plus those whose log could not be read.
    pub builds: BatchReport<ClassifiedBuild>,
}

impl FailureReport {
    pub fn render(&self, date: NaiveDate) -> String {
        render_report(date, &self.summary)
    }
}

/// ci-report: classify the non-successful builds among the most recent ones.
///
/// Only the build listing is fatal. A console log that can't be fetched is
/// recorded against its build and the loop moves on.
pub async fn run_once(ci: &dyn CiServer, config: &JenkinsConfig) -> anyhow::Result<FailureReport> {
    let builds = ci
        .list_builds(&config.job)
        .await
        .with_context(|| format!("failed to list builds of job '{}'", config.job))?;
    let window = &builds[..builds.len().min(config.build_window)];

    let mut report = BatchReport::new();
    for build in window.iter().filter(|b| !b.result.is_success()) {
        match ci.console_log(build).await {
            Ok(log) => {
                let category = classify(&log);
                tracing::debug!(build = build.number, result = ?build.result, %category, "classified");
                report.record_success(ClassifiedBuild {
                    number: build.number,
                    category,
                });
            }
            Err(e) => {
                tracing::warn!(
                    build = build.number,
                    error_kind = e.kind(),
                    error = %e,
                    "could not fetch console log"
                );
                report.record_failure(format!("#{}", build.number), e);
            }
        }
    }

    let summary = summarize(report.succeeded.iter().map(|b| b.category));
    tracing::info!(
        job = %config.job,
        examined = window.len(),
        failed = summary.total(),
        unreadable = report.failed.len(),
        "ci-report finished"
    );

    Ok(FailureReport {
        job: config.job.clone(),
        builds_examined: window.len(),
        summary,
        builds: report,
    })
}
