use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use cloudops_common::{BatchReport, ItemFailure, ReaperConfig};
use cloudops_providers::inventory::InstanceFilter;
use cloudops_providers::CloudProvider;
use serde::Serialize;

use crate::action_log::{self, STOP_INSTANCE};

/// Mean of the samples rounded to 2 decimals. No samples means no usage: `0.0`.
pub fn average_utilization(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    (mean * 100.0).round() / 100.0
}

pub fn is_idle(avg_cpu: f64, threshold: f64) -> bool {
    avg_cpu < threshold
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceUsage {
    pub instance_id: String,
    pub name: String,
    pub avg_cpu: f64,
    pub idle: bool,
}

impl InstanceUsage {
    pub fn line(&self) -> String {
        format!(
            "{} ({}) → Avg CPU: {:?}%",
            self.instance_id, self.name, self.avg_cpu
        )
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ReaperReport {
    pub usage: Vec<InstanceUsage>,
    /// Instances whose metrics could not be read. They are never stopped.
    pub metric_failures: Vec<ItemFailure>,
    /// Stopped instance ids; `skipped` holds idle ones left running by a dry run.
    pub stops: BatchReport<String>,
}

impl ReaperReport {
    pub fn idle_ids(&self) -> Vec<String> {
        self.usage
            .iter()
            .filter(|u| u.idle)
            .map(|u| u.instance_id.clone())
            .collect()
    }

    pub fn render(&self, dry_run: bool) -> String {
        let mut out = String::from("Checking for idle instances...\n");
        for u in &self.usage {
            out.push_str(&u.line());
            out.push('\n');
        }
        for f in &self.metric_failures {
            out.push_str(&format!("{}: metrics unavailable ({})\n", f.item, f.error));
        }
        let idle = self.idle_ids();
        if idle.is_empty() {
            out.push_str("No idle instances found.\n");
        } else if dry_run {
            out.push_str(&format!("Would stop idle instances: {idle:?}\n"));
        } else {
            out.push_str(&format!("Stopping idle instances: {idle:?}\n"));
            for f in &self.stops.failed {
                out.push_str(&format!("Failed to stop {}: {}\n", f.item, f.error));
            }
        }
        out
    }
}

/// reap-idle: stop running instances whose trailing CPU average is below the threshold.
///
/// Listing running instances is the only fatal remote call. A metrics failure keeps
/// that instance out of the stop set; a stop failure does not affect the others.
pub async fn run_once(
    provider: &dyn CloudProvider,
    config: &ReaperConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<ReaperReport> {
    let start = Duration::try_days(config.window_days)
        .and_then(|window| now.checked_sub_signed(window))
        .with_context(|| format!("idle window of {} days is out of range", config.window_days))?;
    let instances = provider
        .list_instances(&config.zone, &InstanceFilter::running())
        .await
        .with_context(|| format!("failed to list running instances in {}", config.zone))?;
    let mut report = ReaperReport::default();

    for instance in &instances {
        let samples = match provider
            .cpu_utilization_samples(
                &config.zone,
                &instance.provider_id,
                start,
                now,
                config.period_secs,
            )
            .await
        {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(
                    instance_id = %instance.provider_id,
                    error_kind = e.kind(),
                    error = %e,
                    "could not read CPU metrics, leaving instance alone"
                );
                report.metric_failures.push(ItemFailure {
                    item: instance.provider_id.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let avg_cpu = average_utilization(&samples);
        let usage = InstanceUsage {
            instance_id: instance.provider_id.clone(),
            name: instance.display_name().to_string(),
            avg_cpu,
            idle: is_idle(avg_cpu, config.cpu_threshold),
        };
        tracing::info!(
            instance_id = %usage.instance_id,
            name = %usage.name,
            avg_cpu,
            samples = samples.len(),
            idle = usage.idle,
            "measured CPU"
        );
        report.usage.push(usage);
    }

    for instance_id in report.idle_ids() {
        if config.dry_run {
            report.stops.record_skip(instance_id);
            continue;
        }
        let result = action_log::tracked(
            STOP_INSTANCE,
            &instance_id,
            provider.stop_instance(&config.zone, &instance_id),
        )
        .await;
        match result {
            Ok(()) => report.stops.record_success(instance_id),
            Err(e) => report.stops.record_failure(instance_id, e),
        }
    }

    tracing::info!(
        checked = report.usage.len(),
        stopped = report.stops.succeeded.len(),
        failed = report.stops.failed.len(),
        dry_run = config.dry_run,
        "reap-idle finished"
    );
    Ok(report)
}
