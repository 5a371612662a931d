use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use cloudops_common::{BackupConfig, BatchReport, RetentionScope};
use cloudops_providers::inventory::{InstanceFilter, ResourceTag, SnapshotInfo};
use cloudops_providers::CloudProvider;
use serde::Serialize;

use crate::action_log::{self, CREATE_SNAPSHOT, DELETE_SNAPSHOT, TAG_SNAPSHOT};

/// Tag written on every snapshot this job creates; retention keys off it.
pub const CREATED_ON_TAG: &str = "CreatedOn";
pub const NAME_TAG: &str = "Name";

pub fn snapshot_name(instance_id: &str, today: NaiveDate) -> String {
    format!("Backup-{}-{}", instance_id, today.format("%Y-%m-%d"))
}

/// Strictly older than `today - retention_days`, compared by calendar date.
/// A cutoff outside chrono's date range expires nothing.
pub fn is_expired(created_at: DateTime<Utc>, today: NaiveDate, retention_days: i64) -> bool {
    Duration::try_days(retention_days)
        .and_then(|window| today.checked_sub_signed(window))
        .is_some_and(|cutoff| created_at.date_naive() < cutoff)
}

pub fn in_scope(snapshot: &SnapshotInfo, scope: RetentionScope) -> bool {
    match scope {
        RetentionScope::AllOwned => true,
        RetentionScope::Managed => snapshot.has_tag_key(CREATED_ON_TAG),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedSnapshot {
    pub instance_id: String,
    pub volume_id: String,
    pub snapshot_id: String,
}

#[derive(Debug, Default, Serialize)]
pub struct BackupReport {
    /// `skipped` holds `(instance, volume)` pairs a dry run would have snapshotted,
    /// with an empty snapshot id.
    pub snapshots: BatchReport<CreatedSnapshot>,
    /// Deleted snapshot ids; `skipped` holds expired ones left by a dry run.
    pub retention: BatchReport<String>,
    /// Snapshots examined by retention and kept (too young, out of scope, undated).
    pub kept: usize,
    pub retention_ran: bool,
}

impl BackupReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for s in &self.snapshots.succeeded {
            out.push_str(&format!(
                "Created snapshot {} of {} for {}\n",
                s.snapshot_id, s.volume_id, s.instance_id
            ));
        }
        for s in &self.snapshots.skipped {
            out.push_str(&format!(
                "Would snapshot {} for {}\n",
                s.volume_id, s.instance_id
            ));
        }
        for f in &self.snapshots.failed {
            out.push_str(&format!("Snapshot failed for {}: {}\n", f.item, f.error));
        }
        for id in &self.retention.succeeded {
            out.push_str(&format!("Deleted old snapshot: {id}\n"));
        }
        for id in &self.retention.skipped {
            out.push_str(&format!("Would delete old snapshot: {id}\n"));
        }
        for f in &self.retention.failed {
            out.push_str(&format!("Delete failed for {}: {}\n", f.item, f.error));
        }
        out.push_str(&self.snapshots.summary_line("snapshots"));
        out.push('\n');
        if self.retention_ran {
            out.push_str(&self.retention.summary_line("retention"));
            out.push_str(&format!(", {} kept\n", self.kept));
        }
        out
    }
}

/// Snapshot every attached volume of every instance carrying the backup tag.
///
/// Create and tag are two calls with nothing tying them together. If tagging
/// fails the snapshot exists untagged; that volume is reported as failed with
/// the snapshot id so it can be fixed by hand.
pub async fn snapshot_tagged_instances(
    provider: &dyn CloudProvider,
    config: &BackupConfig,
    today: NaiveDate,
    report: &mut BatchReport<CreatedSnapshot>,
) -> anyhow::Result<()> {
    let instances = provider
        .list_instances(&config.zone, &InstanceFilter::tagged(&config.backup_tag))
        .await
        .with_context(|| format!("failed to list instances tagged {}", config.backup_tag))?;
    let date = today.format("%Y-%m-%d").to_string();

    for instance in &instances {
        tracing::info!(instance_id = %instance.provider_id, volumes = instance.volume_ids.len(), "creating snapshots");
        let name = snapshot_name(&instance.provider_id, today);

        for volume_id in &instance.volume_ids {
            let item = format!("{} ({})", volume_id, instance.provider_id);
            if config.dry_run {
                report.record_skip(CreatedSnapshot {
                    instance_id: instance.provider_id.clone(),
                    volume_id: volume_id.clone(),
                    snapshot_id: String::new(),
                });
                continue;
            }

            let created = action_log::tracked(
                CREATE_SNAPSHOT,
                volume_id,
                provider.create_snapshot(&config.zone, volume_id, &name),
            )
            .await;
            let snapshot_id = match created {
                Ok(id) => id,
                Err(e) => {
                    report.record_failure(item, e);
                    continue;
                }
            };

            let tags = [
                ResourceTag::new(NAME_TAG, name.as_str()),
                ResourceTag::new(CREATED_ON_TAG, date.as_str()),
            ];
            let tagged = action_log::tracked(
                TAG_SNAPSHOT,
                &snapshot_id,
                provider.tag_snapshot(&config.zone, &snapshot_id, &tags),
            )
            .await;
            match tagged {
                Ok(()) => report.record_success(CreatedSnapshot {
                    instance_id: instance.provider_id.clone(),
                    volume_id: volume_id.clone(),
                    snapshot_id,
                }),
                Err(e) => {
                    tracing::error!(
                        snapshot_id = %snapshot_id,
                        volume_id = %volume_id,
                        error = %e,
                        "snapshot created but left untagged"
                    );
                    report.record_failure(item, format!("snapshot {snapshot_id} created but untagged: {e}"));
                }
            }
        }
    }
    Ok(())
}

/// Delete owned snapshots whose creation date is before `today - retention_days`.
///
/// Returns how many snapshots were examined and kept.
pub async fn prune_expired_snapshots(
    provider: &dyn CloudProvider,
    config: &BackupConfig,
    today: NaiveDate,
    report: &mut BatchReport<String>,
) -> anyhow::Result<usize> {
    if config.retention_scope == RetentionScope::AllOwned {
        tracing::warn!(
            "retention scope is all_owned: snapshots not created by this job are eligible for deletion"
        );
    }

    let snapshots = provider
        .list_owned_snapshots(&config.zone)
        .await
        .with_context(|| format!("failed to list snapshots in {}", config.zone))?;

    let mut kept = 0usize;
    for snapshot in &snapshots {
        let Some(created_at) = snapshot.created_at else {
            tracing::debug!(snapshot_id = %snapshot.snapshot_id, "no creation date, keeping");
            kept += 1;
            continue;
        };
        if !in_scope(snapshot, config.retention_scope)
            || !is_expired(created_at, today, config.retention_days)
        {
            kept += 1;
            continue;
        }

        if config.dry_run {
            report.record_skip(snapshot.snapshot_id.clone());
            continue;
        }
        let result = action_log::tracked(
            DELETE_SNAPSHOT,
            &snapshot.snapshot_id,
            provider.delete_snapshot(&config.zone, &snapshot.snapshot_id),
        )
        .await;
        match result {
            Ok(()) => report.record_success(snapshot.snapshot_id.clone()),
            Err(e) => report.record_failure(snapshot.snapshot_id.clone(), e),
        }
    }
    Ok(kept)
}

/// backup: snapshot phase, then retention phase.
///
/// Retention still runs when the snapshot phase could not even list instances;
/// the first error is returned once both phases had their chance.
pub async fn run_once(
    provider: &dyn CloudProvider,
    config: &BackupConfig,
    today: NaiveDate,
) -> anyhow::Result<BackupReport> {
    let mut report = BackupReport::default();

    let snapshot_phase =
        snapshot_tagged_instances(provider, config, today, &mut report.snapshots).await;
    if let Err(e) = &snapshot_phase {
        tracing::error!(error = %e, "snapshot phase aborted");
    }

    let mut retention_phase = Ok(());
    if !config.skip_retention {
        report.retention_ran = true;
        match prune_expired_snapshots(provider, config, today, &mut report.retention).await {
            Ok(kept) => report.kept = kept,
            Err(e) => {
                tracing::error!(error = %e, "retention phase aborted");
                retention_phase = Err(e);
            }
        }
    }

    tracing::info!(
        created = report.snapshots.succeeded.len(),
        snapshot_failures = report.snapshots.failed.len(),
        deleted = report.retention.succeeded.len(),
        delete_failures = report.retention.failed.len(),
        dry_run = config.dry_run,
        "backup finished"
    );

    snapshot_phase?;
    retention_phase?;
    Ok(report)
}
