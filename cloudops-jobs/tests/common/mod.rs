// Shared fixtures for the job tests.
#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use cloudops_common::{BackupConfig, JenkinsConfig, ReaperConfig, RetentionScope};
use cloudops_providers::ci::{BuildRecord, BuildResult};
use cloudops_providers::inventory::{DiscoveredInstance, SnapshotInfo};

pub const ZONE: &str = "fr-par-1";

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 6, 0, 0).unwrap()
}

pub fn instance(id: &str, name: Option<&str>, tags: &[&str], volumes: &[&str]) -> DiscoveredInstance {
    DiscoveredInstance {
        provider_id: id.to_string(),
        name: name.map(|n| n.to_string()),
        zone: ZONE.to_string(),
        state: "running".to_string(),
        volume_ids: volumes.iter().map(|v| v.to_string()).collect(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

pub fn snapshot(id: &str, created: NaiveDate, tags: &[&str]) -> SnapshotInfo {
    SnapshotInfo {
        snapshot_id: id.to_string(),
        name: format!("snapshot {id}"),
        volume_id: Some("vol-x".to_string()),
        created_at: Some(created.and_hms_opt(12, 0, 0).unwrap().and_utc()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

pub fn build(number: u64, result: Option<&str>) -> BuildRecord {
    BuildRecord {
        number,
        result: BuildResult::from_raw(result),
        url: format!("https://ci.example.com/job/my-app-deploy/{number}/"),
    }
}

pub fn jenkins_config() -> JenkinsConfig {
    JenkinsConfig {
        base_url: "https://ci.example.com".to_string(),
        job: "my-app-deploy".to_string(),
        username: "ci-bot".to_string(),
        api_token: "token".to_string(),
        build_window: 10,
    }
}

pub fn reaper_config() -> ReaperConfig {
    ReaperConfig {
        zone: ZONE.to_string(),
        cpu_threshold: 5.0,
        window_days: 2,
        period_secs: 3600,
        dry_run: false,
    }
}

pub fn backup_config() -> BackupConfig {
    BackupConfig {
        zone: ZONE.to_string(),
        backup_tag: "Backup=True".to_string(),
        retention_days: 7,
        retention_scope: RetentionScope::Managed,
        dry_run: false,
        skip_retention: false,
    }
}
