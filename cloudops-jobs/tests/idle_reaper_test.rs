#![cfg(feature = "provider-mock")]

mod common;

use chrono::Duration;
use cloudops_jobs::idle_reaper_job;
use cloudops_providers::mock::{MockCall, MockOp, MockProvider};
use common::{instance, now, reaper_config, ZONE};

#[tokio::test]
async fn stops_only_instances_below_threshold() {
    let provider = MockProvider::new()
        .with_instance(instance("srv-quiet", Some("batch"), &[], &[]))
        .with_instance(instance("srv-busy", Some("web"), &[], &[]))
        .with_instance(instance("srv-nodata", None, &[], &[]))
        .with_samples("srv-quiet", vec![1.0, 2.0, 3.0])
        .with_samples("srv-busy", vec![10.0, 2.0]);

    let report = idle_reaper_job::run_once(&provider, &reaper_config(), now())
        .await
        .unwrap();

    assert_eq!(report.usage.len(), 3);
    let busy = report.usage.iter().find(|u| u.instance_id == "srv-busy").unwrap();
    assert_eq!(busy.avg_cpu, 6.0);
    assert!(!busy.idle);
    let nodata = report.usage.iter().find(|u| u.instance_id == "srv-nodata").unwrap();
    assert_eq!(nodata.avg_cpu, 0.0);
    assert_eq!(nodata.name, "NoName");

    assert_eq!(report.stops.succeeded, vec!["srv-quiet", "srv-nodata"]);
    assert_eq!(provider.instance_state("srv-quiet").as_deref(), Some("stopped"));
    assert_eq!(provider.instance_state("srv-busy").as_deref(), Some("running"));
}

#[tokio::test]
async fn queries_trailing_window_hourly() {
    let provider = MockProvider::new().with_instance(instance("srv-1", None, &[], &[]));

    idle_reaper_job::run_once(&provider, &reaper_config(), now())
        .await
        .unwrap();

    let samples_call = provider
        .calls()
        .into_iter()
        .find(|c| matches!(c, MockCall::CpuSamples { .. }))
        .unwrap();
    let MockCall::CpuSamples { start, end, period_secs, .. } = samples_call else {
        unreachable!()
    };
    assert_eq!(end, now());
    assert_eq!(end - start, Duration::days(2));
    assert_eq!(period_secs, 3600);
}

#[tokio::test]
async fn one_failed_stop_does_not_block_the_rest() {
    let provider = MockProvider::new()
        .with_instance(instance("srv-a", None, &[], &[]))
        .with_instance(instance("srv-b", None, &[], &[]))
        .with_instance(instance("srv-c", None, &[], &[]))
        .fail_on(MockOp::StopInstance, "srv-b");

    let report = idle_reaper_job::run_once(&provider, &reaper_config(), now())
        .await
        .unwrap();

    assert_eq!(report.stops.succeeded, vec!["srv-a", "srv-c"]);
    assert_eq!(report.stops.failed.len(), 1);
    assert_eq!(report.stops.failed[0].item, "srv-b");
    assert!(report.render(false).contains("Failed to stop srv-b"));
}

#[tokio::test]
async fn metrics_failure_keeps_instance_running() {
    let provider = MockProvider::new()
        .with_instance(instance("srv-a", None, &[], &[]))
        .with_instance(instance("srv-b", None, &[], &[]))
        .fail_on(MockOp::CpuSamples, "srv-a");

    let report = idle_reaper_job::run_once(&provider, &reaper_config(), now())
        .await
        .unwrap();

    assert_eq!(report.metric_failures.len(), 1);
    assert_eq!(report.metric_failures[0].item, "srv-a");
    assert_eq!(report.stops.succeeded, vec!["srv-b"]);
    assert_eq!(provider.instance_state("srv-a").as_deref(), Some("running"));
}

#[tokio::test]
async fn dry_run_issues_no_stop_calls() {
    let provider = MockProvider::new().with_instance(instance("srv-a", None, &[], &[]));
    let mut config = reaper_config();
    config.dry_run = true;

    let report = idle_reaper_job::run_once(&provider, &config, now()).await.unwrap();

    assert_eq!(report.stops.skipped, vec!["srv-a"]);
    assert!(report.stops.succeeded.is_empty());
    assert!(!provider
        .calls()
        .iter()
        .any(|c| matches!(c, MockCall::StopInstance { .. })));
    assert!(report.render(true).contains("Would stop idle instances"));
}

#[tokio::test]
async fn listing_failure_aborts() {
    let provider = MockProvider::new().fail_on(MockOp::ListInstances, ZONE);

    let err = idle_reaper_job::run_once(&provider, &reaper_config(), now())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("failed to list running instances"));
}

#[tokio::test]
async fn stopped_instances_are_not_considered() {
    let mut stopped = instance("srv-off", None, &[], &[]);
    stopped.state = "stopped".to_string();
    let provider = MockProvider::new().with_instance(stopped);

    let report = idle_reaper_job::run_once(&provider, &reaper_config(), now())
        .await
        .unwrap();

    assert!(report.usage.is_empty());
    assert!(report.render(false).ends_with("No idle instances found.\n"));
}

#[tokio::test]
async fn out_of_range_window_is_rejected() {
    let provider = MockProvider::new().with_instance(instance("srv-a", None, &[], &[]));
    let mut config = reaper_config();
    config.window_days = 100_000_000;

    let err = idle_reaper_job::run_once(&provider, &config, now())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("out of range"));
    assert_eq!(provider.instance_state("srv-a").as_deref(), Some("running"));
}
