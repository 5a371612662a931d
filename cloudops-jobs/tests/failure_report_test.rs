#![cfg(feature = "provider-mock")]

mod common;

use cloudops_jobs::failure_report_job;
use cloudops_jobs::log_classifier::FailureCategory;
use cloudops_providers::mock::MockCiServer;
use common::{build, jenkins_config, today};

#[tokio::test]
async fn ten_builds_three_network_two_docker() {
    let mut ci = MockCiServer::new();
    for n in 1..=3 {
        ci = ci.with_build(
            build(100 - n, Some("FAILURE")),
            "Fetching deps...\nERROR: Connection refused (127.0.0.1:5432)\n",
        );
    }
    for n in 4..=5 {
        ci = ci.with_build(build(100 - n, Some("FAILURE")), "Step 4/7\ndocker build error: exit 2\n");
    }
    for n in 6..=10 {
        ci = ci.with_build(build(100 - n, Some("SUCCESS")), "Finished: SUCCESS\n");
    }

    let report = failure_report_job::run_once(&ci, &jenkins_config()).await.unwrap();

    assert_eq!(report.builds_examined, 10);
    assert_eq!(report.summary.count(FailureCategory::Network), 3);
    assert_eq!(report.summary.count(FailureCategory::DockerBuild), 2);
    assert_eq!(
        report.summary.lines(),
        vec![
            "Network Issue: 3 builds failed".to_string(),
            "Docker Build Error: 2 builds failed".to_string(),
        ]
    );
    assert_eq!(
        report.render(today()),
        "Jenkins Failure Summary for 2026-10-16\n\n\
         Network Issue: 3 builds failed\n\
         Docker Build Error: 2 builds failed\n"
    );
}

#[tokio::test]
async fn only_the_build_window_is_examined() {
    let mut ci = MockCiServer::new();
    for n in 0..12 {
        ci = ci.with_build(build(200 - n, Some("FAILURE")), "Timeout waiting for agent");
    }
    let mut config = jenkins_config();
    config.build_window = 10;

    let report = failure_report_job::run_once(&ci, &config).await.unwrap();

    assert_eq!(report.builds_examined, 10);
    assert_eq!(report.summary.count(FailureCategory::Timeout), 10);
    assert!(report.builds.succeeded.iter().all(|b| b.number > 190));
}

#[tokio::test]
async fn unfinished_and_aborted_builds_are_classified() {
    let ci = MockCiServer::new()
        .with_build(build(3, None), "still compiling...")
        .with_build(build(2, Some("ABORTED")), "Failed to download gradle-8.zip")
        .with_build(build(1, Some("SUCCESS")), "Connection refused");

    let report = failure_report_job::run_once(&ci, &jenkins_config()).await.unwrap();

    assert_eq!(report.summary.count(FailureCategory::Other), 1);
    assert_eq!(report.summary.count(FailureCategory::Dependency), 1);
    assert_eq!(report.summary.count(FailureCategory::Network), 0);
}

#[tokio::test]
async fn unreadable_log_does_not_stop_the_run() {
    let ci = MockCiServer::new()
        .with_build(build(5, Some("FAILURE")), "connection refused")
        .with_build(build(4, Some("FAILURE")), "never read")
        .with_build(build(3, Some("FAILURE")), "docker build failed")
        .fail_log(4);

    let report = failure_report_job::run_once(&ci, &jenkins_config()).await.unwrap();

    assert_eq!(report.summary.total(), 2);
    assert_eq!(report.builds.failed.len(), 1);
    assert_eq!(report.builds.failed[0].item, "#4");
    assert!(!report.render(today()).contains("#4"));
}

#[tokio::test]
async fn no_failures_prints_header_only() {
    let ci = MockCiServer::new()
        .with_build(build(2, Some("SUCCESS")), "")
        .with_build(build(1, Some("SUCCESS")), "");

    let report = failure_report_job::run_once(&ci, &jenkins_config()).await.unwrap();

    assert!(report.summary.is_empty());
    assert_eq!(report.render(today()), "Jenkins Failure Summary for 2026-10-16\n\n");
}

#[tokio::test]
async fn build_listing_failure_aborts() {
    let ci = MockCiServer::new()
        .with_build(build(1, Some("FAILURE")), "connection refused")
        .fail_listing();

    let err = failure_report_job::run_once(&ci, &jenkins_config())
        .await
        .unwrap_err();

    assert!(err
        .to_string()
        .contains("failed to list builds of job 'my-app-deploy'"));
}
