use cloudops_common::JenkinsConfig;
use cloudops_providers::ci::BuildResult;
use cloudops_providers::jenkins::JenkinsClient;
use cloudops_providers::{CiServer, ProviderError};
use mockito::{Matcher, Server};
use serde_json::json;

// base64("ci-bot:s3cr3t")
const BASIC_AUTH: &str = "Basic Y2ktYm90OnMzY3IzdA==";

fn config(base_url: String) -> JenkinsConfig {
    JenkinsConfig {
        base_url,
        job: "my-app-deploy".to_string(),
        username: "ci-bot".to_string(),
        api_token: "s3cr3t".to_string(),
        build_window: 10,
    }
}

#[tokio::test]
async fn lists_builds_with_basic_auth() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let mock = server
        .mock("GET", "/job/my-app-deploy/api/json")
        .match_query(Matcher::UrlEncoded(
            "tree".into(),
            "builds[number,result,url]".into(),
        ))
        .match_header("authorization", BASIC_AUTH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "_class": "hudson.model.FreeStyleProject",
                "builds": [
                    { "number": 42, "result": null, "url": format!("{base}/job/my-app-deploy/42/") },
                    { "number": 41, "result": "FAILURE", "url": format!("{base}/job/my-app-deploy/41/") },
                    { "number": 40, "result": "SUCCESS", "url": format!("{base}/job/my-app-deploy/40/") }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = JenkinsClient::new(&config(base.clone())).unwrap();
    let builds = client.list_builds("my-app-deploy").await.unwrap();

    assert_eq!(builds.len(), 3);
    assert_eq!(builds[0].number, 42);
    assert_eq!(builds[0].result, BuildResult::Other("IN_PROGRESS".into()));
    assert_eq!(builds[1].result, BuildResult::Failure);
    assert!(builds[2].result.is_success());
    mock.assert_async().await;
}

#[tokio::test]
async fn fetches_console_text() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let mock = server
        .mock("GET", "/job/my-app-deploy/41/consoleText")
        .match_header("authorization", BASIC_AUTH)
        .with_status(200)
        .with_body("Step 3/9 : RUN make\nERROR: Connection refused\n")
        .create_async()
        .await;

    let client = JenkinsClient::new(&config(base.clone())).unwrap();
    let build = cloudops_providers::ci::BuildRecord {
        number: 41,
        result: BuildResult::Failure,
        url: format!("{base}/job/my-app-deploy/41/"),
    };
    let log = client.console_log(&build).await.unwrap();

    assert!(log.contains("Connection refused"));
    mock.assert_async().await;
}

#[tokio::test]
async fn bad_credentials_are_auth_errors() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/job/my-app-deploy/api/json")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body("Invalid password/token for user: ci-bot")
        .create_async()
        .await;

    let client = JenkinsClient::new(&config(server.url())).unwrap();
    let err = client.list_builds("my-app-deploy").await.unwrap_err();

    assert!(err.is_auth(), "unexpected error: {err:?}");
}

#[tokio::test]
async fn unexpected_payload_is_malformed() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/job/my-app-deploy/api/json")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>Jenkins is starting</html>")
        .create_async()
        .await;

    let client = JenkinsClient::new(&config(server.url())).unwrap();
    let err = client.list_builds("my-app-deploy").await.unwrap_err();

    assert!(matches!(err, ProviderError::MalformedResponse(_)));
}
