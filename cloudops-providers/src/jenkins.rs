use crate::ci::{BuildRecord, BuildResult};
use crate::error::{ProviderError, ProviderResult};
use crate::http::{read_json, read_text};
use crate::CiServer;
use async_trait::async_trait;
use cloudops_common::JenkinsConfig;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const BUILDS_TREE: &str = "builds[number,result,url]";

pub struct JenkinsClient {
    client: Client,
    base_url: String,
    username: String,
    api_token: String,
}

#[derive(Deserialize)]
struct JobBuilds {
    #[serde(default)]
    builds: Vec<RawBuild>,
}

#[derive(Deserialize)]
struct RawBuild {
    number: u64,
    result: Option<String>,
    url: String,
}

impl From<RawBuild> for BuildRecord {
    fn from(raw: RawBuild) -> Self {
        BuildRecord {
            number: raw.number,
            result: BuildResult::from_raw(raw.result.as_deref()),
            url: raw.url,
        }
    }
}

impl JenkinsClient {
    pub fn new(config: &JenkinsConfig) -> ProviderResult<Self> {
        // Console logs can be large; give reads more room than the connect.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            api_token: config.api_token.clone(),
        })
    }

    /// `team/app` lives at `/job/team/job/app`.
    fn job_path(job: &str) -> String {
        job.split('/')
            .filter(|s| !s.is_empty())
            .map(|s| format!("/job/{s}"))
            .collect()
    }

    fn console_url(build: &BuildRecord) -> String {
        if build.url.ends_with('/') {
            format!("{}consoleText", build.url)
        } else {
            format!("{}/consoleText", build.url)
        }
    }
}

#[async_trait]
impl CiServer for JenkinsClient {
    async fn list_builds(&self, job: &str) -> ProviderResult<Vec<BuildRecord>> {
        let url = format!("{}{}/api/json", self.base_url, Self::job_path(job));
        tracing::debug!(%url, "listing builds");

        let resp = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.api_token))
            .query(&[("tree", BUILDS_TREE)])
            .send()
            .await?;
        let body: JobBuilds = read_json(resp, &format!("job {job}")).await?;
        Ok(body.builds.into_iter().map(BuildRecord::from).collect())
    }

    async fn console_log(&self, build: &BuildRecord) -> ProviderResult<String> {
        if build.url.trim().is_empty() {
            return Err(ProviderError::MalformedResponse(format!(
                "build #{} has no url",
                build.number
            )));
        }
        let url = Self::console_url(build);
        let resp = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.api_token))
            .send()
            .await?;
        read_text(resp, &format!("console log of build #{}", build.number)).await
    }
}
