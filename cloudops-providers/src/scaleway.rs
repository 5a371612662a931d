use crate::error::{ProviderError, ProviderResult};
use crate::http::{ensure_success, read_json};
use crate::{inventory, CloudProvider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudops_common::ScalewaySettings;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

const PER_PAGE: usize = 100;

pub struct ScalewayProvider {
    client: Client,
    project_id: String,
    secret_key: String,
    api_url: String,
    metrics_url: Option<String>,
    metrics_token: Option<String>,
    cpu_query: String,
}

#[derive(Deserialize)]
struct ServerList {
    #[serde(default)]
    servers: Vec<Server>,
}

#[derive(Deserialize)]
struct Server {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    state: String,
    #[serde(default)]
    tags: Vec<String>,
    // Keyed by attachment index ("0", "1", ...).
    #[serde(default)]
    volumes: BTreeMap<String, VolumeRef>,
}

#[derive(Deserialize)]
struct VolumeRef {
    id: String,
}

#[derive(Deserialize)]
struct SnapshotEnvelope {
    snapshot: SnapshotBody,
}

#[derive(Deserialize)]
struct SnapshotList {
    #[serde(default)]
    snapshots: Vec<SnapshotBody>,
}

#[derive(Deserialize)]
struct SnapshotBody {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    base_volume: Option<VolumeRef>,
    #[serde(default)]
    creation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Vec<String>,
}

impl From<SnapshotBody> for inventory::SnapshotInfo {
    fn from(s: SnapshotBody) -> Self {
        inventory::SnapshotInfo {
            snapshot_id: s.id,
            name: s.name,
            volume_id: s.base_volume.map(|v| v.id),
            created_at: s.creation_date,
            tags: s.tags,
        }
    }
}

#[derive(Deserialize)]
struct PromResponse {
    status: String,
    #[serde(default)]
    data: Option<PromData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct PromData {
    #[serde(default)]
    result: Vec<PromSeries>,
}

#[derive(Deserialize)]
struct PromSeries {
    #[serde(default)]
    values: Vec<(f64, String)>,
}

impl ScalewayProvider {
    pub fn new(settings: &ScalewaySettings) -> ProviderResult<Self> {
        // No overall timeout by default in reqwest; a stalled API would hang the job.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self {
            client,
            project_id: settings.project_id.trim().to_string(),
            secret_key: settings.secret_key.trim().to_string(),
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            metrics_url: settings.metrics_url.clone(),
            metrics_token: settings.metrics_token.clone(),
            cpu_query: settings.cpu_query.clone(),
        })
    }

    fn zone_url(&self, zone: &str, path: &str) -> String {
        format!("{}/instance/v1/zones/{}/{}", self.api_url, zone, path)
    }

    fn parse_samples(body: PromResponse) -> ProviderResult<Vec<f64>> {
        if body.status != "success" {
            return Err(ProviderError::MalformedResponse(format!(
                "metrics query status={} error={}",
                body.status,
                body.error.unwrap_or_default()
            )));
        }
        let mut samples = Vec::new();
        for series in body.data.map(|d| d.result).unwrap_or_default() {
            for (_ts, raw) in series.values {
                let value: f64 = raw.parse().map_err(|_| {
                    ProviderError::MalformedResponse(format!("non-numeric sample '{raw}'"))
                })?;
                // Prometheus encodes gaps as NaN.
                if value.is_finite() {
                    samples.push(value);
                }
            }
        }
        Ok(samples)
    }
}

#[async_trait]
impl CloudProvider for ScalewayProvider {
    fn provider_code(&self) -> &'static str {
        "scaleway"
    }

    async fn list_instances(
        &self,
        zone: &str,
        filter: &inventory::InstanceFilter,
    ) -> ProviderResult<Vec<inventory::DiscoveredInstance>> {
        let url = self.zone_url(zone, "servers");
        let mut out = Vec::new();
        let mut page = 1usize;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("project", self.project_id.clone()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            if let Some(state) = &filter.state {
                query.push(("state", state.clone()));
            }
            if let Some(tag) = &filter.tag {
                query.push(("tags", tag.clone()));
            }

            tracing::debug!(%url, page, "[Scaleway API] GET servers");
            let resp = self
                .client
                .get(&url)
                .header("X-Auth-Token", &self.secret_key)
                .query(&query)
                .send()
                .await?;
            let body: ServerList = read_json(resp, "servers").await?;
            let fetched = body.servers.len();

            out.extend(body.servers.into_iter().map(|s| inventory::DiscoveredInstance {
                provider_id: s.id,
                name: s.name.filter(|n| !n.trim().is_empty()),
                zone: zone.to_string(),
                state: s.state,
                volume_ids: s.volumes.into_values().map(|v| v.id).collect(),
                tags: s.tags,
            }));

            if fetched < PER_PAGE {
                break;
            }
            page += 1;
        }

        // The API filters server-side; keep the same contract for callers regardless.
        out.retain(|i| filter.matches(i));
        Ok(out)
    }

    async fn cpu_utilization_samples(
        &self,
        _zone: &str,
        instance_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        period_secs: u32,
    ) -> ProviderResult<Vec<f64>> {
        let Some(metrics_url) = self.metrics_url.as_deref() else {
            return Err(ProviderError::Unsupported("SCALEWAY_METRICS_URL"));
        };
        let url = format!("{metrics_url}/prometheus/api/v1/query_range");
        let query = self.cpu_query.replace("{instance_id}", instance_id);

        let mut req = self.client.get(&url).query(&[
            ("query", query),
            ("start", start.timestamp().to_string()),
            ("end", end.timestamp().to_string()),
            ("step", format!("{period_secs}s")),
        ]);
        if let Some(token) = &self.metrics_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let body: PromResponse = read_json(resp, "cpu metrics").await?;
        Self::parse_samples(body)
    }

    async fn stop_instance(&self, zone: &str, instance_id: &str) -> ProviderResult<()> {
        let url = self.zone_url(zone, &format!("servers/{instance_id}/action"));
        tracing::debug!(%url, instance_id, "[Scaleway API] POST poweroff");
        let resp = self
            .client
            .post(&url)
            .header("X-Auth-Token", &self.secret_key)
            .json(&json!({ "action": "poweroff" }))
            .send()
            .await?;
        ensure_success(resp, &format!("server {instance_id}")).await?;
        Ok(())
    }

    async fn create_snapshot(
        &self,
        zone: &str,
        volume_id: &str,
        name: &str,
    ) -> ProviderResult<String> {
        let url = self.zone_url(zone, "snapshots");
        tracing::debug!(%url, volume_id, name, "[Scaleway API] POST snapshot");
        let resp = self
            .client
            .post(&url)
            .header("X-Auth-Token", &self.secret_key)
            .json(&json!({
                "name": name,
                "volume_id": volume_id,
                "project": self.project_id,
            }))
            .send()
            .await?;
        let body: SnapshotEnvelope = read_json(resp, &format!("volume {volume_id}")).await?;
        Ok(body.snapshot.id)
    }

    async fn tag_snapshot(
        &self,
        zone: &str,
        snapshot_id: &str,
        tags: &[inventory::ResourceTag],
    ) -> ProviderResult<()> {
        let url = self.zone_url(zone, &format!("snapshots/{snapshot_id}"));
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        let resp = self
            .client
            .patch(&url)
            .header("X-Auth-Token", &self.secret_key)
            .json(&json!({ "tags": tags }))
            .send()
            .await?;
        ensure_success(resp, &format!("snapshot {snapshot_id}")).await?;
        Ok(())
    }

    async fn list_owned_snapshots(
        &self,
        zone: &str,
    ) -> ProviderResult<Vec<inventory::SnapshotInfo>> {
        let url = self.zone_url(zone, "snapshots");
        let mut out = Vec::new();
        let mut page = 1usize;

        loop {
            let resp = self
                .client
                .get(&url)
                .header("X-Auth-Token", &self.secret_key)
                .query(&[
                    ("project", self.project_id.clone()),
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await?;
            let body: SnapshotList = read_json(resp, "snapshots").await?;
            let fetched = body.snapshots.len();
            out.extend(body.snapshots.into_iter().map(inventory::SnapshotInfo::from));
            if fetched < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(out)
    }

    async fn delete_snapshot(&self, zone: &str, snapshot_id: &str) -> ProviderResult<()> {
        let url = self.zone_url(zone, &format!("snapshots/{snapshot_id}"));
        tracing::debug!(%url, snapshot_id, "[Scaleway API] DELETE snapshot");
        let resp = self
            .client
            .delete(&url)
            .header("X-Auth-Token", &self.secret_key)
            .send()
            .await?;
        ensure_success(resp, &format!("snapshot {snapshot_id}")).await?;
        Ok(())
    }
}
