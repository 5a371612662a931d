//! In-memory provider and CI server.
//!
//! Used by `PROVIDER=mock` for local runs and by the job tests. Every call is
//! recorded, and any operation can be made to fail for a given resource id.

use crate::ci::BuildRecord;
use crate::error::{ProviderError, ProviderResult};
use crate::{inventory, CiServer, CloudProvider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MockOp {
    ListInstances,
    CpuSamples,
    StopInstance,
    CreateSnapshot,
    TagSnapshot,
    ListSnapshots,
    DeleteSnapshot,
    ListBuilds,
    ConsoleLog,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MockCall {
    ListInstances { zone: String, filter: inventory::InstanceFilter },
    CpuSamples { instance_id: String, start: DateTime<Utc>, end: DateTime<Utc>, period_secs: u32 },
    StopInstance { instance_id: String },
    CreateSnapshot { volume_id: String, name: String },
    TagSnapshot { snapshot_id: String, tags: Vec<inventory::ResourceTag> },
    ListSnapshots { zone: String },
    DeleteSnapshot { snapshot_id: String },
}

#[derive(Default)]
struct MockState {
    instances: Vec<inventory::DiscoveredInstance>,
    samples: HashMap<String, Vec<f64>>,
    snapshots: Vec<inventory::SnapshotInfo>,
    failures: HashSet<(MockOp, String)>,
    calls: Vec<MockCall>,
    next_snapshot: u64,
}

#[derive(Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
}

fn injected(op: MockOp, id: &str) -> ProviderError {
    ProviderError::Api {
        status: 500,
        body: format!("injected {op:?} failure for {id}"),
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not take the other assertions down with it.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_instance(self, instance: inventory::DiscoveredInstance) -> Self {
        self.state().instances.push(instance);
        self
    }

    pub fn with_samples(self, instance_id: &str, samples: Vec<f64>) -> Self {
        self.state().samples.insert(instance_id.to_string(), samples);
        self
    }

    pub fn with_snapshot(self, snapshot: inventory::SnapshotInfo) -> Self {
        self.state().snapshots.push(snapshot);
        self
    }

    /// Make `op` fail for `id` (instance, volume, snapshot id or build number).
    /// `ListInstances` and `ListSnapshots` take the zone as id.
    pub fn fail_on(self, op: MockOp, id: &str) -> Self {
        self.state().failures.insert((op, id.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    pub fn snapshots(&self) -> Vec<inventory::SnapshotInfo> {
        self.state().snapshots.clone()
    }

    pub fn instance_state(&self, instance_id: &str) -> Option<String> {
        self.state()
            .instances
            .iter()
            .find(|i| i.provider_id == instance_id)
            .map(|i| i.state.clone())
    }

    fn check(&self, state: &MockState, op: MockOp, id: &str) -> ProviderResult<()> {
        if state.failures.contains(&(op, id.to_string())) {
            return Err(injected(op, id));
        }
        Ok(())
    }
}

#[async_trait]
impl CloudProvider for MockProvider {
    fn provider_code(&self) -> &'static str {
        "mock"
    }

    async fn list_instances(
        &self,
        zone: &str,
        filter: &inventory::InstanceFilter,
    ) -> ProviderResult<Vec<inventory::DiscoveredInstance>> {
        let mut state = self.state();
        state.calls.push(MockCall::ListInstances {
            zone: zone.to_string(),
            filter: filter.clone(),
        });
        self.check(&state, MockOp::ListInstances, zone)?;
        Ok(state
            .instances
            .iter()
            .filter(|i| i.zone == zone && filter.matches(i))
            .cloned()
            .collect())
    }

    async fn cpu_utilization_samples(
        &self,
        _zone: &str,
        instance_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        period_secs: u32,
    ) -> ProviderResult<Vec<f64>> {
        let mut state = self.state();
        state.calls.push(MockCall::CpuSamples {
            instance_id: instance_id.to_string(),
            start,
            end,
            period_secs,
        });
        self.check(&state, MockOp::CpuSamples, instance_id)?;
        Ok(state.samples.get(instance_id).cloned().unwrap_or_default())
    }

    async fn stop_instance(&self, _zone: &str, instance_id: &str) -> ProviderResult<()> {
        let mut state = self.state();
        state.calls.push(MockCall::StopInstance {
            instance_id: instance_id.to_string(),
        });
        self.check(&state, MockOp::StopInstance, instance_id)?;
        let Some(instance) = state
            .instances
            .iter_mut()
            .find(|i| i.provider_id == instance_id)
        else {
            return Err(ProviderError::NotFound {
                resource: format!("server {instance_id}"),
            });
        };
        instance.state = "stopped".to_string();
        Ok(())
    }

    async fn create_snapshot(
        &self,
        _zone: &str,
        volume_id: &str,
        name: &str,
    ) -> ProviderResult<String> {
        let mut state = self.state();
        state.calls.push(MockCall::CreateSnapshot {
            volume_id: volume_id.to_string(),
            name: name.to_string(),
        });
        self.check(&state, MockOp::CreateSnapshot, volume_id)?;
        state.next_snapshot += 1;
        let snapshot_id = format!("snap-{}", state.next_snapshot);
        state.snapshots.push(inventory::SnapshotInfo {
            snapshot_id: snapshot_id.clone(),
            name: name.to_string(),
            volume_id: Some(volume_id.to_string()),
            created_at: Some(Utc::now()),
            tags: Vec::new(),
        });
        Ok(snapshot_id)
    }

    async fn tag_snapshot(
        &self,
        _zone: &str,
        snapshot_id: &str,
        tags: &[inventory::ResourceTag],
    ) -> ProviderResult<()> {
        let mut state = self.state();
        state.calls.push(MockCall::TagSnapshot {
            snapshot_id: snapshot_id.to_string(),
            tags: tags.to_vec(),
        });
        self.check(&state, MockOp::TagSnapshot, snapshot_id)?;
        let Some(snapshot) = state
            .snapshots
            .iter_mut()
            .find(|s| s.snapshot_id == snapshot_id)
        else {
            return Err(ProviderError::NotFound {
                resource: format!("snapshot {snapshot_id}"),
            });
        };
        snapshot.tags = tags.iter().map(|t| t.to_string()).collect();
        Ok(())
    }

    async fn list_owned_snapshots(
        &self,
        zone: &str,
    ) -> ProviderResult<Vec<inventory::SnapshotInfo>> {
        let mut state = self.state();
        state.calls.push(MockCall::ListSnapshots {
            zone: zone.to_string(),
        });
        self.check(&state, MockOp::ListSnapshots, zone)?;
        Ok(state.snapshots.clone())
    }

    async fn delete_snapshot(&self, _zone: &str, snapshot_id: &str) -> ProviderResult<()> {
        let mut state = self.state();
        state.calls.push(MockCall::DeleteSnapshot {
            snapshot_id: snapshot_id.to_string(),
        });
        self.check(&state, MockOp::DeleteSnapshot, snapshot_id)?;
        let before = state.snapshots.len();
        state.snapshots.retain(|s| s.snapshot_id != snapshot_id);
        if state.snapshots.len() == before {
            return Err(ProviderError::NotFound {
                resource: format!("snapshot {snapshot_id}"),
            });
        }
        Ok(())
    }
}

/// CI server holding builds and their console logs in memory.
#[derive(Default)]
pub struct MockCiServer {
    builds: Vec<BuildRecord>,
    logs: HashMap<u64, String>,
    failing_logs: HashSet<u64>,
    failing_listing: bool,
}

impl MockCiServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_build(mut self, build: BuildRecord, log: &str) -> Self {
        self.logs.insert(build.number, log.to_string());
        self.builds.push(build);
        self
    }

    pub fn fail_log(mut self, build_number: u64) -> Self {
        self.failing_logs.insert(build_number);
        self
    }

    /// Make `list_builds` fail for every job.
    pub fn fail_listing(mut self) -> Self {
        self.failing_listing = true;
        self
    }
}

#[async_trait]
impl CiServer for MockCiServer {
    async fn list_builds(&self, job: &str) -> ProviderResult<Vec<BuildRecord>> {
        if self.failing_listing {
            return Err(injected(MockOp::ListBuilds, job));
        }
        Ok(self.builds.clone())
    }

    async fn console_log(&self, build: &BuildRecord) -> ProviderResult<String> {
        if self.failing_logs.contains(&build.number) {
            return Err(injected(MockOp::ConsoleLog, &build.number.to_string()));
        }
        self.logs
            .get(&build.number)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound {
                resource: format!("console log of build #{}", build.number),
            })
    }
}
