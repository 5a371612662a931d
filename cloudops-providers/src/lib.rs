use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod error;
mod http;
pub mod jenkins;

pub use error::{ProviderError, ProviderResult};

/// Compute, monitoring and block-storage operations the jobs need from a cloud.
///
/// Every call is scoped to a zone. Errors are typed so callers can tell an
/// authentication problem from a flaky network or a response they can't parse.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    fn provider_code(&self) -> &'static str;

    async fn list_instances(
        &self,
        zone: &str,
        filter: &inventory::InstanceFilter,
    ) -> ProviderResult<Vec<inventory::DiscoveredInstance>>;

    /// Per-period CPU averages (percent) for `[start, end]`. An instance with no
    /// recorded data yields an empty vector, not an error.
    async fn cpu_utilization_samples(
        &self,
        zone: &str,
        instance_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        period_secs: u32,
    ) -> ProviderResult<Vec<f64>>;

    async fn stop_instance(&self, zone: &str, instance_id: &str) -> ProviderResult<()>;

    /// Returns the new snapshot id.
    async fn create_snapshot(
        &self,
        zone: &str,
        volume_id: &str,
        name: &str,
    ) -> ProviderResult<String>;

    async fn tag_snapshot(
        &self,
        zone: &str,
        snapshot_id: &str,
        tags: &[inventory::ResourceTag],
    ) -> ProviderResult<()>;

    /// Snapshots owned by the calling account/project, whoever created them.
    async fn list_owned_snapshots(&self, zone: &str)
        -> ProviderResult<Vec<inventory::SnapshotInfo>>;

    async fn delete_snapshot(&self, zone: &str, snapshot_id: &str) -> ProviderResult<()>;
}

/// Read-only access to a CI server's build history.
#[async_trait]
pub trait CiServer: Send + Sync {
    /// Builds of `job`, newest first.
    async fn list_builds(&self, job: &str) -> ProviderResult<Vec<ci::BuildRecord>>;

    async fn console_log(&self, build: &ci::BuildRecord) -> ProviderResult<String>;
}

pub mod inventory {
    use chrono::{DateTime, Utc};
    use serde::Serialize;
    use std::fmt;

    pub const UNNAMED_INSTANCE: &str = "NoName";

    #[derive(Clone, Debug, Default, PartialEq, Eq)]
    pub struct InstanceFilter {
        pub state: Option<String>,
        /// `key=value` tag the instance must carry.
        pub tag: Option<String>,
    }

    impl InstanceFilter {
        pub fn running() -> Self {
            Self {
                state: Some("running".to_string()),
                tag: None,
            }
        }

        pub fn tagged(tag: &str) -> Self {
            Self {
                state: None,
                tag: Some(tag.to_string()),
            }
        }

        pub fn matches(&self, instance: &DiscoveredInstance) -> bool {
            let state_ok = self
                .state
                .as_deref()
                .map_or(true, |s| instance.state.eq_ignore_ascii_case(s));
            let tag_ok = self
                .tag
                .as_deref()
                .map_or(true, |t| instance.tags.iter().any(|it| it == t));
            state_ok && tag_ok
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    pub struct DiscoveredInstance {
        pub provider_id: String,
        pub name: Option<String>,
        pub zone: String,
        pub state: String,
        pub volume_ids: Vec<String>,
        pub tags: Vec<String>,
    }

    impl DiscoveredInstance {
        pub fn display_name(&self) -> &str {
            self.name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(UNNAMED_INSTANCE)
        }
    }

    #[derive(Clone, Debug, PartialEq, Serialize)]
    pub struct SnapshotInfo {
        pub snapshot_id: String,
        pub name: String,
        pub volume_id: Option<String>,
        pub created_at: Option<DateTime<Utc>>,
        pub tags: Vec<String>,
    }

    impl SnapshotInfo {
        pub fn has_tag_key(&self, key: &str) -> bool {
            self.tags
                .iter()
                .filter_map(|t| ResourceTag::parse(t))
                .any(|t| t.key == key)
        }
    }

    /// Key/value label. Providers with flat string tags store it as `key=value`.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize)]
    pub struct ResourceTag {
        pub key: String,
        pub value: String,
    }

    impl ResourceTag {
        pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
            Self {
                key: key.into(),
                value: value.into(),
            }
        }

        pub fn parse(raw: &str) -> Option<Self> {
            let (key, value) = raw.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some(Self::new(key, value.trim()))
        }
    }

    impl fmt::Display for ResourceTag {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}={}", self.key, self.value)
        }
    }
}

pub mod ci {
    use serde::Serialize;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize)]
    pub enum BuildResult {
        Success,
        Failure,
        /// ABORTED, UNSTABLE, NOT_BUILT, or `IN_PROGRESS` for a build with no result yet.
        Other(String),
    }

    impl BuildResult {
        pub fn from_raw(raw: Option<&str>) -> Self {
            match raw.map(|s| s.trim().to_ascii_uppercase()) {
                Some(s) if s == "SUCCESS" => BuildResult::Success,
                Some(s) if s == "FAILURE" => BuildResult::Failure,
                Some(s) if !s.is_empty() => BuildResult::Other(s),
                _ => BuildResult::Other("IN_PROGRESS".to_string()),
            }
        }

        pub fn is_success(&self) -> bool {
            matches!(self, BuildResult::Success)
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize)]
    pub struct BuildRecord {
        pub number: u64,
        pub result: BuildResult,
        /// Build page URL; the console log lives under it.
        pub url: String,
    }
}

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "scaleway")]
pub mod scaleway;

#[cfg(test)]
mod tests {
    use super::ci::BuildResult;
    use super::inventory::*;

    fn instance(state: &str, tags: &[&str]) -> DiscoveredInstance {
        DiscoveredInstance {
            provider_id: "srv-1".into(),
            name: None,
            zone: "fr-par-1".into(),
            state: state.into(),
            volume_ids: vec![],
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn filter_matching() {
        assert!(InstanceFilter::running().matches(&instance("running", &[])));
        assert!(InstanceFilter::running().matches(&instance("RUNNING", &[])));
        assert!(!InstanceFilter::running().matches(&instance("stopped", &[])));
        assert!(InstanceFilter::tagged("Backup=True").matches(&instance("stopped", &["Backup=True"])));
        assert!(!InstanceFilter::tagged("Backup=True").matches(&instance("running", &["Backup=False"])));
        assert!(InstanceFilter::default().matches(&instance("anything", &[])));
    }

    #[test]
    fn unnamed_instances_get_placeholder() {
        let mut i = instance("running", &[]);
        assert_eq!(i.display_name(), "NoName");
        i.name = Some("  ".into());
        assert_eq!(i.display_name(), "NoName");
        i.name = Some("web-1".into());
        assert_eq!(i.display_name(), "web-1");
    }

    #[test]
    fn tag_parse_and_display() {
        let t = ResourceTag::parse("CreatedOn=2026-10-16").unwrap();
        assert_eq!(t.key, "CreatedOn");
        assert_eq!(t.value, "2026-10-16");
        assert_eq!(t.to_string(), "CreatedOn=2026-10-16");
        assert_eq!(ResourceTag::parse("plain"), None);
        assert_eq!(ResourceTag::parse("=x"), None);
    }

    #[test]
    fn build_result_parsing() {
        assert_eq!(BuildResult::from_raw(Some("SUCCESS")), BuildResult::Success);
        assert_eq!(BuildResult::from_raw(Some("failure")), BuildResult::Failure);
        assert_eq!(
            BuildResult::from_raw(Some("ABORTED")),
            BuildResult::Other("ABORTED".into())
        );
        assert_eq!(
            BuildResult::from_raw(None),
            BuildResult::Other("IN_PROGRESS".into())
        );
        assert!(!BuildResult::from_raw(None).is_success());
    }
}
