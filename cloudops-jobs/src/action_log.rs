use cloudops_providers::ProviderResult;
use std::future::Future;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const STOP_INSTANCE: &str = "STOP_INSTANCE";
pub const CREATE_SNAPSHOT: &str = "CREATE_SNAPSHOT";
pub const TAG_SNAPSHOT: &str = "TAG_SNAPSHOT";
pub const DELETE_SNAPSHOT: &str = "DELETE_SNAPSHOT";

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// An in-flight mutating action. Created by `log_event`, closed by `complete`.
#[derive(Debug)]
pub struct ActionLog {
    pub id: Uuid,
    action_type: &'static str,
    target: String,
    started: Instant,
}

/// Log the start of an action against `target` (instance, volume or snapshot id).
pub fn log_event(action_type: &'static str, target: &str) -> ActionLog {
    let id = Uuid::new_v4();
    tracing::info!(
        action_id = %id,
        action_type,
        resource_id = target,
        status = "in_progress",
        "action started"
    );
    ActionLog {
        id,
        action_type,
        target: target.to_string(),
        started: Instant::now(),
    }
}

impl ActionLog {
    /// Log completion with duration; failures carry the error kind and message.
    pub fn complete<T>(self, result: &ProviderResult<T>) {
        let duration_ms = millis(self.started.elapsed());
        match result {
            Ok(_) => tracing::info!(
                action_id = %self.id,
                action_type = self.action_type,
                resource_id = %self.target,
                status = "success",
                duration_ms,
                "action completed"
            ),
            Err(e) => tracing::warn!(
                action_id = %self.id,
                action_type = self.action_type,
                resource_id = %self.target,
                status = "failed",
                error_kind = e.kind(),
                error = %e,
                duration_ms,
                "action failed"
            ),
        }
    }
}

/// Run `fut` between a start and a completion event.
pub async fn tracked<T, F>(action_type: &'static str, target: &str, fut: F) -> ProviderResult<T>
where
    F: Future<Output = ProviderResult<T>>,
{
    let log = log_event(action_type, target);
    let result = fut.await;
    log.complete(&result);
    result
}
