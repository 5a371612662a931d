//! Response handling shared by the HTTP backends.

use crate::error::{ProviderError, ProviderResult};
use reqwest::Response;
use serde::de::DeserializeOwned;

/// Fail with a typed error unless the response is 2xx.
pub(crate) async fn ensure_success(resp: Response, resource: &str) -> ProviderResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::debug!(resource, status = status.as_u16(), body = %body, "request failed");
    Err(ProviderError::from_status(status, resource, body))
}

/// Check the status, then decode the body as `T`.
///
/// The body is read as text first so a shape mismatch surfaces as
/// `MalformedResponse` rather than a transport error.
pub(crate) async fn read_json<T: DeserializeOwned>(
    resp: Response,
    resource: &str,
) -> ProviderResult<T> {
    let resp = ensure_success(resp, resource).await?;
    let text = resp.text().await?;
    serde_json::from_str(&text)
        .map_err(|e| ProviderError::MalformedResponse(format!("{resource}: {e}")))
}

pub(crate) async fn read_text(resp: Response, resource: &str) -> ProviderResult<String> {
    let resp = ensure_success(resp, resource).await?;
    Ok(resp.text().await?)
}
