//! Shared HTTP plumbing for the Source and Target clients.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Response;

use crate::errors::ApiError;

/// Timeout for ordinary API calls.
pub const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for requests that may return a whole TMX file.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Build a reqwest client with the crate user agent, the given default
/// headers and request timeout.
pub(crate) fn build_client(
    mut headers: HeaderMap,
    timeout: Duration,
) -> Result<reqwest::Client, ApiError> {
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("locsync/", env!("CARGO_PKG_VERSION"))),
    );
    let client = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Pass a successful response through; turn anything else into
/// [`ApiError::Status`] carrying the response body.
pub(crate) async fn check_response(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        url,
        body,
    })
}

/// Parse a response body as JSON.
pub(crate) async fn read_json(resp: Response) -> Result<serde_json::Value, ApiError> {
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Walk a dotted path (`data.attributes.name`) into a JSON value.
pub(crate) fn json_path<'a>(
    value: &'a serde_json::Value,
    path: &str,
) -> Result<&'a serde_json::Value, ApiError> {
    path.split('.')
        .try_fold(value, |v, key| v.get(key))
        .filter(|v| !v.is_null())
        .ok_or_else(|| ApiError::missing(path))
}

/// Like [`json_path`], but the value must be a string.
pub(crate) fn json_str<'a>(value: &'a serde_json::Value, path: &str) -> Result<&'a str, ApiError> {
    json_path(value, path)?
        .as_str()
        .ok_or_else(|| ApiError::missing(path))
}

/// Header map rendered for debug logs with credentials masked.
pub(crate) fn redacted_headers(headers: &HeaderMap) -> String {
    let mut lines: Vec<String> = headers
        .iter()
        .map(|(name, value)| {
            let shown = if name == reqwest::header::AUTHORIZATION {
                "Bearer [REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("<binary>").to_string()
            };
            format!("{}: {}", name, shown)
        })
        .collect();
    lines.sort();
    lines.join(", ")
}
