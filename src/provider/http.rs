//! Shared HTTP client, SSE line parsing and status mapping.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};

use crate::error::SwitchyardError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Shared reqwest client for backends that do not bring their own.
pub fn shared_client() -> Result<&'static reqwest::Client, SwitchyardError> {
    if let Some(client) = SHARED_CLIENT.get() {
        return Ok(client);
    }
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .build()?;
    Ok(SHARED_CLIENT.get_or_init(|| client))
}

/// JSON headers with an optional Bearer token.
pub fn bearer_headers(api_key: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = api_key {
        if let Ok(val) = HeaderValue::from_str(&format!("Bearer {key}")) {
            headers.insert(AUTHORIZATION, val);
        }
    }
    headers
}

/// Payload of an SSE `data:` line; `None` for other lines and `[DONE]`.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// Map a non-success backend status to an error.
pub fn status_to_error(status: u16, headers: &HeaderMap, body: &str) -> SwitchyardError {
    match status {
        401 | 403 => SwitchyardError::Authentication(body.to_string()),
        429 => SwitchyardError::BackendRateLimited {
            retry_after_ms: retry_after_header(headers).or_else(|| retry_after_body(body)),
        },
        _ => SwitchyardError::backend(status, body),
    }
}

fn retry_after_header(headers: &HeaderMap) -> Option<u64> {
    let secs: f64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some((secs * 1000.0) as u64)
}

fn retry_after_body(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}
