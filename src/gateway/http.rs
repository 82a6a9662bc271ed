//! HTTP client construction, SSE line parsing and status mapping.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};

use crate::error::SwarmError;

/// Build a client with the per-request timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, SwarmError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(SwarmError::Network)
}

/// Default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// What one SSE line carries.
#[derive(Debug, PartialEq, Eq)]
pub enum SseLine<'a> {
    Data(&'a str),
    Done,
    /// Comments, other fields and blank lines.
    Skip,
}

/// Classify a single trimmed SSE line.
pub fn parse_sse_line(line: &str) -> SseLine<'_> {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    match data.trim_start() {
        "[DONE]" => SseLine::Done,
        "" => SseLine::Skip,
        payload => SseLine::Data(payload),
    }
}

/// Accumulates raw event-stream bytes and hands out complete lines.
///
/// Lines are split on `\n` before UTF-8 decoding, so a multi-byte character
/// split across network chunks is reassembled intact.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next complete line, trimmed. `None` until a `\n` has been buffered.
    pub fn next_line(&mut self) -> Option<Result<String, SwarmError>> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(decode_line(&line[..end]))
    }

    /// The unterminated tail left once the body has ended, if any.
    pub fn finish(&mut self) -> Option<Result<String, SwarmError>> {
        let rest = std::mem::take(&mut self.pending);
        if rest.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        Some(decode_line(&rest))
    }
}

fn decode_line(bytes: &[u8]) -> Result<String, SwarmError> {
    std::str::from_utf8(bytes)
        .map(|line| line.trim().to_string())
        .map_err(|e| SwarmError::Stream(format!("event stream is not valid UTF-8: {e}")))
}

/// Map a non-success HTTP status to an error.
pub fn status_to_error(status: u16, headers: &HeaderMap, body: &str) -> SwarmError {
    match status {
        401 | 403 => SwarmError::Authentication(error_message(body)),
        429 => SwarmError::RateLimited {
            retry_after_ms: retry_after_from_headers(headers).or_else(|| extract_retry_after(body)),
        },
        _ => SwarmError::api(status, error_message(body)),
    }
}

/// `error.message` from a JSON error body, else the body itself.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

fn retry_after_from_headers(headers: &HeaderMap) -> Option<u64> {
    let secs: f64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some((secs * 1000.0) as u64)
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}
