use std::time::Duration;

use reqwest::header::HeaderMap;

/// Build a reqwest client with sane defaults (connect timeout, per-request timeout).
pub fn make_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(timeout)
        .build()
}

/// Client for long-lived streams (SSE): connect timeout only.
pub fn make_streaming_client(headers: HeaderMap) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .default_headers(headers)
        .build()
}
