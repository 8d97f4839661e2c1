use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

pub const REQUEST_TIMEOUT_SECS: u64 = 10;
pub const API_KEY_HEADER: &str = "x-apisports-key";

/// Blocking client with the fixed request timeout and the API key on every call.
pub fn build_http_client(api_key: &str) -> Result<Client> {
    let mut headers = HeaderMap::new();
    let mut key = HeaderValue::from_str(api_key).context("api key is not a valid header value")?;
    key.set_sensitive(true);
    headers.insert(API_KEY_HEADER, key);
    headers.insert(USER_AGENT, HeaderValue::from_static("form-tracker/0.1"));

    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .default_headers(headers)
        .build()
        .context("failed to build http client")
}
