//! Shared GET-JSON transport for every external client
//!
//! All expected failure modes (timeouts, connection errors, non-success
//! statuses, malformed JSON) degrade to `Ok(None)` with a logged warning;
//! the one condition surfaced as an error is rate limiting, which the
//! scheduler reports with an actionable message. Redirects are followed a
//! few hops at most and only to a fixed allow-list of hosts, so stale
//! package metadata cannot send requests to an arbitrary server.

use crate::config::NetworkConfig;
use crate::error::{PulseError, Result};
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::warn;

const TRUSTED_HOSTS: &[&str] = &[
    "crates.io",
    "static.crates.io",
    "api.github.com",
    "github.com",
    "gitlab.com",
    "api.deps.dev",
    "endoflife.date",
];
const MAX_REDIRECTS: usize = 3;
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// HTTP client shared by all external-service clients
#[derive(Debug, Clone)]
pub struct HttpJsonClient {
    client: Client,
}

impl HttpJsonClient {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let redirect_policy = Policy::custom(|attempt| {
            if attempt.previous().len() > MAX_REDIRECTS {
                return attempt.stop();
            }
            let host = attempt.url().host_str().unwrap_or("").to_string();
            if TRUSTED_HOSTS.contains(&host.as_str()) {
                attempt.follow()
            } else {
                warn!("redirect to untrusted host {}, skipping", host);
                attempt.stop()
            }
        });

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .redirect(redirect_policy)
            .build()?;

        Ok(Self { client })
    }

    /// GET `base` + `path` and deserialize the JSON body.
    ///
    /// `Ok(None)` for every expected failure; `Err(RateLimited)` when the
    /// service says to back off.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        base: &str,
        path: &str,
        headers: &[(&str, String)],
        params: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let url = format!("{}{}", base.trim_end_matches('/'), path);

        let mut request = self.client.get(&url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        if !params.is_empty() {
            request = request.query(params);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("GET {} failed: {}", url, e);
                return Ok(None);
            }
        };

        let status = response.status();
        if rate_limited(status, response.headers()) {
            return Err(PulseError::rate_limited(host_of(&url)));
        }
        if !status.is_success() {
            if status != StatusCode::NOT_FOUND {
                warn!("GET {} returned HTTP {}", url, status);
            }
            return Ok(None);
        }

        match response.json::<T>().await {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("GET {} returned invalid JSON: {}", url, e);
                Ok(None)
            }
        }
    }
}

/// 429 anywhere, or a GitHub-style 403 with the rate budget exhausted
fn rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim() == "0")
            .unwrap_or(false)
}

fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn client() -> HttpJsonClient {
        HttpJsonClient::new(&NetworkConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_get_json_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/data")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;

        let body: Option<Value> = client()
            .get_json(&server.url(), "/data", &[], &[])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(body.unwrap()["ok"], Value::Bool(true));
    }

    #[tokio::test]
    async fn test_get_json_not_found_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let body: Option<Value> = client()
            .get_json(&server.url(), "/missing", &[], &[])
            .await
            .unwrap();
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_get_json_invalid_json_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/broken")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let body: Option<Value> = client()
            .get_json(&server.url(), "/broken", &[], &[])
            .await
            .unwrap();
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_get_json_connection_failure_is_none() {
        let body: Option<Value> = client()
            .get_json("http://127.0.0.1:1", "/unreachable", &[], &[])
            .await
            .unwrap();
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_too_many_requests_is_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/limited")
            .with_status(429)
            .create_async()
            .await;

        let result: Result<Option<Value>> =
            client().get_json(&server.url(), "/limited", &[], &[]).await;
        assert!(matches!(result, Err(PulseError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_forbidden_with_exhausted_budget_is_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/forbidden")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .create_async()
            .await;

        let result: Result<Option<Value>> = client()
            .get_json(&server.url(), "/forbidden", &[], &[])
            .await;
        assert!(matches!(result, Err(PulseError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_plain_forbidden_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/forbidden")
            .with_status(403)
            .create_async()
            .await;

        let body: Option<Value> = client()
            .get_json(&server.url(), "/forbidden", &[], &[])
            .await
            .unwrap();
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_headers_and_params_are_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/auth")
            .match_header("authorization", "Bearer secret")
            .match_query(mockito::Matcher::UrlEncoded(
                "per_page".into(),
                "1".into(),
            ))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let headers = [("authorization", "Bearer secret".to_string())];
        let body: Option<Value> = client()
            .get_json(&server.url(), "/auth", &headers, &[("per_page", "1")])
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(body.is_some());
    }
}
