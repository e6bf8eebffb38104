//! Version catalog lookups against crates.io and compatible registries

use crate::http::HttpJsonClient;
use crate::types::VersionRecord;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

const CRATES_IO_API: &str = "https://crates.io";
const CRATES_IO_WEB: &str = "https://crates.io/crates";

/// Client for the package registry's version-listing and package-page
/// endpoints.
///
/// A dependency carrying an alternate-registry source URI is fetched from
/// that registry's equivalent endpoint instead, with bearer-token auth when
/// a registry token is configured. Lookups never fail: an unknown package
/// is an empty catalog.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: HttpJsonClient,
    base: String,
    auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionsResponse {
    versions: Vec<ApiVersion>,
}

#[derive(Debug, Deserialize)]
struct ApiVersion {
    num: String,
    #[serde(default)]
    yanked: bool,
    created_at: Option<String>,
    /// Not sent by crates.io; some compatible registries include it
    #[serde(default)]
    repository: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: CrateInfo,
}

#[derive(Debug, Deserialize)]
struct CrateInfo {
    homepage: Option<String>,
    repository: Option<String>,
}

impl RegistryClient {
    pub fn new(http: HttpJsonClient, auth_token: Option<String>) -> Self {
        Self::with_base_url(http, CRATES_IO_API.to_string(), auth_token)
    }

    pub fn with_base_url(http: HttpJsonClient, base: String, auth_token: Option<String>) -> Self {
        Self {
            http,
            base,
            auth_token,
        }
    }

    /// Published versions for a package, registry order preserved
    /// (crates.io lists newest first). Empty when the package is unknown
    /// or the registry is unreachable.
    pub async fn versions(&self, name: &str, source_uri: Option<&str>) -> Vec<VersionRecord> {
        let (base, headers) = match alternate_registry(source_uri) {
            Some(alternate) => {
                debug!("fetching {} from alternate registry {}", name, alternate);
                let mut headers = Vec::new();
                if let Some(token) = &self.auth_token {
                    headers.push(("authorization", format!("Bearer {}", token)));
                }
                (alternate.trim_end_matches('/').to_string(), headers)
            }
            None => (self.base.clone(), Vec::new()),
        };

        let path = format!("/api/v1/crates/{}/versions", urlencoding::encode(name));
        let response: Option<VersionsResponse> = self
            .http
            .get_json(&base, &path, &headers, &[])
            .await
            .ok()
            .flatten();

        response
            .map(|r| r.versions.into_iter().map(VersionRecord::from).collect())
            .unwrap_or_default()
    }

    /// Homepage and source URLs from the registry's package page, used as
    /// the last-resort repository candidates
    pub async fn package_urls(&self, name: &str) -> Vec<String> {
        let path = format!("/api/v1/crates/{}", urlencoding::encode(name));
        let response: Option<CrateResponse> = self
            .http
            .get_json(&self.base, &path, &[], &[])
            .await
            .ok()
            .flatten();

        let Some(info) = response.map(|r| r.krate) else {
            return Vec::new();
        };
        let mut urls = Vec::new();
        for url in [info.homepage, info.repository].into_iter().flatten() {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }

    /// Link to the package's page on the public registry; none for
    /// packages served from an alternate registry
    pub fn package_page_url(&self, name: &str, source_uri: Option<&str>) -> Option<String> {
        if alternate_registry(source_uri).is_some() {
            return None;
        }
        Some(format!("{}/{}", CRATES_IO_WEB, name))
    }
}

fn alternate_registry(source_uri: Option<&str>) -> Option<&str> {
    let uri = source_uri?;
    if uri.starts_with("http") && !uri.contains("crates.io") {
        Some(uri)
    } else {
        None
    }
}

impl From<ApiVersion> for VersionRecord {
    fn from(api: ApiVersion) -> Self {
        let is_prerelease = api.num.contains('-');
        Self {
            is_prerelease,
            yanked: api.yanked,
            released_at: api.created_at.as_deref().and_then(parse_datetime),
            source_code_uri: api.repository,
            number: api.num,
        }
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// First listed non-prerelease, non-yanked version
pub fn latest_release(versions: &[VersionRecord]) -> Option<&VersionRecord> {
    versions.iter().find(|v| !v.is_prerelease && !v.yanked)
}

/// First listed pre-release that has not been yanked
pub fn latest_prerelease(versions: &[VersionRecord]) -> Option<&VersionRecord> {
    versions.iter().find(|v| v.is_prerelease && !v.yanked)
}

/// The record for an exact version number, if still listed
pub fn find_version<'a>(versions: &'a [VersionRecord], number: &str) -> Option<&'a VersionRecord> {
    versions.iter().find(|v| v.number == number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;

    fn client(base: String, token: Option<&str>) -> RegistryClient {
        let http = HttpJsonClient::new(&NetworkConfig::default()).unwrap();
        RegistryClient::with_base_url(http, base, token.map(String::from))
    }

    const VERSIONS_BODY: &str = r#"{
        "versions": [
            {"num": "2.0.0-beta.1", "yanked": false, "created_at": "2024-03-01T00:00:00Z"},
            {"num": "1.2.0", "yanked": true, "created_at": "2024-02-01T00:00:00Z"},
            {"num": "1.1.0", "yanked": false, "created_at": "2024-01-01T00:00:00Z"},
            {"num": "1.0.0", "yanked": false, "created_at": "2023-01-01T00:00:00Z"}
        ]
    }"#;

    #[tokio::test]
    async fn test_versions_parses_registry_listing() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/crates/demo/versions")
            .with_status(200)
            .with_body(VERSIONS_BODY)
            .create_async()
            .await;

        let versions = client(server.url(), None).versions("demo", None).await;

        mock.assert_async().await;
        assert_eq!(versions.len(), 4);
        assert!(versions[0].is_prerelease);
        assert!(versions[1].yanked);
        assert_eq!(versions[2].number, "1.1.0");
        assert_eq!(
            versions[2].released_at.unwrap().to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
    }

    #[tokio::test]
    async fn test_latest_selection_skips_prereleases_and_yanked() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/crates/demo/versions")
            .with_status(200)
            .with_body(VERSIONS_BODY)
            .create_async()
            .await;

        let versions = client(server.url(), None).versions("demo", None).await;

        assert_eq!(latest_release(&versions).unwrap().number, "1.1.0");
        assert_eq!(latest_prerelease(&versions).unwrap().number, "2.0.0-beta.1");
        assert!(find_version(&versions, "1.0.0").is_some());
        assert!(find_version(&versions, "0.9.0").is_none());
    }

    #[tokio::test]
    async fn test_unknown_package_is_empty_catalog() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/crates/ghost/versions")
            .with_status(404)
            .create_async()
            .await;

        let versions = client(server.url(), None).versions("ghost", None).await;
        assert!(versions.is_empty());
    }

    #[tokio::test]
    async fn test_alternate_registry_with_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/crates/internal/versions")
            .match_header("authorization", "Bearer sekrit")
            .with_status(200)
            .with_body(r#"{"versions": [{"num": "0.3.0", "created_at": "2024-05-01T00:00:00Z"}]}"#)
            .create_async()
            .await;

        // Base points elsewhere; the alternate source URI must win.
        let registry = client("http://127.0.0.1:1".to_string(), Some("sekrit"));
        let alternate = server.url();
        let versions = registry.versions("internal", Some(&alternate)).await;

        mock.assert_async().await;
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].number, "0.3.0");
    }

    #[tokio::test]
    async fn test_package_urls_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/crates/demo")
            .with_status(200)
            .with_body(
                r#"{"crate": {"homepage": "https://example.com", "repository": "https://github.com/o/demo"}}"#,
            )
            .create_async()
            .await;

        let urls = client(server.url(), None).package_urls("demo").await;
        assert_eq!(
            urls,
            vec![
                "https://example.com".to_string(),
                "https://github.com/o/demo".to_string()
            ]
        );
    }

    #[test]
    fn test_package_page_url() {
        let http = HttpJsonClient::new(&NetworkConfig::default()).unwrap();
        let registry = RegistryClient::new(http, None);
        assert_eq!(
            registry.package_page_url("serde", None).unwrap(),
            "https://crates.io/crates/serde"
        );
        assert!(registry
            .package_page_url("internal", Some("https://pkgs.example.com/registry"))
            .is_none());
    }
}
