//! deps.dev client: advisories and OpenSSF scorecards

use crate::http::HttpJsonClient;
use crate::types::AdvisoryRecord;
use futures::future::join_all;
use serde::Deserialize;
use tracing::debug;

const DEPS_DEV_API: &str = "https://api.deps.dev";
const PACKAGE_SYSTEM: &str = "cargo";

/// What deps.dev knows about one published version
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Advisory ids affecting this version
    pub advisory_ids: Vec<String>,
    /// `host/owner/repo` id of the source project, when linked
    pub project_id: Option<String>,
}

/// An OpenSSF scorecard result
#[derive(Debug, Clone)]
pub struct Scorecard {
    /// Overall score, 0.0-10.0
    pub score: f64,
    /// Date the scorecard was produced
    pub date: String,
}

/// Client for the deps.dev API
#[derive(Debug, Clone)]
pub struct DepsDevClient {
    http: HttpJsonClient,
    base: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionResponse {
    #[serde(default)]
    advisory_keys: Vec<AdvisoryKey>,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct AdvisoryKey {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    label: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    scorecard: Option<ScorecardBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScorecardBody {
    overall_score: f64,
    date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdvisoryResponse {
    advisory_key: AdvisoryKey,
    #[serde(default)]
    aliases: Vec<String>,
    cvss3_score: Option<f32>,
    title: Option<String>,
    url: Option<String>,
}

impl DepsDevClient {
    pub fn new(http: HttpJsonClient) -> Self {
        Self::with_base_url(http, DEPS_DEV_API.to_string())
    }

    pub fn with_base_url(http: HttpJsonClient, base: String) -> Self {
        Self { http, base }
    }

    /// Advisory ids and source-project id for a package version.
    /// `None` when the service has no record or is unreachable.
    pub async fn version_info(&self, name: &str, version: &str) -> Option<VersionInfo> {
        debug!("fetching deps.dev info for {} v{}", name, version);
        let path = format!(
            "/v3alpha/systems/{}/packages/{}/versions/{}",
            PACKAGE_SYSTEM,
            urlencoding::encode(name),
            urlencoding::encode(version)
        );
        let response: VersionResponse = self
            .http
            .get_json(&self.base, &path, &[], &[])
            .await
            .ok()
            .flatten()?;

        let project_id = response
            .links
            .iter()
            .find(|link| link.label.as_deref() == Some("SOURCE_REPO"))
            .and_then(|link| link.url.as_deref())
            .and_then(project_id_from_url);

        Some(VersionInfo {
            advisory_ids: response.advisory_keys.into_iter().map(|k| k.id).collect(),
            project_id,
        })
    }

    /// OpenSSF scorecard for a `host/owner/repo` project id
    pub async fn project_scorecard(&self, project_id: &str) -> Option<Scorecard> {
        let path = format!("/v3alpha/projects/{}", urlencoding::encode(project_id));
        let response: ProjectResponse = self
            .http
            .get_json(&self.base, &path, &[], &[])
            .await
            .ok()
            .flatten()?;

        response.scorecard.map(|s| Scorecard {
            score: s.overall_score,
            date: s.date,
        })
    }

    /// Details for one advisory id; `None` when the lookup fails
    pub async fn advisory_detail(&self, advisory_id: &str) -> Option<AdvisoryRecord> {
        let path = format!("/v3alpha/advisories/{}", urlencoding::encode(advisory_id));
        let response: AdvisoryResponse = self
            .http
            .get_json(&self.base, &path, &[], &[])
            .await
            .ok()
            .flatten()?;

        Some(AdvisoryRecord {
            id: response.advisory_key.id,
            aliases: response.aliases,
            cvss3_score: response.cvss3_score,
            title: response.title,
            url: response.url,
        })
    }

    /// Fetch details for a batch of advisory ids concurrently.
    ///
    /// A failed lookup drops that advisory only; callers keep the original
    /// id count as the vulnerability count.
    pub async fn fetch_advisories(&self, advisory_ids: &[String]) -> Vec<AdvisoryRecord> {
        let lookups = advisory_ids.iter().map(|id| self.advisory_detail(id));
        join_all(lookups).await.into_iter().flatten().collect()
    }
}

/// Keep exactly `host/owner/repo` from a source-repository link
fn project_id_from_url(url: &str) -> Option<String> {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let segments: Vec<&str> = stripped
        .trim_end_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    if segments.len() < 3 {
        return None;
    }
    Some(segments[..3].join("/"))
}
