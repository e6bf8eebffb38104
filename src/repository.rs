//! Source-repository identity resolution
//!
//! Candidate URLs arrive from several places (locally installed metadata,
//! per-version registry metadata, the registry package page) and most of
//! them are noisy: trailing `.git`, deep links into a subdirectory, http vs
//! https, `www.` prefixes. The first candidate matching a known host
//! pattern wins and is decomposed into `{host, owner, name}`.

use crate::registry::RegistryClient;
use crate::types::VersionRecord;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static HOST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://(?:www\.)?(github|gitlab)\.com/([\w.-]+)/([\w.-]+)")
        .expect("host pattern is valid")
});

/// The source hosts the checker knows how to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoHost {
    Github,
    Gitlab,
    /// No recognized host; a valid terminal state, not an error
    Unhandled,
}

impl RepoHost {
    fn domain(self) -> Option<&'static str> {
        match self {
            Self::Github => Some("github.com"),
            Self::Gitlab => Some("gitlab.com"),
            Self::Unhandled => None,
        }
    }
}

/// A resolved `{host, owner, name}` repository identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryIdentity {
    pub canonical_url: Option<String>,
    pub host: RepoHost,
    pub owner: Option<String>,
    pub name: Option<String>,
}

impl RepositoryIdentity {
    /// The identity of a dependency whose repository could not be recognized
    pub fn unhandled() -> Self {
        Self {
            canonical_url: None,
            host: RepoHost::Unhandled,
            owner: None,
            name: None,
        }
    }

    /// Parse a candidate URL; `None` if it matches no known host pattern.
    ///
    /// Path segments beyond `owner/name` and a trailing `.git` are stripped.
    pub fn from_url(url: &str) -> Option<Self> {
        let captures = HOST_PATTERN.captures(url)?;

        let host = match captures[1].to_ascii_lowercase().as_str() {
            "github" => RepoHost::Github,
            "gitlab" => RepoHost::Gitlab,
            _ => return None,
        };
        let owner = captures[2].to_string();
        let raw_name = &captures[3];
        let name = raw_name.strip_suffix(".git").unwrap_or(raw_name).to_string();

        let canonical_url = host
            .domain()
            .map(|domain| format!("https://{}/{}/{}", domain, owner, name));

        Some(Self {
            canonical_url,
            host,
            owner: Some(owner),
            name: Some(name),
        })
    }

    /// `host/owner/name` identifier used by the scorecard service
    pub fn project_id(&self) -> Option<String> {
        let domain = self.host.domain()?;
        match (&self.owner, &self.name) {
            (Some(owner), Some(name)) => Some(format!("{}/{}/{}", domain, owner, name)),
            _ => None,
        }
    }
}

impl Default for RepositoryIdentity {
    fn default() -> Self {
        Self::unhandled()
    }
}

/// First candidate URL that matches a known host pattern, in input order
pub fn first_match<'a, I>(candidates: I) -> Option<RepositoryIdentity>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .find_map(RepositoryIdentity::from_url)
}

/// Resolve a dependency's repository identity.
///
/// Precedence, first match wins: locally installed metadata hints, then the
/// de-duplicated union of per-version source URLs, then the registry
/// package page. The page lookup is a network call and only happens when
/// the cheaper candidates all miss.
pub async fn resolve(
    name: &str,
    hints: &[String],
    versions: &[VersionRecord],
    registry: &RegistryClient,
) -> RepositoryIdentity {
    if let Some(identity) = first_match(hints.iter().map(String::as_str)) {
        return identity;
    }

    let mut version_urls: Vec<&str> = Vec::new();
    for record in versions {
        if let Some(uri) = record.source_code_uri.as_deref() {
            if !version_urls.contains(&uri) {
                version_urls.push(uri);
            }
        }
    }
    if let Some(identity) = first_match(version_urls) {
        return identity;
    }

    let page_urls = registry.package_urls(name).await;
    first_match(page_urls.iter().map(String::as_str)).unwrap_or_else(RepositoryIdentity::unhandled)
}
