//! GitHub activity lookups

use super::ActivitySource;
use crate::error::Result;
use crate::http::HttpJsonClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

const GITHUB_API: &str = "https://api.github.com";

/// Client for the GitHub REST API.
///
/// Works unauthenticated at the lower public rate limit; a token raises it.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: HttpJsonClient,
    base: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Repo {
    archived: bool,
}

impl GithubClient {
    pub fn new(http: HttpJsonClient, token: Option<String>) -> Self {
        Self::with_base_url(http, GITHUB_API.to_string(), token)
    }

    pub fn with_base_url(http: HttpJsonClient, base: String, token: Option<String>) -> Self {
        Self { http, base, token }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![("accept", "application/vnd.github+json".to_string())];
        if let Some(token) = &self.token {
            headers.push(("authorization", format!("Bearer {}", token)));
        }
        headers
    }
}

#[async_trait]
impl ActivitySource for GithubClient {
    async fn last_commit_at(&self, owner: &str, name: &str) -> Result<Option<DateTime<Utc>>> {
        debug!("fetching last commit for {}/{}", owner, name);
        let path = format!("/repos/{}/{}/commits", owner, name);
        let commits: Option<Vec<CommitEntry>> = self
            .http
            .get_json(&self.base, &path, &self.headers(), &[("per_page", "1")])
            .await?;

        let date = commits
            .and_then(|c| c.into_iter().next())
            .and_then(|entry| entry.commit.author)
            .and_then(|author| author.date);

        Ok(date.as_deref().and_then(parse_datetime))
    }

    async fn archived(&self, owner: &str, name: &str) -> Result<Option<bool>> {
        let path = format!("/repos/{}/{}", owner, name);
        let repo: Option<Repo> = self
            .http
            .get_json(&self.base, &path, &self.headers(), &[])
            .await?;
        Ok(repo.map(|r| r.archived))
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
