//! GitLab activity lookups

use super::ActivitySource;
use crate::error::Result;
use crate::http::HttpJsonClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

const GITLAB_API: &str = "https://gitlab.com";

/// Client for the GitLab REST API
#[derive(Debug, Clone)]
pub struct GitlabClient {
    http: HttpJsonClient,
    base: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Commit {
    committed_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Project {
    archived: bool,
}

impl GitlabClient {
    pub fn new(http: HttpJsonClient, token: Option<String>) -> Self {
        Self::with_base_url(http, GITLAB_API.to_string(), token)
    }

    pub fn with_base_url(http: HttpJsonClient, base: String, token: Option<String>) -> Self {
        Self { http, base, token }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        match &self.token {
            Some(token) => vec![("private-token", token.clone())],
            None => Vec::new(),
        }
    }

    fn project_path(owner: &str, name: &str) -> String {
        urlencoding::encode(&format!("{}/{}", owner, name)).into_owned()
    }
}

#[async_trait]
impl ActivitySource for GitlabClient {
    async fn last_commit_at(&self, owner: &str, name: &str) -> Result<Option<DateTime<Utc>>> {
        debug!("fetching last commit for {}/{}", owner, name);
        let path = format!(
            "/api/v4/projects/{}/repository/commits",
            Self::project_path(owner, name)
        );
        let commits: Option<Vec<Commit>> = self
            .http
            .get_json(&self.base, &path, &self.headers(), &[("per_page", "1")])
            .await?;

        let date = commits
            .and_then(|c| c.into_iter().next())
            .and_then(|commit| commit.committed_date);

        Ok(date.as_deref().and_then(parse_datetime))
    }

    async fn archived(&self, owner: &str, name: &str) -> Result<Option<bool>> {
        let path = format!("/api/v4/projects/{}", Self::project_path(owner, name));
        let project: Option<Project> = self
            .http
            .get_json(&self.base, &path, &self.headers(), &[])
            .await?;
        Ok(project.map(|p| p.archived))
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
