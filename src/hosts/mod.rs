//! Per-host activity lookups (last commit, archived flag)
//!
//! One client per recognized source host, dispatched through the
//! [`ActivitySource`] trait. An unhandled host never reaches a client;
//! callers get `None` for both data points without a network call.

pub mod github;
pub mod gitlab;

pub use github::GithubClient;
pub use gitlab::GitlabClient;

use crate::config::PulseConfig;
use crate::error::Result;
use crate::http::HttpJsonClient;
use crate::repository::RepoHost;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Commit-history and archived-flag lookups for one source host
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Timestamp of the most recent commit, `None` when unknown
    async fn last_commit_at(&self, owner: &str, name: &str) -> Result<Option<DateTime<Utc>>>;

    /// Whether the repository is archived, `None` when unknown
    async fn archived(&self, owner: &str, name: &str) -> Result<Option<bool>>;
}

/// The closed set of host clients, picked by resolved repository host
pub struct HostClients {
    pub github: GithubClient,
    pub gitlab: GitlabClient,
}

impl HostClients {
    pub fn new(http: HttpJsonClient, config: &PulseConfig) -> Self {
        Self {
            github: GithubClient::new(http.clone(), config.tokens.github.clone()),
            gitlab: GitlabClient::new(http, config.tokens.gitlab.clone()),
        }
    }

    /// The client for a resolved host; `None` short-circuits unhandled hosts
    pub fn for_host(&self, host: RepoHost) -> Option<&dyn ActivitySource> {
        match host {
            RepoHost::Github => Some(&self.github),
            RepoHost::Gitlab => Some(&self.gitlab),
            RepoHost::Unhandled => None,
        }
    }
}
