//! Configuration for the checker: parallelism, thresholds, tokens, exit policy

use crate::types::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Main configuration for a checker run.
///
/// Built once and threaded into the scheduler and every client at
/// construction time; never mutated while a run is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Maximum number of dependencies checked concurrently
    pub max_parallel: usize,
    /// Thresholds for the activity-level classification
    pub activity: ActivityThresholds,
    /// Dependencies exempt from exit-status checks (still checked and reported)
    pub ignored_dependencies: HashSet<String>,
    /// Access tokens for external services
    pub tokens: AccessTokens,
    /// Network configuration
    pub network: NetworkConfig,
    /// Exit-status policy
    pub exit: ExitPolicy,
}

/// Years-since-last-activity thresholds for the activity classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityThresholds {
    /// Activity within this many years raises no warning
    pub ok_years: f64,
    /// Activity within this many years is stale; beyond it is critical
    pub warn_years: f64,
}

/// Access tokens for external services.
///
/// Every token is optional; requests go out unauthenticated (with the
/// lower public rate limit) when the corresponding token is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessTokens {
    /// GitHub API token
    pub github: Option<String>,
    /// GitLab personal access token
    pub gitlab: Option<String>,
    /// Bearer token for an alternate package registry
    pub registry: Option<String>,
}

/// Network configuration for API calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-request connect/read timeout in seconds
    pub timeout_secs: u64,
}

/// What turns a completed report into a non-zero exit status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitPolicy {
    /// Fail if any dependency is critical or archived
    pub fail_if_critical: bool,
    /// Fail if any dependency is stale, critical, or archived
    pub fail_if_stale: bool,
    /// Fail if any dependency has a vulnerability at or above this severity
    pub fail_if_vulnerable: Option<Severity>,
    /// Fail if any dependency is more than this many libyears behind
    pub fail_if_outdated: Option<f64>,
    /// Fail if any dependency's health score is below this value (0-100)
    pub fail_below_score: Option<u8>,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            max_parallel: 10,
            activity: ActivityThresholds::default(),
            ignored_dependencies: HashSet::new(),
            tokens: AccessTokens::default(),
            network: NetworkConfig::default(),
            exit: ExitPolicy::default(),
        }
    }
}

impl Default for ActivityThresholds {
    fn default() -> Self {
        Self {
            ok_years: 1.0,
            warn_years: 3.0,
        }
    }
}

impl Default for AccessTokens {
    fn default() -> Self {
        Self {
            github: std::env::var("GITHUB_TOKEN").ok(),
            gitlab: std::env::var("GITLAB_TOKEN").ok(),
            registry: std::env::var("REGISTRY_TOKEN").ok(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl NetworkConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PulseConfig {
    /// Create a new builder for PulseConfig
    pub fn builder() -> PulseConfigBuilder {
        PulseConfigBuilder::default()
    }
}

/// Builder for PulseConfig
#[derive(Default)]
pub struct PulseConfigBuilder {
    max_parallel: Option<usize>,
    activity: Option<ActivityThresholds>,
    tokens: Option<AccessTokens>,
    network: Option<NetworkConfig>,
    exit: Option<ExitPolicy>,
    ignored_dependencies: HashSet<String>,
}

impl PulseConfigBuilder {
    pub fn max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = Some(max_parallel);
        self
    }

    pub fn activity(mut self, thresholds: ActivityThresholds) -> Self {
        self.activity = Some(thresholds);
        self
    }

    pub fn tokens(mut self, tokens: AccessTokens) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    pub fn exit(mut self, exit: ExitPolicy) -> Self {
        self.exit = Some(exit);
        self
    }

    pub fn ignore_dependency(mut self, name: impl Into<String>) -> Self {
        self.ignored_dependencies.insert(name.into());
        self
    }

    pub fn build(self) -> PulseConfig {
        PulseConfig {
            max_parallel: self.max_parallel.unwrap_or(10),
            activity: self.activity.unwrap_or_default(),
            ignored_dependencies: self.ignored_dependencies,
            tokens: self.tokens.unwrap_or_default(),
            network: self.network.unwrap_or_default(),
            exit: self.exit.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PulseConfig::default();
        assert_eq!(config.max_parallel, 10);
        assert_eq!(config.activity.ok_years, 1.0);
        assert_eq!(config.activity.warn_years, 3.0);
        assert_eq!(config.network.timeout_secs, 10);
        assert!(!config.exit.fail_if_critical);
    }

    #[test]
    fn test_builder() {
        let config = PulseConfig::builder()
            .max_parallel(4)
            .activity(ActivityThresholds {
                ok_years: 0.5,
                warn_years: 2.0,
            })
            .ignore_dependency("serde")
            .build();

        assert_eq!(config.max_parallel, 4);
        assert_eq!(config.activity.warn_years, 2.0);
        assert!(config.ignored_dependencies.contains("serde"));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            max_parallel = 3

            [activity]
            ok_years = 1.0
            warn_years = 5.0

            [tokens]
            github = "abc"

            [network]
            timeout_secs = 5

            [exit]
            fail_if_critical = true
            fail_if_vulnerable = "high"
        "#;

        let config: PulseConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_parallel, 3);
        assert_eq!(config.activity.warn_years, 5.0);
        assert_eq!(config.tokens.github.as_deref(), Some("abc"));
        assert_eq!(config.network.timeout_secs, 5);
        assert!(config.exit.fail_if_critical);
        assert_eq!(config.exit.fail_if_vulnerable, Some(Severity::High));
    }
}
