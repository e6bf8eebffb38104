//! Core data types for dependency freshness reporting

use crate::repository::RepositoryIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a dependency comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A package registry (crates.io or an alternate registry)
    Registry,
    /// A git repository pinned in the lockfile
    Vcs,
    /// A local path dependency
    LocalPath,
}

/// One tracked dependency, as read from the lockfile or supplied by name.
///
/// Immutable input to the scheduler; one per dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Package name
    pub name: String,
    /// Exact version in use, when known
    pub version_used: Option<String>,
    /// Kind of source the dependency resolves from
    pub source_kind: SourceKind,
    /// Source URI for alternate registries or git dependencies
    pub source_uri: Option<String>,
    /// Repository/homepage URLs declared by the locally installed package
    pub repository_hints: Vec<String>,
}

impl DependencySpec {
    /// A registry dependency known only by name (explicit `--deps` list)
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_used: None,
            source_kind: SourceKind::Registry,
            source_uri: None,
            repository_hints: Vec::new(),
        }
    }
}

/// One published version as listed by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Version number string
    pub number: String,
    /// Whether this is a pre-release
    pub is_prerelease: bool,
    /// Whether the registry flags this version as yanked
    pub yanked: bool,
    /// Publication timestamp, when the registry supplies one
    pub released_at: Option<DateTime<Utc>>,
    /// Per-version source repository URL, when the registry supplies one
    pub source_code_uri: Option<String>,
}

/// A known advisory affecting a dependency version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryRecord {
    /// Advisory identifier (e.g. GHSA id)
    pub id: String,
    /// Alternate identifiers (e.g. CVE ids)
    pub aliases: Vec<String>,
    /// CVSS v3 score, 0.0-10.0
    pub cvss3_score: Option<f32>,
    /// Short human-readable title
    pub title: Option<String>,
    /// Link to the advisory
    pub url: Option<String>,
}

/// Coarse severity bands derived from a CVSS v3 score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Band a CVSS v3 score into a severity level
    pub fn from_cvss(score: f32) -> Self {
        if score >= 9.0 {
            Self::Critical
        } else if score >= 7.0 {
            Self::High
        } else if score >= 4.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// Activity classification for a dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    /// Recent sign of life (commit, release, or pre-release)
    Ok,
    /// No activity within the no-warning window
    Stale,
    /// No activity within the warning window either
    Critical,
    /// No activity data at all
    Unknown,
}

impl std::fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Stale => write!(f, "stale"),
            Self::Critical => write!(f, "critical"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Everything learned about one dependency.
///
/// Owned by the task checking that dependency and published into the
/// shared result set exactly once, on completion. Any field can be absent:
/// a missing data point means the source for it was unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyReport {
    pub name: String,
    pub source_kind: SourceKind,
    pub version_used: Option<String>,
    pub version_used_released_at: Option<DateTime<Utc>>,
    pub latest_version: Option<String>,
    pub latest_version_released_at: Option<DateTime<Utc>>,
    pub latest_prerelease_version: Option<String>,
    pub latest_prerelease_released_at: Option<DateTime<Utc>>,
    /// Resolved source repository identity
    pub repository: RepositoryIdentity,
    /// Registry page for the package, when it is listed there
    pub registry_url: Option<String>,
    pub last_commit_at: Option<DateTime<Utc>>,
    pub archived: Option<bool>,
    /// OpenSSF scorecard, 0.0-10.0
    pub scorecard_score: Option<f64>,
    pub vulnerabilities: Vec<AdvisoryRecord>,
    /// Number of advisory ids reported, even if some details failed to resolve
    pub vulnerability_count: Option<usize>,
    pub up_to_date: Option<bool>,
    pub version_yanked: Option<bool>,
    /// Years of releases missed, rounded to one decimal
    pub libyear: Option<f64>,
    /// Composite health score, 0-100
    pub health_score: Option<u8>,
    /// Error caught at the task boundary, if the check did not complete
    pub error: Option<String>,
}

impl DependencyReport {
    /// Start an empty report for a dependency
    pub fn new(spec: &DependencySpec) -> Self {
        Self {
            name: spec.name.clone(),
            source_kind: spec.source_kind,
            version_used: spec.version_used.clone(),
            version_used_released_at: None,
            latest_version: None,
            latest_version_released_at: None,
            latest_prerelease_version: None,
            latest_prerelease_released_at: None,
            repository: RepositoryIdentity::unhandled(),
            registry_url: None,
            last_commit_at: None,
            archived: None,
            scorecard_score: None,
            vulnerabilities: Vec::new(),
            vulnerability_count: None,
            up_to_date: None,
            version_yanked: None,
            libyear: None,
            health_score: None,
            error: None,
        }
    }
}

/// Results keyed by dependency name; one entry per input spec
pub type ResultSet = HashMap<String, DependencyReport>;

/// Aggregated statistics over a result set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub ok: usize,
    pub stale: usize,
    pub critical: usize,
    pub unknown: usize,
    pub archived: usize,
    pub up_to_date: usize,
    pub outdated: usize,
    pub yanked: usize,
    pub vulnerability_total: usize,
    /// Sum of libyears across dependencies with known drift
    pub total_libyear: f64,
    /// Unweighted mean of the per-dependency health scores
    pub average_health_score: Option<u8>,
}

/// Freshness of the active Rust toolchain against the release cycle feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainFreshness {
    pub version: String,
    pub released_at: Option<DateTime<Utc>>,
    pub eol: Option<bool>,
    pub eol_date: Option<DateTime<Utc>>,
    pub latest_version: Option<String>,
    pub latest_released_at: Option<DateTime<Utc>>,
    pub libyear: Option<f64>,
}

/// Complete output of one checker run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseReport {
    /// Name of the checked project, when read from a manifest
    pub project_name: Option<String>,
    /// Timestamp when the check was performed
    pub timestamp: DateTime<Utc>,
    /// Per-dependency results
    pub dependencies: ResultSet,
    /// Batch-level statistics
    pub summary: BatchSummary,
    /// Toolchain freshness, when the feed and an unambiguous version were available
    pub toolchain: Option<ToolchainFreshness>,
}
