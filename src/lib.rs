//! # dep-pulse
//!
//! Answers, for every dependency of a project, "how current and how
//! healthy is it?" by reconciling several independent sources:
//! - **Registry**: published versions, latest release/pre-release, yanked
//!   status, libyear drift
//! - **Source host** (GitHub/GitLab): last commit, archived flag
//! - **deps.dev**: known advisories and the OpenSSF scorecard
//! - **endoflife.date**: freshness of the active Rust toolchain
//!
//! Each dependency is checked in its own task under a bounded-parallelism
//! scheduler; one dependency failing, timing out, or being rate limited
//! never aborts the batch; missing data degrades to "unknown" and the
//! composite health score is computed from whatever is known.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dep_pulse::{check_project, PulseConfig};
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> dep_pulse::Result<()> {
//! let config = PulseConfig::default();
//! let report = check_project(Path::new("."), &config, None).await?;
//!
//! for (name, dep) in &report.dependencies {
//!     println!("{}: {:?} (libyear: {:?})", name, dep.health_score, dep.libyear);
//! }
//! # Ok(())
//! # }
//! ```

mod audit;
mod config;
mod depsdev;
mod error;
mod hosts;
mod http;
mod manifest;
pub mod metrics;
mod registry;
mod repository;
pub mod report;
mod runtime;
mod types;

// Re-export public API
pub use audit::{check_dependencies, check_project, run, ProgressFn, Sources};
pub use config::{
    AccessTokens, ActivityThresholds, ExitPolicy, NetworkConfig, PulseConfig, PulseConfigBuilder,
};
pub use error::{PulseError, Result};
pub use repository::{RepoHost, RepositoryIdentity};
pub use types::{
    ActivityLevel, AdvisoryRecord, BatchSummary, DependencyReport, DependencySpec, PulseReport,
    ResultSet, Severity, SourceKind, ToolchainFreshness, VersionRecord,
};
