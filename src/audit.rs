//! Orchestration: fan the dependency list out, bounded and isolated
//!
//! One task per dependency, admitted under a counting permit. Every task
//! owns its report exclusively and publishes it into the shared result map
//! exactly once, on completion; a failure inside one task is caught at the
//! task boundary and never aborts a sibling. The scheduler returns only
//! after every task has finished.

use crate::config::PulseConfig;
use crate::depsdev::DepsDevClient;
use crate::error::{PulseError, Result};
use crate::hosts::HostClients;
use crate::http::HttpJsonClient;
use crate::manifest;
use crate::metrics;
use crate::registry::{self, RegistryClient};
use crate::repository::{self, RepositoryIdentity};
use crate::runtime::{self, EolClient};
use crate::types::{DependencyReport, DependencySpec, PulseReport, ResultSet, SourceKind};
use chrono::Utc;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

/// Completion callback: (completed count, total)
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// The external clients a run fans out to
pub struct Sources {
    pub registry: RegistryClient,
    pub hosts: HostClients,
    pub depsdev: DepsDevClient,
}

impl Sources {
    pub fn new(config: &PulseConfig) -> Result<Self> {
        let http = HttpJsonClient::new(&config.network)?;
        Ok(Self {
            registry: RegistryClient::new(http.clone(), config.tokens.registry.clone()),
            hosts: HostClients::new(http.clone(), config),
            depsdev: DepsDevClient::new(http),
        })
    }
}

/// Check a project's direct dependencies and assemble the full report
pub async fn check_project(
    project_path: &Path,
    config: &PulseConfig,
    on_progress: Option<ProgressFn>,
) -> Result<PulseReport> {
    info!("Checking project at: {}", project_path.display());

    let project_name = manifest::project_name(project_path)?;
    let specs = manifest::project_dependencies(project_path)?;
    info!(
        "Found {} direct dependencies for '{}'",
        specs.len(),
        project_name
    );

    let results = run(specs, config, on_progress).await?;
    let summary = metrics::summarize(&results, &config.activity);

    let eol = EolClient::new(HttpJsonClient::new(&config.network)?);
    let toolchain = runtime::toolchain_freshness(project_path, &eol).await;

    Ok(PulseReport {
        project_name: Some(project_name),
        timestamp: Utc::now(),
        dependencies: results,
        summary,
        toolchain,
    })
}

/// Check an explicit list of package names (no manifest involved)
pub async fn check_dependencies(
    names: &[String],
    config: &PulseConfig,
    on_progress: Option<ProgressFn>,
) -> Result<PulseReport> {
    let specs: Vec<DependencySpec> = names
        .iter()
        .map(|name| DependencySpec::by_name(name.clone()))
        .collect();

    let results = run(specs, config, on_progress).await?;
    let summary = metrics::summarize(&results, &config.activity);

    let eol = EolClient::new(HttpJsonClient::new(&config.network)?);
    let toolchain = runtime::toolchain_freshness(Path::new("."), &eol).await;

    Ok(PulseReport {
        project_name: None,
        timestamp: Utc::now(),
        dependencies: results,
        summary,
        toolchain,
    })
}

/// Run the bounded-parallel fan-out over a prepared spec list
pub async fn run(
    specs: Vec<DependencySpec>,
    config: &PulseConfig,
    on_progress: Option<ProgressFn>,
) -> Result<ResultSet> {
    let sources = Arc::new(Sources::new(config)?);
    Ok(run_with_sources(specs, sources, Arc::new(config.clone()), on_progress).await)
}

pub(crate) async fn run_with_sources(
    specs: Vec<DependencySpec>,
    sources: Arc<Sources>,
    config: Arc<PulseConfig>,
    on_progress: Option<ProgressFn>,
) -> ResultSet {
    let total = specs.len();
    let results: Arc<DashMap<String, DependencyReport>> = Arc::new(DashMap::new());
    let semaphore = Arc::new(Semaphore::new(config.max_parallel.max(1)));
    // Completed-count and callback are serialized together so every count
    // in 1..=total is reported exactly once, in order
    let progress = Arc::new(Mutex::new(0usize));

    let mut handles = Vec::with_capacity(total);
    for spec in specs.iter().cloned() {
        let sources = Arc::clone(&sources);
        let config = Arc::clone(&config);
        let results = Arc::clone(&results);
        let semaphore = Arc::clone(&semaphore);
        let progress = Arc::clone(&progress);
        let on_progress = on_progress.clone();

        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return, // semaphore is never closed
            };

            let mut report = DependencyReport::new(&spec);
            match process_dependency(&spec, &sources, &config, &mut report).await {
                Ok(()) => {}
                Err(PulseError::RateLimited { service }) => {
                    warn!(
                        "rate limited checking {} ({}): set an access token to increase your limit",
                        spec.name, service
                    );
                    report.error = Some(format!("rate limited by {}", service));
                }
                Err(e) => {
                    warn!("error occurred for {}: {}", spec.name, e);
                    report.error = Some(e.to_string());
                }
            }
            results.insert(spec.name.clone(), report);

            if let Some(callback) = &on_progress {
                let mut done = progress.lock().await;
                *done += 1;
                callback(*done, total);
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            warn!("task failed: {}", e);
        }
    }

    let mut results: ResultSet = match Arc::try_unwrap(results) {
        Ok(map) => map.into_iter().collect(),
        Err(shared) => shared
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect(),
    };

    // A panicked task still gets an error-marked entry
    for spec in &specs {
        results.entry(spec.name.clone()).or_insert_with(|| {
            let mut report = DependencyReport::new(spec);
            report.error = Some("check did not complete".to_string());
            report
        });
    }

    results
}

/// The full pipeline for one dependency.
///
/// Fields are written into the report as they are computed, so whatever
/// was learned before a failure survives in the published record.
async fn process_dependency(
    spec: &DependencySpec,
    sources: &Sources,
    config: &PulseConfig,
    report: &mut DependencyReport,
) -> Result<()> {
    debug!("checking {}", spec.name);

    match spec.source_kind {
        SourceKind::Registry => check_registry_dependency(spec, sources, report).await?,
        SourceKind::Vcs | SourceKind::LocalPath => {
            check_unpublished_dependency(spec, sources, report).await?
        }
    }

    report.health_score = metrics::health_score(report, &config.activity);
    Ok(())
}

async fn check_registry_dependency(
    spec: &DependencySpec,
    sources: &Sources,
    report: &mut DependencyReport,
) -> Result<()> {
    let versions = sources
        .registry
        .versions(&spec.name, spec.source_uri.as_deref())
        .await;

    let latest = registry::latest_release(&versions);
    report.latest_version = latest.map(|v| v.number.clone());
    report.latest_version_released_at = latest.and_then(|v| v.released_at);

    let latest_pre = registry::latest_prerelease(&versions);
    report.latest_prerelease_version = latest_pre.map(|v| v.number.clone());
    report.latest_prerelease_released_at = latest_pre.and_then(|v| v.released_at);

    if !versions.is_empty() {
        report.registry_url = sources
            .registry
            .package_page_url(&spec.name, spec.source_uri.as_deref());
    }

    if let Some(used) = &spec.version_used {
        let used_record = registry::find_version(&versions, used);
        report.version_used_released_at = used_record.and_then(|v| v.released_at);
        report.up_to_date = metrics::up_to_date(
            used,
            report.latest_version.as_deref(),
            report.latest_prerelease_version.as_deref(),
        );
        report.version_yanked = Some(
            !versions.is_empty() && used_record.map(|v| v.yanked).unwrap_or(true),
        );
        report.libyear = metrics::libyear(
            report.version_used_released_at,
            report.latest_version_released_at,
        );
    }

    report.repository = repository::resolve(
        &spec.name,
        &spec.repository_hints,
        &versions,
        &sources.registry,
    )
    .await;

    fetch_activity(sources, report).await?;

    let query_version = spec
        .version_used
        .clone()
        .or_else(|| report.latest_version.clone());
    if let Some(version) = query_version {
        if let Some(info) = sources.depsdev.version_info(&spec.name, &version).await {
            report.vulnerability_count = Some(info.advisory_ids.len());
            if let Some(project_id) = &info.project_id {
                report.scorecard_score = sources
                    .depsdev
                    .project_scorecard(project_id)
                    .await
                    .map(|s| s.score);
            }
            report.vulnerabilities = sources.depsdev.fetch_advisories(&info.advisory_ids).await;
        }
    }

    Ok(())
}

/// Git and path dependencies: no catalog to consult, so activity and the
/// scorecard are all the signal there is
async fn check_unpublished_dependency(
    spec: &DependencySpec,
    sources: &Sources,
    report: &mut DependencyReport,
) -> Result<()> {
    report.repository = repository::first_match(spec.repository_hints.iter().map(String::as_str))
        .unwrap_or_else(RepositoryIdentity::unhandled);

    fetch_activity(sources, report).await?;

    if let Some(project_id) = report.repository.project_id() {
        report.scorecard_score = sources
            .depsdev
            .project_scorecard(&project_id)
            .await
            .map(|s| s.score);
    }

    Ok(())
}

async fn fetch_activity(sources: &Sources, report: &mut DependencyReport) -> Result<()> {
    let Some(client) = sources.hosts.for_host(report.repository.host) else {
        return Ok(());
    };
    let (Some(owner), Some(name)) = (
        report.repository.owner.clone(),
        report.repository.name.clone(),
    ) else {
        return Ok(());
    };

    report.last_commit_at = client.last_commit_at(&owner, &name).await?;
    report.archived = client.archived(&owner, &name).await?;
    Ok(())
}
