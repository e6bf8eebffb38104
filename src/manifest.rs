//! Dependency specs from the Cargo resolve graph
//!
//! Direct dependencies of the root package (or of every workspace member)
//! become the checked set, with their resolved versions, source
//! classification, and the repository/homepage URLs the locally installed
//! package declares.

use crate::error::{PulseError, Result};
use crate::types::{DependencySpec, SourceKind};
use cargo_metadata::{Metadata, MetadataCommand, Package};
use std::collections::HashSet;
use std::path::Path;

/// Parse a project and extract its direct dependencies
pub fn project_dependencies(project_path: &Path) -> Result<Vec<DependencySpec>> {
    let metadata = get_cargo_metadata(project_path)?;
    extract_dependencies(&metadata)
}

/// Get the name of the project from its manifest
pub fn project_name(project_path: &Path) -> Result<String> {
    let metadata = get_cargo_metadata(project_path)?;

    if let Some(resolve) = &metadata.resolve {
        if let Some(root_id) = &resolve.root {
            if let Some(root_pkg) = metadata.packages.iter().find(|p| &p.id == root_id) {
                return Ok(root_pkg.name.clone());
            }
        }
    }

    metadata
        .packages
        .first()
        .map(|p| p.name.clone())
        .ok_or_else(|| PulseError::manifest("Could not determine project name"))
}

fn get_cargo_metadata(project_path: &Path) -> Result<Metadata> {
    let manifest_path = project_path.join("Cargo.toml");

    if !manifest_path.exists() {
        return Err(PulseError::manifest(format!(
            "Cargo.toml not found at {}",
            manifest_path.display()
        )));
    }

    let metadata = MetadataCommand::new()
        .manifest_path(&manifest_path)
        .exec()?;

    Ok(metadata)
}

fn extract_dependencies(metadata: &Metadata) -> Result<Vec<DependencySpec>> {
    let root_packages: Vec<&Package> = if let Some(resolve) = &metadata.resolve {
        resolve
            .root
            .as_ref()
            .and_then(|root_id| metadata.packages.iter().find(|p| &p.id == root_id))
            .map(|p| vec![p])
            .unwrap_or_else(|| {
                // Workspace: every member's direct dependencies count
                metadata
                    .workspace_members
                    .iter()
                    .filter_map(|id| metadata.packages.iter().find(|p| &p.id == id))
                    .collect()
            })
    } else {
        return Err(PulseError::manifest("No dependency resolution found"));
    };

    let root_ids: HashSet<_> = root_packages.iter().map(|p| &p.id).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut specs = Vec::new();

    for root_pkg in &root_packages {
        for dep in &root_pkg.dependencies {
            if !seen.insert(dep.name.as_str()) {
                continue;
            }
            // Resolved package for this declared dependency; absent when a
            // feature-gated dependency is not enabled
            let Some(pkg) = metadata
                .packages
                .iter()
                .find(|p| p.name == dep.name && !root_ids.contains(&p.id))
            else {
                continue;
            };
            specs.push(spec_for(pkg));
        }
    }

    Ok(specs)
}

fn spec_for(pkg: &Package) -> DependencySpec {
    let (source_kind, source_uri) = classify_source(pkg.source.as_ref().map(|s| s.repr.as_str()));

    let mut repository_hints = Vec::new();
    if source_kind == SourceKind::Vcs {
        if let Some(uri) = &source_uri {
            repository_hints.push(uri.clone());
        }
    }
    for url in [pkg.repository.as_ref(), pkg.homepage.as_ref()]
        .into_iter()
        .flatten()
    {
        if !repository_hints.contains(url) {
            repository_hints.push(url.clone());
        }
    }

    DependencySpec {
        name: pkg.name.clone(),
        version_used: Some(pkg.version.to_string()),
        source_kind,
        source_uri,
        repository_hints,
    }
}

/// Classify a cargo source string into a source kind and URI
fn classify_source(repr: Option<&str>) -> (SourceKind, Option<String>) {
    let Some(repr) = repr else {
        // No source means a path dependency or workspace member
        return (SourceKind::LocalPath, None);
    };

    if let Some(url) = repr
        .strip_prefix("registry+")
        .or_else(|| repr.strip_prefix("sparse+"))
    {
        (SourceKind::Registry, Some(url.to_string()))
    } else if let Some(rest) = repr.strip_prefix("git+") {
        let url = rest
            .split(['?', '#'])
            .next()
            .unwrap_or(rest)
            .to_string();
        (SourceKind::Vcs, Some(url))
    } else if let Some(path) = repr.strip_prefix("path+file://") {
        (SourceKind::LocalPath, Some(path.to_string()))
    } else {
        (SourceKind::LocalPath, None)
    }
}
