//! Toolchain freshness against the endoflife.date release-cycle feed
//!
//! Runs once per check, outside the dependency fan-out. The toolchain
//! version comes from a `rust-toolchain` pin when the project declares
//! one, otherwise from the `rustc` on PATH; a pre-release toolchain with
//! no pin has no cycle to compare against and yields `None`.

use crate::http::HttpJsonClient;
use crate::metrics;
use crate::types::ToolchainFreshness;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

const END_OF_LIFE_API: &str = "https://endoflife.date";

/// Client for the endoflife.date release-cycle feed
#[derive(Debug, Clone)]
pub struct EolClient {
    http: HttpJsonClient,
    base: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseCycle {
    cycle: String,
    release_date: Option<String>,
    eol: Option<EolValue>,
    latest: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EolValue {
    Flag(bool),
    Date(String),
}

#[derive(Debug, Deserialize)]
struct ToolchainFile {
    toolchain: Option<ToolchainSection>,
}

#[derive(Debug, Deserialize)]
struct ToolchainSection {
    channel: Option<String>,
}

impl EolClient {
    pub fn new(http: HttpJsonClient) -> Self {
        Self::with_base_url(http, END_OF_LIFE_API.to_string())
    }

    pub fn with_base_url(http: HttpJsonClient, base: String) -> Self {
        Self { http, base }
    }

    async fn cycles(&self) -> Option<Vec<ReleaseCycle>> {
        self.http
            .get_json(&self.base, "/api/rust.json", &[], &[])
            .await
            .ok()
            .flatten()
    }
}

/// Compare the active toolchain against the release-cycle feed.
///
/// `None` when the feed is unavailable or no release version could be
/// determined.
pub async fn toolchain_freshness(
    project_path: &Path,
    eol: &EolClient,
) -> Option<ToolchainFreshness> {
    let version = toolchain_version(project_path).await?;
    debug!("checking toolchain freshness for {}", version);

    let cycles = eol.cycles().await?;
    let latest_cycle = cycles.first()?;
    let current_cycle = find_cycle(&cycles, &version);

    let released_at = current_cycle
        .and_then(|c| c.release_date.as_deref())
        .and_then(parse_date);
    let latest_released_at = latest_cycle.release_date.as_deref().and_then(parse_date);
    let eol_value = current_cycle.and_then(|c| c.eol.as_ref());

    Some(ToolchainFreshness {
        version,
        released_at,
        eol: eol_reached(eol_value),
        eol_date: eol_date(eol_value),
        latest_version: latest_cycle.latest.clone(),
        latest_released_at,
        libyear: metrics::libyear(released_at, latest_released_at),
    })
}

/// Pinned version if the project declares one, else the release version
/// of the `rustc` on PATH
async fn toolchain_version(project_path: &Path) -> Option<String> {
    if let Some(pin) = pinned_toolchain(project_path) {
        return Some(pin);
    }

    let output = Command::new("rustc").arg("--version").output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = stdout.split_whitespace().nth(1)?.to_string();
    // nightly/beta carries a pre-release suffix; without a pin there is
    // no release cycle to compare against
    if version.contains('-') {
        return None;
    }
    Some(version)
}

fn pinned_toolchain(project_path: &Path) -> Option<String> {
    let toml_path = project_path.join("rust-toolchain.toml");
    if let Ok(content) = std::fs::read_to_string(&toml_path) {
        let channel = toml::from_str::<ToolchainFile>(&content)
            .ok()
            .and_then(|file| file.toolchain)
            .and_then(|section| section.channel);
        if let Some(channel) = channel {
            if is_version_pin(&channel) {
                return Some(channel);
            }
        }
    }

    let legacy_path = project_path.join("rust-toolchain");
    if let Ok(content) = std::fs::read_to_string(&legacy_path) {
        let channel = content.trim().to_string();
        if is_version_pin(&channel) {
            return Some(channel);
        }
    }

    None
}

/// `1.78` or `1.78.0` style pins; channel names are not pins
fn is_version_pin(channel: &str) -> bool {
    let parts: Vec<&str> = channel.split('.').collect();
    (2..=3).contains(&parts.len())
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

fn find_cycle<'a>(cycles: &'a [ReleaseCycle], version: &str) -> Option<&'a ReleaseCycle> {
    let major_minor = version.split('.').take(2).collect::<Vec<_>>().join(".");
    cycles.iter().find(|c| c.cycle == major_minor)
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
}

fn eol_date(value: Option<&EolValue>) -> Option<DateTime<Utc>> {
    match value {
        Some(EolValue::Date(date)) => parse_date(date),
        _ => None,
    }
}

fn eol_reached(value: Option<&EolValue>) -> Option<bool> {
    match value {
        Some(EolValue::Flag(flag)) => Some(*flag),
        Some(EolValue::Date(date)) => parse_date(date).map(|d| d <= Utc::now()),
        None => None,
    }
}
