//! Rendering: terminal table, Markdown table, JSON dump, exit policy

use crate::config::PulseConfig;
use crate::error::Result;
use crate::metrics;
use crate::types::{ActivityLevel, DependencyReport, PulseReport, Severity};
use chrono::{DateTime, Utc};
use colored::Colorize;

const HEADERS: [&str; 6] = ["Name", "Version", "Activity", "Health", "OpenSSF", "Vulns"];

#[derive(Clone, Copy)]
enum Tint {
    Plain,
    Dim,
    Green,
    Yellow,
    Red,
}

struct Cell {
    text: String,
    tint: Tint,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tint: Tint::Plain,
        }
    }

    fn tinted(text: impl Into<String>, tint: Tint) -> Self {
        Self {
            text: text.into(),
            tint,
        }
    }

    fn unknown() -> Self {
        Self::tinted("-", Tint::Dim)
    }

    fn painted(&self) -> String {
        match self.tint {
            Tint::Plain => self.text.clone(),
            Tint::Dim => self.text.dimmed().to_string(),
            Tint::Green => self.text.green().to_string(),
            Tint::Yellow => self.text.yellow().to_string(),
            Tint::Red => self.text.red().to_string(),
        }
    }
}

/// Activity as displayed: archived trumps the recency classification
pub fn displayed_activity(report: &DependencyReport, config: &PulseConfig) -> String {
    if report.archived == Some(true) {
        return "archived".to_string();
    }
    match metrics::activity_level(report, &config.activity) {
        ActivityLevel::Unknown => "-".to_string(),
        level => level.to_string(),
    }
}

/// Colored fixed-width table for TTY output
pub fn render_terminal(report: &PulseReport, config: &PulseConfig) -> String {
    let mut names: Vec<&String> = report.dependencies.keys().collect();
    names.sort();

    let rows: Vec<[Cell; 6]> = names
        .iter()
        .map(|name| build_row(&report.dependencies[*name], config))
        .collect();

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.text.chars().count());
        }
    }

    let mut lines = Vec::new();
    lines.push(
        HEADERS
            .iter()
            .zip(&widths)
            .map(|(h, w)| {
                let painted = h.bold().to_string();
                format!("{:<width$}", painted, width = w + 2 + ansi_overhead(&painted, h))
            })
            .collect::<String>(),
    );
    lines.push(
        widths
            .iter()
            .map(|w| "─".repeat(w + 2))
            .collect::<String>()
            .dimmed()
            .to_string(),
    );
    for row in &rows {
        lines.push(
            row.iter()
                .zip(&widths)
                .map(|(cell, w)| {
                    let painted = cell.painted();
                    format!(
                        "{:<width$}",
                        painted,
                        width = w + 2 + ansi_overhead(&painted, &cell.text)
                    )
                })
                .collect::<String>(),
        );
    }
    lines.push(String::new());
    lines.push(summary_line(report));
    if let Some(toolchain_line) = toolchain_line(report) {
        lines.push(toolchain_line);
    }
    lines.join("\n")
}

/// Pad against visible width: ANSI escapes take bytes but no columns
fn ansi_overhead(painted: &str, plain: &str) -> usize {
    painted.chars().count() - plain.chars().count()
}

fn build_row(dep: &DependencyReport, config: &PulseConfig) -> [Cell; 6] {
    [
        Cell::plain(&dep.name),
        version_cell(dep),
        activity_cell(dep, config),
        health_cell(dep),
        scorecard_cell(dep),
        vulns_cell(dep),
    ]
}

fn version_cell(dep: &DependencyReport) -> Cell {
    let used = dep.version_used.as_deref();
    let latest = dep.latest_version.as_deref();

    if dep.version_yanked == Some(true) {
        return Cell::tinted(
            format!("{} (YANKED)", used.unwrap_or("?")),
            Tint::Red,
        );
    }
    match (used, latest) {
        (None, None) => Cell::unknown(),
        (Some(used), Some(latest)) => {
            if metrics::up_to_date(used, Some(latest), None) == Some(true) {
                Cell::tinted(format!("{} (latest)", used), Tint::Green)
            } else {
                Cell::tinted(format!("{} → {}", used, latest), Tint::Yellow)
            }
        }
        (Some(used), None) => Cell::plain(used),
        (None, Some(latest)) => Cell::plain(latest),
    }
}

fn activity_cell(dep: &DependencyReport, config: &PulseConfig) -> Cell {
    if dep.archived == Some(true) {
        return Cell::tinted("archived", Tint::Red);
    }
    match metrics::activity_level(dep, &config.activity) {
        ActivityLevel::Ok => Cell::tinted("ok", Tint::Green),
        ActivityLevel::Stale => Cell::tinted("stale", Tint::Yellow),
        ActivityLevel::Critical => Cell::tinted("critical", Tint::Red),
        ActivityLevel::Unknown => Cell::unknown(),
    }
}

fn health_cell(dep: &DependencyReport) -> Cell {
    match dep.health_score {
        Some(score) if score >= 80 => Cell::tinted(score.to_string(), Tint::Green),
        Some(score) if score >= 50 => Cell::tinted(score.to_string(), Tint::Yellow),
        Some(score) => Cell::tinted(score.to_string(), Tint::Red),
        None => Cell::unknown(),
    }
}

fn scorecard_cell(dep: &DependencyReport) -> Cell {
    match dep.scorecard_score {
        Some(score) => Cell::plain(format!("{:.1}/10", score)),
        None => Cell::unknown(),
    }
}

fn vulns_cell(dep: &DependencyReport) -> Cell {
    let Some(count) = dep.vulnerability_count else {
        return Cell::unknown();
    };
    if count == 0 {
        return Cell::tinted("0", Tint::Green);
    }
    let label = match metrics::highest_severity(&dep.vulnerabilities) {
        Some(severity) => format!("{} ({})", count, severity),
        None => count.to_string(),
    };
    Cell::tinted(label, Tint::Red)
}

fn summary_line(report: &PulseReport) -> String {
    let s = &report.summary;
    let mut parts = Vec::new();

    let mut versions = format!(
        "{} dependencies: {} up to date, {} outdated",
        s.total, s.up_to_date, s.outdated
    );
    if s.yanked > 0 {
        versions.push_str(&format!(", {} yanked", s.yanked));
    }
    parts.push(versions);

    let stale_or_worse = s.stale + s.critical + s.archived;
    parts.push(format!("{} active, {} stale", s.ok, stale_or_worse));
    parts.push(format!("{} vulnerabilities", s.vulnerability_total));
    if s.total_libyear > 0.0 {
        parts.push(format!("{:.1} libyears behind", s.total_libyear));
    }
    if let Some(average) = s.average_health_score {
        parts.push(format!("average health {}/100", average));
    }
    parts.join(" · ")
}

fn toolchain_line(report: &PulseReport) -> Option<String> {
    let toolchain = report.toolchain.as_ref()?;
    let mut line = format!("rust {}", toolchain.version);
    match &toolchain.latest_version {
        Some(latest) if *latest == toolchain.version => line.push_str(" (latest)"),
        Some(latest) => line.push_str(&format!(" → {}", latest)),
        None => {}
    }
    if let Some(libyear) = toolchain.libyear {
        if libyear > 0.0 {
            line.push_str(&format!(" ({:.1} libyears behind)", libyear));
        }
    }
    if toolchain.eol == Some(true) {
        line.push_str(" (past end of life)");
    }
    Some(line)
}

/// Markdown table, one row per dependency plus a toolchain line
pub fn render_markdown(report: &PulseReport, config: &PulseConfig) -> String {
    let mut out = String::new();
    out.push_str(
        "| activity | up to date? | health | OpenSSF | vulns | name | version used | latest version | latest pre-release | last commit | libyear |\n",
    );
    out.push_str(
        "| -------- | ----------- | ------ | ------- | ----- | ---- | ------------ | -------------- | ------------------ | ----------- | ------- |\n",
    );

    let mut names: Vec<&String> = report.dependencies.keys().collect();
    names.sort();

    for name in names {
        let dep = &report.dependencies[name];
        let cells = [
            activity_marker(dep, config).to_string(),
            up_to_date_marker(dep).to_string(),
            dep.health_score
                .map(|s| s.to_string())
                .unwrap_or_else(|| "❓".to_string()),
            dep.scorecard_score
                .map(|s| format!("{:.1}/10", s))
                .unwrap_or_else(|| "❓".to_string()),
            markdown_vulns(dep),
            markdown_url(name, dep.repository.canonical_url.as_deref()),
            markdown_used_version(dep),
            markdown_version(
                dep.latest_version.as_deref(),
                dep.latest_version_released_at,
                dep,
            ),
            markdown_version(
                dep.latest_prerelease_version.as_deref(),
                dep.latest_prerelease_released_at,
                dep,
            ),
            markdown_url_opt(
                dep.last_commit_at.map(year_month),
                dep.repository.canonical_url.as_deref(),
            ),
            dep.libyear
                .map(|ly| format!("{:.1}y", ly))
                .unwrap_or_else(|| "-".to_string()),
        ];
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    if let Some(line) = toolchain_line(report) {
        out.push('\n');
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn activity_marker(dep: &DependencyReport, config: &PulseConfig) -> &'static str {
    if dep.archived == Some(true) {
        return "🚩";
    }
    match metrics::activity_level(dep, &config.activity) {
        ActivityLevel::Ok => "✅",
        ActivityLevel::Stale => "⚠️",
        ActivityLevel::Critical => "🚩",
        ActivityLevel::Unknown => "❓",
    }
}

fn up_to_date_marker(dep: &DependencyReport) -> &'static str {
    let Some(used) = dep.version_used.as_deref() else {
        return "❓";
    };
    if metrics::up_to_date(used, dep.latest_version.as_deref(), None) == Some(true) {
        return "✅";
    }
    // Riding a pre-release newer than the latest release
    if metrics::up_to_date(used, None, dep.latest_prerelease_version.as_deref()) == Some(true) {
        return "🔮";
    }
    match dep.up_to_date {
        Some(false) => "⚠️",
        _ => "❓",
    }
}

fn markdown_used_version(dep: &DependencyReport) -> String {
    if dep.version_yanked == Some(true) {
        return format!("{} (YANKED 🚩)", dep.version_used.as_deref().unwrap_or("?"));
    }
    markdown_version(dep.version_used.as_deref(), dep.version_used_released_at, dep)
}

fn markdown_version(
    version: Option<&str>,
    released_at: Option<DateTime<Utc>>,
    dep: &DependencyReport,
) -> String {
    let Some(version) = version else {
        return "❓".to_string();
    };
    let url = dep
        .registry_url
        .as_ref()
        .map(|base| format!("{}/{}", base, version));
    let linked = markdown_url(version, url.as_deref());
    match released_at {
        Some(date) => format!("{} ({})", linked, year_month(date)),
        None => linked,
    }
}

fn markdown_vulns(dep: &DependencyReport) -> String {
    let Some(count) = dep.vulnerability_count else {
        return "❓".to_string();
    };
    if count == 0 {
        return "✅".to_string();
    }

    let mut label = match metrics::highest_severity(&dep.vulnerabilities) {
        Some(severity) => format!("{} ({})", count, severity),
        None => count.to_string(),
    };
    let ids: Vec<&str> = dep
        .vulnerabilities
        .iter()
        .flat_map(|v| std::iter::once(v.id.as_str()).chain(v.aliases.iter().map(String::as_str)))
        .take(3)
        .collect();
    if !ids.is_empty() {
        label.push(' ');
        label.push_str(&ids.join(", "));
    }
    label
}

fn markdown_url(text: &str, url: Option<&str>) -> String {
    match url {
        Some(url) => format!("[{}]({})", text, url),
        None => text.to_string(),
    }
}

fn markdown_url_opt(text: Option<String>, url: Option<&str>) -> String {
    match text {
        Some(text) => markdown_url(&text, url),
        None => "❓".to_string(),
    }
}

fn year_month(date: DateTime<Utc>) -> String {
    date.format("%Y/%m").to_string()
}

/// JSON dump with deterministic key order
pub fn render_json(report: &PulseReport) -> Result<String> {
    let value = serde_json::to_value(report)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Exit-policy violations, one message per failing dependency check.
///
/// Ignored dependencies are reported in the output but exempt here.
pub fn violations(report: &PulseReport, config: &PulseConfig) -> Vec<String> {
    let mut messages = Vec::new();
    let mut names: Vec<&String> = report.dependencies.keys().collect();
    names.sort();

    for name in names {
        if config.ignored_dependencies.contains(name.as_str()) {
            continue;
        }
        let dep = &report.dependencies[name];
        let level = metrics::activity_level(dep, &config.activity);
        let archived = dep.archived == Some(true);

        let critical = archived || level == ActivityLevel::Critical;
        let stale_or_worse = critical || level == ActivityLevel::Stale;

        if config.exit.fail_if_critical && critical {
            messages.push(format!("{}: {}", name, displayed_activity(dep, config)));
        } else if config.exit.fail_if_stale && stale_or_worse {
            messages.push(format!("{}: {}", name, displayed_activity(dep, config)));
        }

        if let Some(floor) = config.exit.fail_if_vulnerable {
            let count = dep.vulnerability_count.unwrap_or(0);
            if count > 0
                && (floor == Severity::Low
                    || metrics::severity_at_or_above(&dep.vulnerabilities, floor))
            {
                messages.push(format!("{}: {} vulnerabilities", name, count));
            }
        }

        if let Some(threshold) = config.exit.fail_if_outdated {
            if dep.libyear.map(|ly| ly > threshold).unwrap_or(false) {
                messages.push(format!(
                    "{}: {:.1} libyears behind (limit {:.1})",
                    name,
                    dep.libyear.unwrap_or(0.0),
                    threshold
                ));
            }
        }

        if let Some(floor) = config.exit.fail_below_score {
            if dep.health_score.map(|s| s < floor).unwrap_or(false) {
                messages.push(format!(
                    "{}: health score {} < {}",
                    name,
                    dep.health_score.unwrap_or(0),
                    floor
                ));
            }
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AdvisoryRecord, BatchSummary, DependencySpec, ResultSet};

    fn dep(name: &str) -> DependencyReport {
        DependencyReport::new(&DependencySpec::by_name(name))
    }

    fn report_with(deps: Vec<DependencyReport>) -> PulseReport {
        let mut dependencies = ResultSet::new();
        for d in deps {
            dependencies.insert(d.name.clone(), d);
        }
        PulseReport {
            project_name: Some("demo".to_string()),
            timestamp: Utc::now(),
            summary: BatchSummary::default(),
            dependencies,
            toolchain: None,
        }
    }

    fn config() -> PulseConfig {
        PulseConfig::default()
    }

    #[test]
    fn test_markdown_row_for_outdated_dependency() {
        let mut d = dep("serde");
        d.version_used = Some("1.0.0".to_string());
        d.latest_version = Some("1.0.200".to_string());
        d.up_to_date = Some(false);
        d.libyear = Some(2.5);
        d.registry_url = Some("https://crates.io/crates/serde".to_string());
        d.vulnerability_count = Some(0);

        let md = render_markdown(&report_with(vec![d]), &config());
        assert!(md.contains("| activity |"));
        assert!(md.contains("[1.0.200](https://crates.io/crates/serde/1.0.200)"));
        assert!(md.contains("2.5y"));
        assert!(md.contains("⚠️"));
        assert!(md.contains("✅"));
    }

    #[test]
    fn test_markdown_yanked_marker() {
        let mut d = dep("oops");
        d.version_used = Some("0.1.0".to_string());
        d.latest_version = Some("0.2.0".to_string());
        d.version_yanked = Some(true);

        let md = render_markdown(&report_with(vec![d]), &config());
        assert!(md.contains("0.1.0 (YANKED 🚩)"));
    }

    #[test]
    fn test_terminal_render_contains_summary() {
        let mut d = dep("serde");
        d.version_used = Some("1.0.0".to_string());
        d.latest_version = Some("1.0.0".to_string());
        d.up_to_date = Some(true);
        let mut report = report_with(vec![d]);
        report.summary.total = 1;
        report.summary.up_to_date = 1;

        let rendered = render_terminal(&report, &config());
        assert!(rendered.contains("serde"));
        assert!(rendered.contains("1 dependencies: 1 up to date, 0 outdated"));
    }

    #[test]
    fn test_json_is_deterministic_and_parseable() {
        let mut d1 = dep("zzz");
        d1.libyear = Some(1.0);
        let d2 = dep("aaa");
        let report = report_with(vec![d1, d2]);

        let first = render_json(&report).unwrap();
        let second = render_json(&report).unwrap();
        assert_eq!(first, second);

        let value: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert!(value["dependencies"]["zzz"]["libyear"].as_f64().is_some());
    }

    #[test]
    fn test_violations_respect_ignore_list() {
        let mut archived = dep("old-one");
        archived.archived = Some(true);
        let report = report_with(vec![archived]);

        let mut config = config();
        config.exit.fail_if_critical = true;
        assert_eq!(violations(&report, &config).len(), 1);

        config.ignored_dependencies.insert("old-one".to_string());
        assert!(violations(&report, &config).is_empty());
    }

    #[test]
    fn test_violations_severity_floor() {
        let mut vulnerable = dep("leaky");
        vulnerable.vulnerability_count = Some(1);
        vulnerable.vulnerabilities = vec![AdvisoryRecord {
            id: "GHSA-1".to_string(),
            aliases: vec![],
            cvss3_score: Some(5.0),
            title: None,
            url: None,
        }];
        let report = report_with(vec![vulnerable]);

        let mut config = config();
        config.exit.fail_if_vulnerable = Some(Severity::High);
        assert!(violations(&report, &config).is_empty());

        config.exit.fail_if_vulnerable = Some(Severity::Medium);
        assert_eq!(violations(&report, &config).len(), 1);

        config.exit.fail_if_vulnerable = Some(Severity::Low);
        assert_eq!(violations(&report, &config).len(), 1);
    }

    #[test]
    fn test_violations_libyear_and_score_floors() {
        let mut behind = dep("behind");
        behind.libyear = Some(4.0);
        behind.health_score = Some(30);
        let report = report_with(vec![behind]);

        let mut config = config();
        config.exit.fail_if_outdated = Some(3.0);
        config.exit.fail_below_score = Some(50);
        let messages = violations(&report, &config);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("libyears behind"));
        assert!(messages[1].contains("health score 30 < 50"));
    }
}
