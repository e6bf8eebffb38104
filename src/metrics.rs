//! Derived metrics: activity level, libyear, up-to-date, health score
//!
//! Everything here is a pure function over an assembled
//! [`DependencyReport`]. Missing inputs degrade to `None` rather than
//! skewing a result: the composite health score averages only the
//! components that are actually known, renormalizing their weights.

use crate::config::ActivityThresholds;
use crate::types::{
    ActivityLevel, AdvisoryRecord, BatchSummary, DependencyReport, ResultSet, Severity,
};
use chrono::{DateTime, Utc};

/// Gregorian mean year (365.2425 days)
pub const SECONDS_PER_YEAR: f64 = 31_556_952.0;

const WEIGHT_VERSION_FRESHNESS: f64 = 30.0;
const WEIGHT_ACTIVITY: f64 = 25.0;
const WEIGHT_SCORECARD: f64 = 20.0;
const WEIGHT_VULNERABILITIES: f64 = 25.0;

/// Classify how recently a dependency showed any sign of life.
///
/// The most recent of last commit, latest release, and latest pre-release
/// is compared against the configured thresholds. An archived repository
/// is reported separately and does not change this classification.
pub fn activity_level(report: &DependencyReport, thresholds: &ActivityThresholds) -> ActivityLevel {
    let most_recent = [
        report.last_commit_at,
        report.latest_version_released_at,
        report.latest_prerelease_released_at,
    ]
    .into_iter()
    .flatten()
    .max();

    let Some(most_recent) = most_recent else {
        return ActivityLevel::Unknown;
    };

    let age_years = (Utc::now() - most_recent).num_seconds() as f64 / SECONDS_PER_YEAR;
    if age_years <= thresholds.ok_years {
        ActivityLevel::Ok
    } else if age_years <= thresholds.warn_years {
        ActivityLevel::Stale
    } else {
        ActivityLevel::Critical
    }
}

/// Years of releases missed, rounded to one decimal.
///
/// Never negative, even when the used version was published after the
/// latest release; `None` when either date is missing.
pub fn libyear(
    used_released_at: Option<DateTime<Utc>>,
    latest_released_at: Option<DateTime<Utc>>,
) -> Option<f64> {
    let used = used_released_at?;
    let latest = latest_released_at?;
    let years = (latest - used).num_seconds() as f64 / SECONDS_PER_YEAR;
    Some((years.max(0.0) * 10.0).round() / 10.0)
}

/// Whether the used version matches the latest release or pre-release;
/// `None` when neither latest value is known
pub fn up_to_date(
    version_used: &str,
    latest_version: Option<&str>,
    latest_prerelease: Option<&str>,
) -> Option<bool> {
    if latest_version.is_none() && latest_prerelease.is_none() {
        return None;
    }
    Some(latest_version == Some(version_used) || latest_prerelease == Some(version_used))
}

/// Composite health score, 0-100.
///
/// Weighted average of the known components only; each component's fixed
/// weight is renormalized against the sum of weights present. `None` when
/// no component is known.
pub fn health_score(
    report: &DependencyReport,
    thresholds: &ActivityThresholds,
) -> Option<u8> {
    let components = [
        (WEIGHT_VERSION_FRESHNESS, version_freshness_component(report)),
        (
            WEIGHT_ACTIVITY,
            activity_component(report, activity_level(report, thresholds)),
        ),
        (WEIGHT_SCORECARD, scorecard_component(report)),
        (WEIGHT_VULNERABILITIES, vulnerability_component(report)),
    ];

    let mut total_weight = 0.0;
    let mut weighted_sum = 0.0;
    for (weight, value) in components {
        if let Some(value) = value {
            total_weight += weight;
            weighted_sum += weight * value;
        }
    }

    if total_weight == 0.0 {
        return None;
    }
    Some((weighted_sum / total_weight).round() as u8)
}

fn version_freshness_component(report: &DependencyReport) -> Option<f64> {
    if report.version_yanked == Some(true) {
        return Some(0.0);
    }
    report.libyear.map(|ly| (100.0 - ly * 20.0).max(0.0).round())
}

fn activity_component(report: &DependencyReport, level: ActivityLevel) -> Option<f64> {
    if report.archived == Some(true) {
        return Some(0.0);
    }
    match level {
        ActivityLevel::Ok => Some(100.0),
        ActivityLevel::Stale => Some(40.0),
        ActivityLevel::Critical => Some(10.0),
        ActivityLevel::Unknown => None,
    }
}

fn scorecard_component(report: &DependencyReport) -> Option<f64> {
    report.scorecard_score.map(|score| (score * 10.0).round())
}

fn vulnerability_component(report: &DependencyReport) -> Option<f64> {
    report.vulnerability_count.map(|count| match count {
        0 => 100.0,
        1 => 40.0,
        2 => 20.0,
        _ => 0.0,
    })
}

/// The most severe band among the advisories with a known CVSS v3 score
pub fn highest_severity(advisories: &[AdvisoryRecord]) -> Option<Severity> {
    advisories
        .iter()
        .filter_map(|a| a.cvss3_score)
        .max_by(|a, b| a.total_cmp(b))
        .map(Severity::from_cvss)
}

/// Whether any advisory reaches the given severity floor
pub fn severity_at_or_above(advisories: &[AdvisoryRecord], floor: Severity) -> bool {
    highest_severity(advisories).map(|s| s >= floor).unwrap_or(false)
}

/// Batch-level statistics over a completed result set
pub fn summarize(results: &ResultSet, thresholds: &ActivityThresholds) -> BatchSummary {
    let mut summary = BatchSummary {
        total: results.len(),
        ..BatchSummary::default()
    };

    let mut scores: Vec<u8> = Vec::new();
    for report in results.values() {
        match activity_level(report, thresholds) {
            ActivityLevel::Ok => summary.ok += 1,
            ActivityLevel::Stale => summary.stale += 1,
            ActivityLevel::Critical => summary.critical += 1,
            ActivityLevel::Unknown => summary.unknown += 1,
        }
        if report.archived == Some(true) {
            summary.archived += 1;
        }
        match report.up_to_date {
            Some(true) => summary.up_to_date += 1,
            Some(false) => summary.outdated += 1,
            None => {}
        }
        if report.version_yanked == Some(true) {
            summary.yanked += 1;
        }
        summary.vulnerability_total += report.vulnerability_count.unwrap_or(0);
        summary.total_libyear += report.libyear.unwrap_or(0.0);
        if let Some(score) = report.health_score {
            scores.push(score);
        }
    }

    summary.total_libyear = (summary.total_libyear * 10.0).round() / 10.0;
    if !scores.is_empty() {
        let sum: u32 = scores.iter().map(|&s| s as u32).sum();
        summary.average_health_score =
            Some((sum as f64 / scores.len() as f64).round() as u8);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DependencySpec;
    use chrono::Duration;

    fn report() -> DependencyReport {
        DependencyReport::new(&DependencySpec::by_name("demo"))
    }

    fn thresholds() -> ActivityThresholds {
        ActivityThresholds {
            ok_years: 1.0,
            warn_years: 3.0,
        }
    }

    fn advisory(score: Option<f32>) -> AdvisoryRecord {
        AdvisoryRecord {
            id: "GHSA-test".to_string(),
            aliases: vec![],
            cvss3_score: score,
            title: None,
            url: None,
        }
    }

    #[test]
    fn test_libyear_same_date_is_zero() {
        let d = Utc::now();
        assert_eq!(libyear(Some(d), Some(d)), Some(0.0));
    }

    #[test]
    fn test_libyear_never_negative() {
        let latest = Utc::now() - Duration::days(400);
        let used = Utc::now();
        assert_eq!(libyear(Some(used), Some(latest)), Some(0.0));
    }

    #[test]
    fn test_libyear_rounding() {
        let latest = Utc::now();
        let used = latest - Duration::days(548); // ~1.5 years
        assert_eq!(libyear(Some(used), Some(latest)), Some(1.5));
    }

    #[test]
    fn test_libyear_missing_date_is_unknown() {
        assert_eq!(libyear(None, Some(Utc::now())), None);
        assert_eq!(libyear(Some(Utc::now()), None), None);
    }

    #[test]
    fn test_activity_level_recent_commit_is_ok() {
        let mut r = report();
        r.last_commit_at = Some(Utc::now());
        assert_eq!(activity_level(&r, &thresholds()), ActivityLevel::Ok);
    }

    #[test]
    fn test_activity_level_uses_most_recent_signal() {
        let mut r = report();
        r.last_commit_at = Some(Utc::now() - Duration::days(365 * 5));
        r.latest_prerelease_released_at = Some(Utc::now() - Duration::days(30));
        assert_eq!(activity_level(&r, &thresholds()), ActivityLevel::Ok);
    }

    #[test]
    fn test_activity_level_bands() {
        let mut r = report();
        r.latest_version_released_at = Some(Utc::now() - Duration::days(730));
        assert_eq!(activity_level(&r, &thresholds()), ActivityLevel::Stale);

        r.latest_version_released_at = Some(Utc::now() - Duration::days(365 * 4));
        assert_eq!(activity_level(&r, &thresholds()), ActivityLevel::Critical);
    }

    #[test]
    fn test_activity_level_unknown_without_signals() {
        assert_eq!(activity_level(&report(), &thresholds()), ActivityLevel::Unknown);
    }

    #[test]
    fn test_archived_does_not_change_activity_level() {
        let mut r = report();
        r.last_commit_at = Some(Utc::now());
        r.archived = Some(true);
        assert_eq!(activity_level(&r, &thresholds()), ActivityLevel::Ok);
    }

    #[test]
    fn test_up_to_date() {
        assert_eq!(up_to_date("1.0.0", Some("1.0.0"), None), Some(true));
        assert_eq!(up_to_date("1.0.0", Some("2.0.0"), None), Some(false));
        assert_eq!(up_to_date("2.0.0-rc.1", Some("1.9.0"), Some("2.0.0-rc.1")), Some(true));
        assert_eq!(up_to_date("1.0.0", None, None), None);
    }

    #[test]
    fn test_health_score_null_when_nothing_known() {
        assert_eq!(health_score(&report(), &thresholds()), None);
    }

    #[test]
    fn test_health_score_renormalizes_over_present_components() {
        // Only activity (100) and vulnerabilities (100) known: 25+25 weights.
        let mut r = report();
        r.last_commit_at = Some(Utc::now());
        r.vulnerability_count = Some(0);
        assert_eq!(health_score(&r, &thresholds()), Some(100));

        // Scorecard alone.
        let mut r = report();
        r.scorecard_score = Some(5.0);
        assert_eq!(health_score(&r, &thresholds()), Some(50));
    }

    #[test]
    fn test_health_score_yanked_zeroes_version_freshness() {
        let mut r = report();
        r.version_yanked = Some(true);
        // freshness 0 (weight 30) + vulnerabilities 100 (weight 25)
        r.vulnerability_count = Some(0);
        assert_eq!(health_score(&r, &thresholds()), Some(45));
    }

    #[test]
    fn test_health_score_archived_zeroes_activity() {
        let mut r = report();
        r.last_commit_at = Some(Utc::now());
        r.archived = Some(true);
        assert_eq!(health_score(&r, &thresholds()), Some(0));
    }

    #[test]
    fn test_health_score_monotonic_in_libyear() {
        let mut scores = Vec::new();
        for ly in [0.0, 1.0, 2.5, 6.0] {
            let mut r = report();
            r.libyear = Some(ly);
            r.vulnerability_count = Some(0);
            scores.push(health_score(&r, &thresholds()).unwrap());
        }
        assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{:?}", scores);
    }

    #[test]
    fn test_health_score_monotonic_in_vulnerability_count() {
        let mut scores = Vec::new();
        for count in [0, 1, 2, 3, 10] {
            let mut r = report();
            r.libyear = Some(0.0);
            r.vulnerability_count = Some(count);
            scores.push(health_score(&r, &thresholds()).unwrap());
        }
        assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{:?}", scores);
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(Severity::from_cvss(9.8), Severity::Critical);
        assert_eq!(Severity::from_cvss(7.0), Severity::High);
        assert_eq!(Severity::from_cvss(5.5), Severity::Medium);
        assert_eq!(Severity::from_cvss(1.0), Severity::Low);
    }

    #[test]
    fn test_highest_severity() {
        let advisories = vec![advisory(Some(4.2)), advisory(None), advisory(Some(9.1))];
        assert_eq!(highest_severity(&advisories), Some(Severity::Critical));
        assert_eq!(highest_severity(&[advisory(None)]), None);
        assert_eq!(highest_severity(&[]), None);
    }

    #[test]
    fn test_severity_at_or_above() {
        let advisories = vec![advisory(Some(7.5))];
        assert!(severity_at_or_above(&advisories, Severity::Medium));
        assert!(severity_at_or_above(&advisories, Severity::High));
        assert!(!severity_at_or_above(&advisories, Severity::Critical));
        assert!(!severity_at_or_above(&[], Severity::Low));
    }

    #[test]
    fn test_summarize() {
        let mut results = ResultSet::new();

        let mut fresh = report();
        fresh.name = "fresh".to_string();
        fresh.last_commit_at = Some(Utc::now());
        fresh.up_to_date = Some(true);
        fresh.vulnerability_count = Some(0);
        fresh.libyear = Some(0.0);
        fresh.health_score = Some(100);
        results.insert(fresh.name.clone(), fresh);

        let mut behind = report();
        behind.name = "behind".to_string();
        behind.latest_version_released_at = Some(Utc::now() - Duration::days(365 * 4));
        behind.up_to_date = Some(false);
        behind.version_yanked = Some(true);
        behind.vulnerability_count = Some(2);
        behind.libyear = Some(3.2);
        behind.health_score = Some(20);
        results.insert(behind.name.clone(), behind);

        let unknown = report();
        results.insert(unknown.name.clone(), unknown);

        let summary = summarize(&results, &thresholds());
        assert_eq!(summary.total, 3);
        assert_eq!(summary.ok, 1);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.unknown, 1);
        assert_eq!(summary.up_to_date, 1);
        assert_eq!(summary.outdated, 1);
        assert_eq!(summary.yanked, 1);
        assert_eq!(summary.vulnerability_total, 2);
        assert_eq!(summary.total_libyear, 3.2);
        assert_eq!(summary.average_health_score, Some(60));
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&ResultSet::new(), &thresholds());
        assert_eq!(summary.total, 0);
        assert_eq!(summary.average_health_score, None);
    }
}
