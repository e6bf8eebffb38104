//! CLI for checking dependency freshness and health

use clap::{Parser, ValueEnum};
use colored::Colorize;
use dep_pulse::{
    check_dependencies, check_project, report, ProgressFn, PulseConfig, PulseReport, Severity,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dep-pulse")]
#[command(about = "Check how current and how healthy your dependencies are", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the project to check
    #[arg(short = 'p', long, default_value = ".", conflicts_with = "deps")]
    path: PathBuf,

    /// Check an explicit list of package names instead of a project
    #[arg(long, value_delimiter = ',')]
    deps: Vec<String>,

    /// Dependencies to exclude from pass/fail checks
    #[arg(long = "ignore", value_delimiter = ',')]
    ignore_dependencies: Vec<String>,

    /// Output format (default: terminal when attached to a TTY, else json)
    #[arg(short = 'f', long)]
    format: Option<OutputFormat>,

    /// Path to a configuration file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of dependencies checked concurrently
    #[arg(long)]
    max_parallel: Option<usize>,

    /// Maximum years since last activity considered safe (no warning)
    #[arg(long)]
    ok_years: Option<f64>,

    /// Maximum years since last activity that is only a warning
    #[arg(long)]
    warn_years: Option<f64>,

    /// GitHub API token (or GITHUB_TOKEN)
    #[arg(long)]
    github_token: Option<String>,

    /// GitLab personal access token (or GITLAB_TOKEN)
    #[arg(long)]
    gitlab_token: Option<String>,

    /// Bearer token for an alternate registry (or REGISTRY_TOKEN)
    #[arg(long)]
    registry_token: Option<String>,

    /// Exit 1 if any dependency is critical or archived
    #[arg(long)]
    fail_if_critical: bool,

    /// Exit 1 if any dependency is stale, critical, or archived
    #[arg(long)]
    fail_if_stale: bool,

    /// Exit 1 on vulnerabilities at or above SEVERITY (low, medium, high, critical)
    #[arg(long, value_name = "SEVERITY", num_args = 0..=1, default_missing_value = "low", value_parser = parse_severity)]
    fail_if_vulnerable: Option<Severity>,

    /// Exit 1 if any dependency is more than LIBYEARS behind
    #[arg(long, value_name = "LIBYEARS")]
    fail_if_outdated: Option<f64>,

    /// Exit 1 if any dependency's health score is below SCORE (0-100)
    #[arg(long, value_name = "SCORE")]
    fail_below_score: Option<u8>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Terminal,
    Markdown,
    Json,
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    s.parse()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    };

    let (on_progress, progress_bar) = progress_reporter();

    let result = if cli.deps.is_empty() {
        check_project(&cli.path, &config, on_progress).await
    } else {
        check_dependencies(&cli.deps, &config, on_progress).await
    };

    if let Some(bar) = progress_bar {
        bar.finish_and_clear();
    }

    let pulse = match result {
        Ok(pulse) => pulse,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    };

    render(&pulse, &config, cli.format);

    let violations = report::violations(&pulse, &config);
    if !violations.is_empty() {
        eprintln!(
            "\n{} {} check failures:",
            "Failed:".red().bold(),
            violations.len()
        );
        for violation in violations {
            eprintln!("  - {}", violation);
        }
        process::exit(1);
    }
}

fn build_config(cli: &Cli) -> anyhow::Result<PulseConfig> {
    let mut config = if let Some(config_path) = &cli.config {
        let content = std::fs::read_to_string(config_path)?;
        toml::from_str(&content)?
    } else {
        PulseConfig::default()
    };

    for dep in &cli.ignore_dependencies {
        config.ignored_dependencies.insert(dep.clone());
    }
    if let Some(max_parallel) = cli.max_parallel {
        config.max_parallel = max_parallel.max(1);
    }
    if let Some(ok_years) = cli.ok_years {
        config.activity.ok_years = ok_years;
    }
    if let Some(warn_years) = cli.warn_years {
        config.activity.warn_years = warn_years;
    }
    if cli.github_token.is_some() {
        config.tokens.github = cli.github_token.clone();
    }
    if cli.gitlab_token.is_some() {
        config.tokens.gitlab = cli.gitlab_token.clone();
    }
    if cli.registry_token.is_some() {
        config.tokens.registry = cli.registry_token.clone();
    }

    config.exit.fail_if_critical |= cli.fail_if_critical;
    config.exit.fail_if_stale |= cli.fail_if_stale;
    if cli.fail_if_vulnerable.is_some() {
        config.exit.fail_if_vulnerable = cli.fail_if_vulnerable;
    }
    if cli.fail_if_outdated.is_some() {
        config.exit.fail_if_outdated = cli.fail_if_outdated;
    }
    if cli.fail_below_score.is_some() {
        config.exit.fail_below_score = cli.fail_below_score;
    }

    if config.activity.ok_years > config.activity.warn_years {
        anyhow::bail!(
            "ok-years ({}) must not exceed warn-years ({})",
            config.activity.ok_years,
            config.activity.warn_years
        );
    }

    Ok(config)
}

/// Progress on stderr when attached to a terminal
fn progress_reporter() -> (Option<ProgressFn>, Option<ProgressBar>) {
    if !std::io::stderr().is_terminal() {
        return (None, None);
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} checking {pos}/{len} dependencies")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let bar_clone = bar.clone();
    let on_progress: ProgressFn = Arc::new(move |done, total| {
        bar_clone.set_length(total as u64);
        bar_clone.set_position(done as u64);
    });

    (Some(on_progress), Some(bar))
}

fn render(pulse: &PulseReport, config: &PulseConfig, format: Option<OutputFormat>) {
    let format = format.unwrap_or_else(|| {
        if std::io::stdout().is_terminal() {
            OutputFormat::Terminal
        } else {
            OutputFormat::Json
        }
    });

    match format {
        OutputFormat::Terminal => println!("{}", report::render_terminal(pulse, config)),
        OutputFormat::Markdown => print!("{}", report::render_markdown(pulse, config)),
        OutputFormat::Json => match report::render_json(pulse) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{} Failed to serialize report: {}", "Error:".red().bold(), e);
                process::exit(1);
            }
        },
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
