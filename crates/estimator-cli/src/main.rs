//! Estimator CLI - Inspection Repair Cost Estimation
//!
//! The `estimator` command turns a JSON file of classified inspection
//! issues into a cost report.
//!
//! ## Commands
//!
//! - `estimate`: Estimate every issue and write the batch report as JSON
//! - `lookup`: Query the reference cost table directly
//! - `check-config`: Validate an engine configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cost_reference::{ComplexityTier, CostCatalog, LookupAttributes, ReferenceCostTable};
use estimator_core::{load_issues, BatchReport, EngineConfig, EstimationEngine};
use genai_provider::fakes::UnavailableProvider;
use genai_provider::{
    GenerativeEstimateProvider, HttpEstimateProvider, HttpProviderConfig, PropertyContext,
    QuotaState,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};

mod telemetry;

#[derive(Parser)]
#[command(name = "estimator")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspection repair cost estimator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Log level used when RUST_LOG is unset (overridden by --verbose)
    #[arg(long, global = true, env = "ESTIMATOR_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate every issue in a JSON issues file
    Estimate {
        /// Path to the issues file (JSON array)
        issues: PathBuf,

        /// Engine configuration (TOML); defaults apply when omitted
        #[arg(short, long, env = "ESTIMATOR_CONFIG")]
        config: Option<PathBuf>,

        /// Reference cost catalog (TOML); the built-in catalog when omitted
        #[arg(long, env = "ESTIMATOR_CATALOG")]
        catalog: Option<PathBuf>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Property age in years
        #[arg(long)]
        age: Option<u32>,

        /// Property size in square feet
        #[arg(long)]
        size: Option<f64>,

        /// Property market or city
        #[arg(long)]
        location: Option<String>,

        /// Override the daily generative quota from the config
        #[arg(long)]
        quota: Option<u64>,

        /// Override the maximum number of concurrent estimations
        #[arg(long)]
        concurrency: Option<usize>,

        /// JSON file recording today's generative usage across runs
        #[arg(long, env = "ESTIMATOR_QUOTA_LEDGER")]
        quota_ledger: Option<PathBuf>,
    },

    /// Look up a category in the reference cost table
    Lookup {
        /// Category name (e.g. "Plumbing", "Roofing")
        category: String,

        /// Complexity tier: minor, moderate or major
        #[arg(short, long, default_value = "moderate")]
        tier: String,

        /// Named subtype within the category
        #[arg(short, long)]
        subtype: Option<String>,

        /// Reference cost catalog (TOML); the built-in catalog when omitted
        #[arg(long, env = "ESTIMATOR_CATALOG")]
        catalog: Option<PathBuf>,
    },

    /// Validate an engine configuration file and print the effective values
    CheckConfig {
        /// Path to the configuration file (TOML)
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        telemetry::parse_level(&cli.log_level)
    };
    telemetry::init_logging(cli.json, level);

    match cli.command {
        Commands::Estimate {
            issues,
            config,
            catalog,
            output,
            age,
            size,
            location,
            quota,
            concurrency,
            quota_ledger,
        } => {
            let mut engine_config = load_config(config.as_deref())?;
            if let Some(quota) = quota {
                engine_config = engine_config.with_daily_quota(quota);
            }
            if let Some(concurrency) = concurrency {
                engine_config = engine_config.with_max_concurrency(concurrency);
            }
            let property = property_context(age, size, location);
            cmd_estimate(
                &issues,
                engine_config,
                catalog.as_deref(),
                property,
                output.as_deref(),
                quota_ledger.as_deref(),
            )
            .await
        }
        Commands::Lookup {
            category,
            tier,
            subtype,
            catalog,
        } => cmd_lookup(&category, &tier, subtype.as_deref(), catalog.as_deref()),
        Commands::CheckConfig { path } => cmd_check_config(&path),
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("Failed to load engine config from {:?}", path)),
        None => Ok(EngineConfig::default()),
    }
}

fn load_catalog(path: Option<&Path>) -> Result<CostCatalog> {
    match path {
        Some(path) => CostCatalog::from_path(path)
            .with_context(|| format!("Failed to load cost catalog from {:?}", path)),
        None => Ok(CostCatalog::builtin()),
    }
}

fn property_context(age: Option<u32>, size: Option<f64>, location: Option<String>) -> PropertyContext {
    let mut property = PropertyContext::default();
    if let Some(age) = age {
        property = property.with_age(age);
    }
    if let Some(size) = size {
        property = property.with_size(size);
    }
    if let Some(location) = location {
        property = property.with_location(location);
    }
    property
}

/// The HTTP provider when `ESTIMATOR_PROVIDER_URL` is set, otherwise a
/// provider that always reports itself unavailable.
fn build_provider() -> Result<Arc<dyn GenerativeEstimateProvider>> {
    match HttpProviderConfig::from_env() {
        Some(config) => {
            info!(endpoint = %config.endpoint, model = %config.model, "using HTTP estimate provider");
            let provider =
                HttpEstimateProvider::new(config).context("Failed to build HTTP estimate provider")?;
            Ok(Arc::new(provider))
        }
        None => {
            warn!("ESTIMATOR_PROVIDER_URL not set; generative estimates will use fallback");
            Ok(Arc::new(UnavailableProvider::new()))
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_estimate(
    issues_path: &Path,
    config: EngineConfig,
    catalog: Option<&Path>,
    property: PropertyContext,
    output: Option<&Path>,
    quota_ledger: Option<&Path>,
) -> Result<()> {
    let issues = load_issues(issues_path)
        .with_context(|| format!("Failed to load issues from {:?}", issues_path))?;
    let table: Arc<dyn ReferenceCostTable> = Arc::new(load_catalog(catalog)?);
    let provider = build_provider()?;
    let report = run_estimate(
        issues_path,
        issues,
        config,
        table,
        provider,
        property,
        quota_ledger,
    )
    .await?;

    let report_json = serde_json::to_string_pretty(&report)?;
    if let Some(path) = output {
        std::fs::write(path, &report_json)
            .with_context(|| format!("Failed to write report to {:?}", path))?;
        info!(path = ?path, "report written");
    } else {
        println!("{}", report_json);
    }

    let summary = &report.summary;
    info!(
        run_id = %report.run_id,
        issues = summary.issue_count,
        total_low = summary.total_low,
        total_high = summary.total_high,
        needs_review = summary.needs_review,
        "estimation complete"
    );
    Ok(())
}

async fn run_estimate(
    issues_path: &Path,
    issues: Vec<estimator_core::Issue>,
    config: EngineConfig,
    table: Arc<dyn ReferenceCostTable>,
    provider: Arc<dyn GenerativeEstimateProvider>,
    property: PropertyContext,
    quota_ledger: Option<&Path>,
) -> Result<BatchReport> {
    let quota = match quota_ledger {
        Some(path) => QuotaState::load(path, config.daily_quota)
            .with_context(|| format!("Failed to load quota ledger from {:?}", path))?,
        None => QuotaState::new(config.daily_quota),
    };
    let engine = EstimationEngine::new(config, table, provider, Arc::new(quota))
        .context("Invalid engine configuration")?;
    info!(path = ?issues_path, issues = issues.len(), "estimating");
    let report = engine.estimate_batch(issues, property).await;

    if let Some(path) = quota_ledger {
        engine
            .quota()
            .save(path)
            .with_context(|| format!("Failed to save quota ledger to {:?}", path))?;
    }
    Ok(report)
}

fn cmd_lookup(
    category: &str,
    tier: &str,
    subtype: Option<&str>,
    catalog: Option<&Path>,
) -> Result<()> {
    let catalog = load_catalog(catalog)?;
    let tier: ComplexityTier = tier
        .parse()
        .with_context(|| format!("Invalid complexity tier '{}'", tier))?;
    let mut attrs = LookupAttributes::tier(tier);
    if let Some(subtype) = subtype {
        attrs = attrs.with_subcategory(subtype);
    }

    match catalog.lookup(category, &attrs) {
        Some(range) => {
            println!("{} ({}): {}", category, tier, range);
            println!("Midpoint: ${:.0}", range.midpoint());
        }
        None => println!("No reference cost for '{}'", category),
    }
    Ok(())
}

fn cmd_check_config(path: &Path) -> Result<()> {
    let config = load_config(Some(path))?;
    config
        .validate()
        .with_context(|| format!("Invalid engine config {:?}", path))?;
    println!("Config OK: {:?}", path);
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use estimator_core::Issue;
    use genai_provider::fakes::StaticProvider;
    use std::io::Write;

    #[test]
    fn test_parse_estimate_args() {
        let cli = Cli::try_parse_from([
            "estimator",
            "--json",
            "estimate",
            "issues.json",
            "--age",
            "40",
            "--quota",
            "3",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Estimate {
                issues, age, quota, ..
            } => {
                assert_eq!(issues, PathBuf::from("issues.json"));
                assert_eq!(age, Some(40));
                assert_eq!(quota, Some(3));
            }
            _ => panic!("expected estimate"),
        }
    }

    #[test]
    fn test_property_context_from_flags() {
        let property = property_context(Some(25), None, Some("Austin".into()));
        assert_eq!(property.age_years, Some(25));
        assert_eq!(property.size_sqft, None);
        assert_eq!(property.location.as_deref(), Some("Austin"));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/estimator.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load engine config"));
    }

    #[tokio::test]
    async fn test_run_estimate_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": "a", "section": "Plumbing", "title": "Water heater",
                  "description": "Water heater leaking at the base",
                  "severity": "high",
                  "taxonomy": {{"category": "Plumbing", "confidence": 0.9}}}},
                {{"id": "b", "section": "Electrical", "title": "Outlet",
                  "description": "Ungrounded outlet in kitchen",
                  "severity": "medium",
                  "taxonomy": {{"category": "Electrical", "confidence": 0.9}}}}
            ]"#
        )
        .unwrap();

        let issues = load_issues(file.path()).unwrap();
        let report = run_estimate(
            file.path(),
            issues,
            EngineConfig::default(),
            Arc::new(CostCatalog::builtin()),
            Arc::new(StaticProvider::success(300.0, 900.0, 0.8)),
            PropertyContext::default(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(report.estimates.len(), 2);
        assert_eq!(report.estimates[0].issue_id, "a");
        assert_eq!(report.estimates[1].issue_id, "b");
        for estimate in &report.estimates {
            assert!(estimate.estimated_low > 0.0);
            assert!(estimate.estimated_low <= estimate.estimated_high);
        }
    }

    #[tokio::test]
    async fn test_quota_ledger_carries_usage_between_runs() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = dir.path().join("state").join("quota.json");
        let issues_path = dir.path().join("issues.json");
        let pool_issue = || vec![Issue::new("p", "pool equipment", 0.9, "Pump motor hums")];
        let config = EngineConfig::default().with_daily_quota(1);

        let first = Arc::new(StaticProvider::success(300.0, 900.0, 0.8));
        run_estimate(
            &issues_path,
            pool_issue(),
            config.clone(),
            Arc::new(CostCatalog::builtin()),
            first.clone(),
            PropertyContext::default(),
            Some(&ledger),
        )
        .await
        .unwrap();
        assert_eq!(first.call_count(), 1);
        assert_eq!(QuotaState::load(&ledger, 1).unwrap().used(), 1);

        let second = Arc::new(StaticProvider::success(300.0, 900.0, 0.8));
        let report = run_estimate(
            &issues_path,
            pool_issue(),
            config,
            Arc::new(CostCatalog::builtin()),
            second.clone(),
            PropertyContext::default(),
            Some(&ledger),
        )
        .await
        .unwrap();
        assert_eq!(second.call_count(), 0);
        assert_eq!(report.stats.provider_skipped, 1);
    }

    #[tokio::test]
    async fn test_corrupt_quota_ledger_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = dir.path().join("quota.json");
        std::fs::write(&ledger, "not json").unwrap();

        let err = run_estimate(
            &ledger,
            Vec::new(),
            EngineConfig::default(),
            Arc::new(CostCatalog::builtin()),
            Arc::new(StaticProvider::success(300.0, 900.0, 0.8)),
            PropertyContext::default(),
            Some(&ledger),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Failed to load quota ledger"));
    }
}
