/// Version injected at compile time via CLOUDSWEEP_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("CLOUDSWEEP_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use cloudsweep::config::Config;
use cloudsweep::{
    ClientConfig, DiscoveryProvider, HttpConnector, InventoryProvider, MemoryConnector,
    Orchestrator, RegionOutcome, RunReport, StorageConnector, TaskError, WriteOptions,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Discover every resource of a cloud account and sweep stale records from storage
#[derive(Parser, Debug)]
#[command(name = "cloudsweep", version = VERSION, about, long_about = None)]
struct Args {
    /// Account snapshot to replay (YAML, or JSON by extension)
    #[arg(short, long)]
    inventory: PathBuf,

    /// Only crawl this region
    #[arg(short, long)]
    region: Option<String>,

    /// Resource type to skip (repeatable)
    #[arg(short, long = "exclude")]
    exclude: Vec<String>,

    /// Number of regions crawled at once
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// JSON file holding the memory store between runs
    #[arg(long)]
    store: Option<PathBuf>,

    /// Collector API to forward records to
    #[arg(long)]
    endpoint: Option<String>,

    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep stored records of scopes in which something failed
    #[arg(long)]
    skip_reconcile_on_failure: bool,

    /// Store the effective exclude list, concurrency, endpoint and failure
    /// policy as defaults in the config file
    #[arg(long)]
    save_config: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel, log_file: Option<&Path>) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    // RUST_LOG wins over the flag when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.to_string().to_lowercase()));

    let Some(log_path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
        return Ok(None);
    };

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("cloudsweep {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_deref())?;

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    if args.save_config {
        save_config(&args, &config)?;
    }

    let report = run(&args, &config).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    let failed = report.failed_regions();
    if !failed.is_empty() {
        for err in &failed {
            eprintln!("Error: {}", err);
        }
        anyhow::bail!("{} of {} regions failed", failed.len(), report.regions.len());
    }

    Ok(())
}

fn save_config(args: &Args, config: &Config) -> Result<()> {
    let path = args
        .config
        .clone()
        .or_else(Config::config_path)
        .context("No config directory available")?;

    config
        .with_overrides(
            &args.exclude,
            args.concurrency,
            args.endpoint.as_deref(),
            args.skip_reconcile_on_failure,
        )
        .save_to(&path)?;

    tracing::info!("Saved defaults to {}", path.display());
    Ok(())
}

async fn run(args: &Args, config: &Config) -> Result<RunReport> {
    let provider = InventoryProvider::from_path(&args.inventory)?;
    tracing::info!(
        "Loaded inventory for account {} ({} regions)",
        provider.inventory().account_id,
        provider.inventory().regions.len()
    );

    let memory = Arc::new(match &args.store {
        Some(path) => MemoryConnector::load(path)
            .await
            .with_context(|| format!("Failed to load store {}", path.display()))?,
        None => MemoryConnector::new(),
    });

    let mut connectors: Vec<Arc<dyn StorageConnector>> = vec![memory.clone()];
    if let Some(endpoint) = config.effective_endpoint(args.endpoint.as_deref()) {
        let http = HttpConnector::new(&endpoint)
            .with_context(|| format!("Invalid endpoint {}", endpoint))?;
        connectors.push(Arc::new(http));
    }

    let options: WriteOptions = config.write_options(&args.exclude, args.skip_reconcile_on_failure);
    let client_config: ClientConfig = config.client_config.clone();
    let concurrency = config.effective_concurrency(args.concurrency);
    let factory = provider.session_factory();
    let orchestrator = Orchestrator::new(provider, connectors);

    let report = match &args.region {
        Some(region) => {
            let account_id = orchestrator.provider().account_id().await?;
            let result = orchestrator
                .write_region(&options, region, &client_config)
                .await
                .map_err(|source| TaskError::Failed {
                    region: region.clone(),
                    source,
                });
            RunReport {
                run_id: Uuid::new_v4().to_string(),
                account_id,
                regions: vec![RegionOutcome {
                    region: region.clone(),
                    result,
                }],
            }
        }
        None if concurrency > 1 => {
            orchestrator
                .write_all_concurrently(&options, &client_config, concurrency, factory)
                .await?
        }
        None => orchestrator.write_all(&options, &client_config).await?,
    };

    if let Some(path) = &args.store {
        memory
            .save(path)
            .await
            .with_context(|| format!("Failed to save store {}", path.display()))?;
    }

    Ok(report)
}
