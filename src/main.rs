//! Ripple-Crawl main entry point
//!
//! This is the command-line interface for the Ripple-Crawl crawler. `run`
//! drives a whole crawl in-process; `step` executes a single crawl step for an
//! external scheduler and prints its outcome as JSON.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use ripple_crawl::archive::LocalArchiver;
use ripple_crawl::config::{load_config_with_hash, Config};
use ripple_crawl::crawler::{
    build_http_client, CrawlStep, HtmlContentExtractor, HttpRenderer, LocalScheduler, StepParams,
};
use ripple_crawl::ledger::{RunId, VisitedLedger};
use ripple_crawl::output::print_statistics;
use ripple_crawl::storage::open_store;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Ripple-Crawl: a fan-out web crawler
///
/// Crawls a site from a seed URL, depth-bounded and deduplicated. Steps of a
/// run share their visited set and page budget through a key-value store, so
/// they can run concurrently or in separate processes.
#[derive(Parser, Debug)]
#[command(name = "ripple-crawl")]
#[command(version)]
#[command(about = "A fan-out web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Run identifier shared by all steps of a crawl (defaults to $RIPPLE_RUN_ID)
    #[arg(long, global = true)]
    run_id: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site from a seed URL
    Run(RunArgs),

    /// Execute one crawl step from JSON parameters
    Step(StepArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Seed URL
    #[arg(value_name = "URL")]
    url: String,

    /// Override the configured maximum depth
    #[arg(long)]
    max_depth: Option<u32>,

    /// Override the configured page budget
    #[arg(long)]
    max_pages: Option<u64>,

    /// Follow links to other domains
    #[arg(long)]
    include_external: bool,

    /// Archive linked files
    #[arg(long)]
    include_attachments: bool,

    /// JSON schema for structured extraction
    #[arg(long, value_name = "JSON")]
    schema: Option<String>,

    /// Override the configured concurrency
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print the full run report as JSON instead of statistics
    #[arg(long)]
    json: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct StepArgs {
    /// Step parameters as JSON; read from stdin when omitted
    #[arg(long, value_name = "JSON")]
    params: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            Config::default()
        }
    };

    let run_id = RunId::resolve(cli.run_id.as_deref());

    match cli.command {
        Command::Run(args) => handle_run(config, run_id, args).await,
        Command::Step(args) => handle_step(config, run_id, args).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so that JSON output on stdout stays machine-readable.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_crawl=info,warn"),
            1 => EnvFilter::new("ripple_crawl=debug,info"),
            2 => EnvFilter::new("ripple_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Wires the configured store, renderer, extractor and archiver into a step
fn build_step(config: &Config, run_id: RunId) -> anyhow::Result<CrawlStep> {
    let store = open_store(config.store.database_path.as_deref())?;
    let ledger = VisitedLedger::new(store, run_id);

    let client = build_http_client(&config.user_agent)?;
    let archiver = LocalArchiver::new(client.clone(), config.archive.directory.clone())
        .with_max_bytes(config.archive.max_file_bytes);

    Ok(CrawlStep::new(
        ledger,
        Arc::new(HttpRenderer::new(client)),
        Arc::new(HtmlContentExtractor::new()),
    )
    .with_archiver(Arc::new(archiver))
    .with_timeouts(config.timeouts.step_timeouts()))
}

async fn handle_run(config: Config, run_id: RunId, args: RunArgs) -> anyhow::Result<()> {
    let mut params = config.crawler.root_params(&args.url);
    if let Some(max_depth) = args.max_depth {
        params.max_depth = max_depth;
    }
    if let Some(max_pages) = args.max_pages {
        params.max_pages = max_pages;
    }
    params.include_external |= args.include_external;
    params.include_attachments |= args.include_attachments;
    if let Some(schema) = &args.schema {
        params.schema = Some(serde_json::from_str(schema).context("--schema is not valid JSON")?);
    }
    params.validate()?;

    let concurrency = args
        .concurrency
        .unwrap_or(config.crawler.max_concurrency as usize);
    if concurrency == 0 {
        bail!("--concurrency must be at least 1");
    }

    if args.dry_run {
        print_dry_run(&config, &run_id, &params, concurrency);
        return Ok(());
    }

    let scheduler = LocalScheduler::new(build_step(&config, run_id)?, concurrency);
    let report = scheduler.run(params).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_statistics(&report);
    }

    Ok(())
}

async fn handle_step(config: Config, run_id: RunId, args: StepArgs) -> anyhow::Result<()> {
    let raw = match args.params {
        Some(json) => json,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read step parameters from stdin")?;
            buffer
        }
    };

    let params: StepParams =
        serde_json::from_str(&raw).context("step parameters are not valid JSON")?;

    let step = build_step(&config, run_id)?;
    let outcome = step.run(&params).await?;

    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}

/// Shows the effective settings of a run without crawling
fn print_dry_run(config: &Config, run_id: &RunId, params: &StepParams, concurrency: usize) {
    println!("=== Ripple-Crawl Dry Run ===\n");

    println!("Run:");
    println!("  Run id: {}", run_id);
    println!("  Seed: {}", params.url);
    println!("  Max depth: {}", params.max_depth);
    println!("  Max pages: {}", params.max_pages);
    println!("  Include external: {}", params.include_external);
    println!("  Include attachments: {}", params.include_attachments);
    println!("  Structured extraction: {}", params.schema.is_some());
    println!("  Concurrency: {}", concurrency);

    if !params.allowed_domains.is_empty() {
        println!("\nAllowed Domains ({}):", params.allowed_domains.len());
        for domain in &params.allowed_domains {
            println!("  - {}", domain);
        }
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.user_agent_string());

    println!("\nStorage:");
    match &config.store.database_path {
        Some(path) => println!("  Ledger: {}", path.display()),
        None => println!("  Ledger: in-memory"),
    }
    println!("  Archive: {}", config.archive.directory.display());

    println!("\n✓ Configuration is valid");
}
