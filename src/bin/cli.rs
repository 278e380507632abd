//! Link preview CLI
//!
//! Local and cron entry point for single fetches and batch refresh sweeps.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use link_preview::{
    error::Result,
    models::{Config, PreviewStatus},
    pipeline,
    services::{
        CacheWriter, JobClaimer, PreviewFetcher, PreviewService, SystemResolver, UrlValidator,
    },
    storage::PostgresLinkRepository,
    utils::http::ReqwestTransport,
};

/// Link preview fetcher and cache refresher
#[derive(Parser, Debug)]
#[command(
    name = "link-preview",
    version,
    about = "Fetch, validate and cache link previews"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the preview for one link, fetching it if the cache is stale
    FetchPreview {
        /// Id of the link to preview
        link_id: i64,
    },

    /// Lease a batch of stale links and refresh their previews
    ProcessLinkPreviews {
        /// Maximum number of links to claim (default from config)
        #[arg(long)]
        limit: Option<i64>,

        /// Lease duration in seconds (default from config)
        #[arg(long)]
        lock_seconds: Option<i64>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Wire the production collaborators together.
async fn build(config: &Config) -> Result<(JobClaimer, PreviewService)> {
    let repository = Arc::new(PostgresLinkRepository::connect(&config.database).await?);
    let transport = Arc::new(ReqwestTransport::new(&config.fetch)?);
    let validator = UrlValidator::new(Arc::new(SystemResolver));

    let fetcher = PreviewFetcher::new(transport, validator);
    let cache = CacheWriter::new(repository.clone(), &config.cache)?;
    let service = PreviewService::new(repository.clone(), fetcher, cache);
    let claimer = JobClaimer::new(repository);
    Ok((claimer, service))
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load_or_default(&cli.config).with_env_overrides();
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::FetchPreview { link_id } => {
            config.validate()?;
            let (_, service) = build(&config).await?;
            let outcome = pipeline::fetch_preview(&service, link_id).await?;

            println!("{}", serde_json::to_string_pretty(&outcome)?);
            for warning in &outcome.warnings {
                eprintln!("warning: {}", warning);
            }

            Ok(if outcome.status == PreviewStatus::Ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::ProcessLinkPreviews {
            limit,
            lock_seconds,
        } => {
            let mut config = config;
            if let Some(limit) = limit {
                config.batch.limit = limit;
            }
            if let Some(lock_seconds) = lock_seconds {
                config.batch.lock_seconds = lock_seconds;
            }
            config.validate()?;

            let (claimer, service) = build(&config).await?;
            let tally = pipeline::process_link_previews(
                &claimer,
                &service,
                config.batch.limit,
                config.batch.lock_seconds,
            )
            .await;
            println!("{}", tally);
            Ok(ExitCode::SUCCESS)
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            Config::load(&cli.config)?.with_env_overrides().validate()?;
            log::info!("✓ Config OK");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
