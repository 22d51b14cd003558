//! cinesched - cinema showtime aggregation CLI.

/// Application configuration (TOML).
mod config;
/// One extract-assemble-publish run.
mod pipeline;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use cinesched_core::{CinemaId, ValidationReport};
use cinesched_publish::{ArtifactStore, BaseDir, resolve_path};
use cinesched_sources::{SourceExtractor, build_extractor};
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::AppConfig;
use crate::pipeline::{RunOutcome, RunSettings, log_issues, run_pipeline};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (rev:", env!("GIT_HASH"), ")");

/// CLI argument parser.
#[derive(Parser)]
#[command(name = "cinesched", about, version = APP_VERSION)]
struct Cli {
    /// Override config/data directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Fetch every enabled cinema and publish a new schedule.
    Run(RunArgs),
    /// Re-validate a published schedule.
    Validate(ValidateArgs),
    /// Show the age and contents of the published schedule.
    Status,
    /// List configured cinema sources.
    Sources,
    /// Write a config file listing every source.
    Init(InitArgs),
}

/// Arguments for the `run` subcommand.
#[derive(clap::Args)]
struct RunArgs {
    /// Artifact path (overrides `[pipeline] output`).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Assemble and validate without writing anything.
    #[arg(long)]
    dry_run: bool,
}

/// Arguments for the `validate` subcommand.
#[derive(clap::Args)]
struct ValidateArgs {
    /// Artifact to check (default: the configured artifact path).
    #[arg(long)]
    artifact: Option<PathBuf>,

    /// Exit with an error when the artifact has error-severity issues.
    #[arg(long)]
    strict: bool,
}

/// Arguments for the `init` subcommand.
#[derive(clap::Args)]
struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    force: bool,
}

/// Builds extractors for every enabled cinema, in fixed cinema order.
///
/// # Errors
///
/// Returns an error if a configured URL is invalid or an HTTP client fails to build.
fn build_extractors(config: &AppConfig) -> Result<Vec<SourceExtractor>> {
    let mut extractors = Vec::with_capacity(CinemaId::ALL.len());
    for cinema in CinemaId::ALL {
        if !config.source(cinema).enabled {
            tracing::info!(%cinema, "Source disabled");
            continue;
        }
        let settings = config.source_settings(cinema)?;
        extractors.push(build_extractor(cinema, &settings)?);
    }
    Ok(extractors)
}

/// Runs the `run` subcommand.
///
/// # Errors
///
/// Returns an error if config loading fails, or if the run ends without a
/// new artifact being published.
#[instrument(skip_all)]
async fn run_run(args: &RunArgs, dir: Option<&PathBuf>) -> Result<()> {
    let config_path =
        resolve_path(BaseDir::Config, dir).context("failed to resolve config path")?;
    let config = AppConfig::load(&config_path).context("failed to load config")?;
    let store = ArtifactStore::new(config.artifact_path(args.output.as_ref(), dir)?);
    let extractors = build_extractors(&config)?;
    let settings = RunSettings::from_config(&config);

    let run_at = Utc::now().with_timezone(&config.timezone()?);
    tracing::info!("Run started at {}", run_at.format("%Y-%m-%d %H:%M:%S %:z"));

    match run_pipeline(&extractors, &run_at, &settings, &store, args.dry_run).await {
        RunOutcome::Published(receipt) => {
            tracing::info!(
                "Published {} showings to {} ({} bytes)",
                receipt.showings,
                receipt.path.display(),
                receipt.bytes
            );
            Ok(())
        }
        RunOutcome::DryRun { showings, report } => {
            tracing::info!(
                "Dry run: {} showings, {} errors, {} warnings; nothing written",
                showings,
                report.summary.errors,
                report.summary.warnings
            );
            Ok(())
        }
        RunOutcome::Retained { reason, previous } => {
            match previous {
                Some(at) => tracing::warn!("Still serving the artifact generated at {at}"),
                None => tracing::warn!("No artifact is being served"),
            }
            Err(reason).context("schedule not updated")
        }
    }
}

/// Runs the `validate` subcommand.
///
/// # Errors
///
/// Returns an error if the artifact is missing or unreadable, or when
/// `--strict` is set and the artifact is invalid.
#[instrument(skip_all)]
fn run_validate(args: &ValidateArgs, dir: Option<&PathBuf>) -> Result<()> {
    let config_path =
        resolve_path(BaseDir::Config, dir).context("failed to resolve config path")?;
    let config = AppConfig::load(&config_path).context("failed to load config")?;
    let path = match &args.artifact {
        Some(p) => p.clone(),
        None => config.artifact_path(None, dir)?,
    };
    let store = ArtifactStore::new(path);
    let artifact = store
        .load_current()?
        .with_context(|| format!("no artifact at {}", store.path().display()))?;

    let audit = artifact.audit(&config.validation);
    log_issues(&audit.issues);
    let now = Utc::now().with_timezone(&config.timezone()?).fixed_offset();
    let report = ValidationReport::build(&audit.records, audit.issues, now);

    tracing::info!("Cinema\t\t\t\tShowings\tFilms");
    for (cinema, stats) in &report.stats {
        tracing::info!(
            "{:<24}\t{}\t\t{}",
            cinema.as_str(),
            stats.total_showings,
            stats.distinct_films
        );
    }
    tracing::info!(
        "Total: {} showings, {} errors, {} warnings",
        report.summary.total_showings,
        report.summary.errors,
        report.summary.warnings
    );

    if report.valid {
        tracing::info!("Artifact is valid");
    } else {
        tracing::warn!("Artifact has errors");
        if args.strict {
            bail!("artifact is invalid: {} error(s)", report.summary.errors);
        }
    }
    Ok(())
}

/// Runs the `status` subcommand.
///
/// # Errors
///
/// Returns an error if config loading fails or the artifact cannot be read.
#[instrument(skip_all)]
fn run_status(dir: Option<&PathBuf>) -> Result<()> {
    let config_path =
        resolve_path(BaseDir::Config, dir).context("failed to resolve config path")?;
    let config = AppConfig::load(&config_path).context("failed to load config")?;
    let store = ArtifactStore::new(config.artifact_path(None, dir)?);

    let Some(artifact) = store.load_current()? else {
        tracing::info!(
            "No artifact at {}. Run `cinesched run` first.",
            store.path().display()
        );
        return Ok(());
    };

    let age = artifact.age(Utc::now().fixed_offset());
    tracing::info!(
        "Artifact {} generated at {} ({}h{:02}m ago)",
        store.path().display(),
        artifact.generated_at,
        age.num_hours(),
        age.num_minutes().rem_euclid(60)
    );
    let counts = artifact.counts();
    for cinema in CinemaId::ALL {
        let status = artifact
            .source_status
            .get(cinema.as_str())
            .map_or_else(|| String::from("-"), ToString::to_string);
        let count = counts.get(&cinema).copied().unwrap_or(0);
        tracing::info!("  {:<24} {:<8} {}", cinema.as_str(), status, count);
    }
    tracing::info!("Total: {} showings", artifact.showings.len());

    Ok(())
}

/// Runs the `sources` subcommand.
///
/// # Errors
///
/// Returns an error if config loading fails or a configured URL is invalid.
#[instrument(skip_all)]
fn run_sources(dir: Option<&PathBuf>) -> Result<()> {
    let config_path =
        resolve_path(BaseDir::Config, dir).context("failed to resolve config path")?;
    let config = AppConfig::load(&config_path).context("failed to load config")?;

    for cinema in CinemaId::ALL {
        let source = config.source(cinema);
        let url = config.source_url(cinema)?;
        tracing::info!(
            "  {:<24} {:<8} {}",
            cinema.as_str(),
            if source.enabled { "enabled" } else { "disabled" },
            url
        );
    }

    Ok(())
}

/// Runs the `init` subcommand.
///
/// # Errors
///
/// Returns an error if the config exists (without `--force`) or cannot be written.
#[instrument(skip_all)]
fn run_init(args: &InitArgs, dir: Option<&PathBuf>) -> Result<()> {
    let config_path =
        resolve_path(BaseDir::Config, dir).context("failed to resolve config path")?;
    if config_path.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    AppConfig::with_all_sources().save(&config_path)?;
    tracing::info!("Wrote {}", config_path.display());
    Ok(())
}

/// Installs the global tracing subscriber.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(not(feature = "otel"))]
    {
        fmt().with_env_filter(env_filter).with_target(false).init();
    }

    #[cfg(feature = "otel")]
    {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let dir = cli.dir.as_ref();
    match cli.command {
        Commands::Run(args) => run_run(&args, dir).await,
        Commands::Validate(args) => run_validate(&args, dir),
        Commands::Status => run_status(dir),
        Commands::Sources => run_sources(dir),
        Commands::Init(args) => run_init(&args, dir),
    }
}
