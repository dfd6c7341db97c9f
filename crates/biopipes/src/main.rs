use std::path::PathBuf;

use anyhow::{Context, Result};
use biopipes_core::config::{ConversionConfig, DuplicatePolicy};
use biopipes_core::layout::JobLayout;
use biopipes_core::pipeline::{convert_job, persist_vocabulary, vocabulary_from_config};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert ODV exports to Darwin Core Event/Occurrence/EMOF tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract an order archive (and the meta.zip next to it) and convert it
    ConvertArchive(ConvertArchiveArgs),
    /// Convert an already extracted directory of ODV files
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
struct ConvertArchiveArgs {
    /// Path to `<order>.zip`; tables are written to `dwc/` beside it
    archive: PathBuf,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Directory holding the ODV files
    #[arg(long)]
    input: PathBuf,
    /// CDI metadata CSV
    #[arg(long)]
    metadata: PathBuf,
    /// Directory the tables are written to
    #[arg(long)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Never contact the vocabulary server; unresolved labels become "Unknown"
    #[arg(long, global = true)]
    offline: bool,
    /// JSON snapshot of resolved vocabulary labels, read before and written after the run
    #[arg(long, global = true)]
    vocab_cache: Option<PathBuf>,
    /// What to do when generated identifiers collide: warn, fail or keep-first
    #[arg(long, global = true)]
    duplicate_policy: Option<DuplicatePolicy>,
    /// Default log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cli.common.log_level)),
        )
        .json()
        .init();

    let config = load_config(&cli.common)?;

    let layout = match cli.command {
        Command::ConvertArchive(args) => {
            let layout = JobLayout::from_archive(&args.archive);
            layout
                .extract_archives()
                .with_context(|| format!("failed to extract {}", args.archive.display()))?;
            layout
        }
        Command::Convert(args) => {
            let layout = JobLayout::from_extracted(&args.input, &args.metadata, &args.output);
            layout.prepare().context("failed to create output directory")?;
            layout
        }
    };

    run(&layout, &config)
}

fn load_config(args: &CommonArgs) -> Result<ConversionConfig> {
    let mut config = match &args.config {
        Some(path) => ConversionConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ConversionConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("invalid BIOPIPES_* environment override")?;

    if args.offline {
        config.vocabulary.offline = true;
    }
    if let Some(path) = &args.vocab_cache {
        config.vocabulary.cache_path = Some(path.clone());
    }
    if let Some(policy) = args.duplicate_policy {
        config.duplicate_policy = policy;
    }
    Ok(config)
}

fn run(layout: &JobLayout, config: &ConversionConfig) -> Result<()> {
    let vocabulary =
        vocabulary_from_config(config).context("failed to set up vocabulary resolver")?;
    let summary = convert_job(layout, config, &vocabulary)
        .with_context(|| format!("conversion of {} failed", layout.input_dir.display()))?;
    persist_vocabulary(config, &vocabulary).context("failed to save vocabulary snapshot")?;

    info!(
        files = summary.files.len(),
        events = summary.rows.events,
        occurrences = summary.rows.occurrences,
        emof = summary.rows.emof,
        summary = %layout.summary_path().display(),
        "conversion complete"
    );
    Ok(())
}
