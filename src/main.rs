use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use tts_prep::config::PrepConfig;
use tts_prep::download::DatasetDownloader;
use tts_prep::notification::{CompositeProgressObserver, FileProgressObserver, ProgressBarObserver};
use tts_prep::progress::{DefaultProgressReporter, ProcessStep, ProgressReporter, ProgressTracker};
use tts_prep::storage::{ObjectStorage, S3Storage};
use tts_prep::training::latest_checkpoint_path;
use tts_prep::utils::logger::init_logger;
use tts_prep::TtsPrep;

#[derive(Debug, Parser)]
#[command(name = "tts-prep")]
#[command(version, about = "Dataset preparation and training utilities for TTS models")]
struct Cli {
    /// Append progress updates to this file
    #[arg(long, global = true)]
    progress_log: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download and unpack the LJSpeech corpus
    Download(DownloadArgs),
    /// Build the vocabulary and write train/val/test filelists
    Prepare(PrepareArgs),
    /// Upload a file to S3 (credentials from AWS_* variables)
    Upload(UploadArgs),
    /// Print the newest checkpoint in a directory
    LatestCheckpoint(LatestCheckpointArgs),
    /// Write the default configuration to a file
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Args)]
struct DownloadArgs {
    #[arg(long, default_value = "downloaded_datasets")]
    dir: PathBuf,
    #[arg(long)]
    url: Option<String>,
    /// Expected MD5 of the archive
    #[arg(long)]
    md5: Option<String>,
}

#[derive(Debug, Args)]
struct PrepareArgs {
    /// JSON configuration; defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    n_val: Option<usize>,
    #[arg(long)]
    n_test: Option<usize>,
    #[arg(long, help = "Seed for a reproducible shuffle")]
    seed: Option<u64>,
    #[arg(long, help = "Read only the first N metadata rows")]
    max_rows: Option<usize>,
}

#[derive(Debug, Args)]
struct UploadArgs {
    local: PathBuf,
    remote: String,
}

#[derive(Debug, Args)]
struct LatestCheckpointArgs {
    dir: PathBuf,
    #[arg(long, default_value = "G_")]
    prefix: String,
}

#[derive(Debug, Args)]
struct InitConfigArgs {
    path: PathBuf,
}

fn progress_reporter(progress_log: Option<&PathBuf>) -> Box<dyn ProgressReporter> {
    let mut composite = CompositeProgressObserver::new();
    composite.add_observer(Box::new(ProgressBarObserver::default()));
    if let Some(path) = progress_log {
        composite.add_observer(Box::new(FileProgressObserver::new(path)));
    }

    let mut reporter = DefaultProgressReporter::new();
    reporter.add_observer(Box::new(composite));
    Box::new(reporter)
}

fn load_config(args: &PrepareArgs) -> Result<PrepConfig> {
    let mut config = match &args.config {
        Some(path) => PrepConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => PrepConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(n_val) = args.n_val {
        config.split.n_val = n_val;
    }
    if let Some(n_test) = args.n_test {
        config.split.n_test = n_test;
    }
    if args.seed.is_some() {
        config.split.seed = args.seed;
    }
    if args.max_rows.is_some() {
        config.max_rows = args.max_rows;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Download(args) => {
            let mut downloader = DatasetDownloader::new(&args.dir);
            if let Some(url) = args.url {
                downloader = downloader.with_url(url);
            }
            if let Some(md5) = args.md5 {
                downloader = downloader.with_expected_md5(md5);
            }

            let tracker = ProgressTracker::with_reporter(
                ProcessStep::DOWNLOAD_PLAN,
                progress_reporter(cli.progress_log.as_ref()),
            );
            let dataset_dir = downloader
                .prepare_dataset(Some(&tracker))
                .await
                .context("dataset download failed")?;
            println!("{}", dataset_dir.display());
        }
        Commands::Prepare(args) => {
            let config = load_config(&args)?;
            let mut prep = TtsPrep::new(config).context("invalid configuration")?;
            prep.set_progress_reporter(progress_reporter(cli.progress_log.as_ref()));

            let summary = prep.process().context("dataset preparation failed")?;

            log::info!(
                "{} records: {} train, {} val, {} test; vocabulary of {} tokens in {}",
                summary.records,
                summary.train,
                summary.val,
                summary.test,
                summary.vocab_size,
                summary.vocab_file.display()
            );
        }
        Commands::Upload(args) => {
            let storage = S3Storage::from_env()?;
            storage
                .upload(&args.local, &args.remote)
                .with_context(|| format!("uploading {}", args.local.display()))?;
        }
        Commands::LatestCheckpoint(args) => {
            let path = latest_checkpoint_path(&args.dir, &args.prefix)?;
            println!("{}", path.display());
        }
        Commands::InitConfig(args) => {
            PrepConfig::default().save(&args.path)?;
            log::info!("Wrote default configuration to {}", args.path.display());
        }
    }

    Ok(())
}
