use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pitchbin::analyzer::decode::SymphoniaDecoder;
use pitchbin::analyzer::{ExtractSettings, Extractor};
use pitchbin::bands::BandTable;
use pitchbin::config::AppConfig;
use pitchbin::db::models::{DatasetStats, FeatureMode};
use pitchbin::scanner::label::KeyFileResolver;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pitchbin", version, about = "Musical-key training feature extractor")]
struct Cli {
    /// Path to a config file (defaults to the XDG config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ExtractArgs {
    /// Directory of audio clips (defaults to config audio_dir)
    #[arg(long)]
    audio_dir: Option<PathBuf>,

    /// Directory of <clip>.key label files (defaults to config key_dir)
    #[arg(long)]
    key_dir: Option<PathBuf>,

    /// Dataset file (.csv, or .db/.sqlite for SQLite)
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Harmonic separation margin (overrides config)
    #[arg(long)]
    margin: Option<f64>,

    /// Process at most this many outstanding files
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// List outstanding files without processing them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Pitch,
    Linear,
}

impl From<ModeArg> for FeatureMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Pitch => FeatureMode::PitchClass,
            ModeArg::Linear => FeatureMode::Linear,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract 12-dimensional pitch-class power features
    Pitch(ExtractArgs),

    /// Extract 1 Hz linear-bin magnitude features
    Linear(ExtractArgs),

    /// Print the equal-tempered band table
    Bands {
        /// Center frequency of C0 in Hz
        #[arg(long, default_value_t = pitchbin::bands::C0_HZ)]
        anchor: f64,
    },

    /// Show dataset size and how many clips remain
    Status {
        /// Which dataset to inspect
        #[arg(value_enum, default_value = "pitch")]
        mode: ModeArg,

        /// Dataset file (defaults to config / XDG path)
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Audio directory to compare against
        #[arg(long)]
        audio_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load(cli.config.as_deref());

    match cli.command {
        Commands::Pitch(args) => extract(&config, FeatureMode::PitchClass, args)?,
        Commands::Linear(args) => extract(&config, FeatureMode::Linear, args)?,

        Commands::Bands { anchor } => {
            let table = BandTable::new(anchor);
            println!(
                "{:<5} {:>6} {:>10} {:>10} {:>10}",
                "Pitch", "Octave", "Min Hz", "Center Hz", "Max Hz"
            );
            println!("{}", "-".repeat(45));
            for b in table.bands() {
                println!(
                    "{:<5} {:>6} {:>10.2} {:>10.2} {:>10.2}",
                    b.pitch_class, b.octave, b.min_freq, b.center_freq, b.max_freq
                );
            }
        }

        Commands::Status { mode, dataset, audio_dir } => {
            let mode = FeatureMode::from(mode);
            let dataset = resolve_dataset(&config, mode, dataset);
            config.linear.validate().context("Invalid [linear] settings")?;
            let sink = pitchbin::db::open_existing(&dataset, mode, &config.linear)
                .with_context(|| format!("Failed to open dataset {}", dataset.display()))?;
            let stats = match &sink {
                Some(sink) => sink.stats().context("Failed to read dataset")?,
                None => DatasetStats::default(),
            };

            println!("Dataset: {}", dataset.display());
            if sink.is_none() {
                println!("         (not created yet)");
            }
            println!("Rows:    {}", stats.rows);

            if let Some(dir) = audio_dir.or_else(|| config.audio_dir.clone()) {
                let processed = match &sink {
                    Some(sink) => sink.processed_files().context("Failed to read dataset")?,
                    None => HashSet::new(),
                };
                let plan = pitchbin::scanner::plan(&dir, &processed).context("Scan failed")?;
                println!(
                    "Clips:   {} in {} ({} outstanding)",
                    plan.all.len(),
                    dir.display(),
                    plan.outstanding.len()
                );
            }

            if !stats.labels.is_empty() {
                println!();
                println!("Keys:");
                for (label, count) in &stats.labels {
                    println!("  {:<20} {}", label, count);
                }
            }
        }
    }

    Ok(())
}

fn resolve_dataset(config: &AppConfig, mode: FeatureMode, cli: Option<PathBuf>) -> PathBuf {
    // CLI > config > XDG default
    let (from_config, default_name) = match mode {
        FeatureMode::PitchClass => (&config.dataset_path, pitchbin::PITCH_DATASET),
        FeatureMode::Linear => (&config.linear_dataset_path, pitchbin::LINEAR_DATASET),
    };
    cli.or_else(|| from_config.clone())
        .unwrap_or_else(|| pitchbin::config::default_dataset_path(default_name))
}

fn extract(config: &AppConfig, mode: FeatureMode, args: ExtractArgs) -> Result<()> {
    let audio_dir = args
        .audio_dir
        .or_else(|| config.audio_dir.clone())
        .context("No audio directory. Pass --audio-dir or set audio_dir in config.")?;
    let key_dir = args
        .key_dir
        .or_else(|| config.key_dir.clone())
        .context("No key directory. Pass --key-dir or set key_dir in config.")?;
    let dataset = resolve_dataset(config, mode, args.dataset);
    log::info!("Dataset: {}", dataset.display());

    let mut settings = match mode {
        FeatureMode::PitchClass => ExtractSettings::pitch_class(),
        FeatureMode::Linear => ExtractSettings::linear(),
    };
    settings.harmonic.margin = args.margin.unwrap_or(match mode {
        FeatureMode::PitchClass => config.extract.pitch_margin,
        FeatureMode::Linear => config.extract.linear_margin,
    });
    settings.harmonic.validate().context("Invalid harmonic settings")?;
    config.linear.validate().context("Invalid [linear] settings")?;
    settings.psd = config.psd.clone();
    settings.linear = config.linear.clone();

    let mut sink = pitchbin::db::open_sink(&dataset, mode, &settings.linear)
        .with_context(|| format!("Failed to open dataset {}", dataset.display()))?;
    let processed = sink.processed_files().context("Failed to read processed files")?;
    let plan = pitchbin::scanner::plan(&audio_dir, &processed).context("Scan failed")?;

    let already = plan.already_processed();
    let mut outstanding = plan.outstanding;
    if let Some(limit) = args.limit {
        outstanding.truncate(limit);
    }

    if args.dry_run {
        println!(
            "DRY RUN — {} of {} clips would be processed",
            outstanding.len(),
            plan.all.len()
        );
        for f in &outstanding {
            println!("  {}", f);
        }
        return Ok(());
    }

    let extractor = Extractor::new(settings);
    let decoder = SymphoniaDecoder {
        target_rate: config.extract.sample_rate,
    };
    let labels = KeyFileResolver::new(key_dir);

    let summary = pitchbin::analyzer::run_corpus(
        &audio_dir,
        &outstanding,
        &extractor,
        &decoder,
        &labels,
        sink.as_mut(),
    )
    .context("Extraction aborted")?;

    println!(
        "Extraction complete: {} written, {} failed, {} already in dataset",
        summary.written,
        summary.failed,
        already
    );
    Ok(())
}
