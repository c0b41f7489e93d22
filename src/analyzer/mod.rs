pub mod decode;
pub mod hpss;
pub mod linear;
pub mod pitch;
pub mod psd;

use crate::bands::BandTable;
use crate::db::models::{FeatureMode, FeatureRow, FeatureVector};
use crate::db::{DatasetSink, SinkError};
use crate::scanner::label::{LabelError, LabelResolver};
use decode::{AudioDecoder, DecodeError, Waveform};
use hpss::{HarmonicConfig, HpssError};
use indicatif::{ProgressBar, ProgressStyle};
use linear::LinearRange;
use psd::PsdFloor;
use std::path::Path;
use thiserror::Error;

/// Failure of a single file; the run continues.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Label error: {0}")]
    Label(#[from] LabelError),
    #[error("Harmonic separation error: {0}")]
    Hpss(#[from] HpssError),
}

/// Failure that stops the whole run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Dataset write failed for {file_name}: {source}")]
    Sink {
        file_name: String,
        #[source]
        source: SinkError,
    },
}

/// Everything that shapes one feature representation.
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub mode: FeatureMode,
    pub harmonic: HarmonicConfig,
    pub psd: PsdFloor,
    pub linear: LinearRange,
}

impl ExtractSettings {
    /// Pitch-class features with the default 3.0 separation margin.
    pub fn pitch_class() -> Self {
        Self {
            mode: FeatureMode::PitchClass,
            harmonic: HarmonicConfig::with_margin(3.0),
            psd: PsdFloor::default(),
            linear: LinearRange::default(),
        }
    }

    /// Linear-bin features with the default 2.0 separation margin.
    pub fn linear() -> Self {
        Self {
            mode: FeatureMode::Linear,
            harmonic: HarmonicConfig::with_margin(2.0),
            psd: PsdFloor::default(),
            linear: LinearRange::default(),
        }
    }
}

/// Waveform -> feature vector, sharing one band table across files.
pub struct Extractor {
    table: BandTable,
    settings: ExtractSettings,
}

impl Extractor {
    pub fn new(settings: ExtractSettings) -> Self {
        Self {
            table: BandTable::equal_tempered(),
            settings,
        }
    }

    pub fn settings(&self) -> &ExtractSettings {
        &self.settings
    }

    /// Isolate the harmonic waveform, then reduce it to the configured features.
    pub fn extract(&self, waveform: &Waveform) -> Result<FeatureVector, ExtractError> {
        let samples: Vec<f64> = waveform.samples.iter().map(|&s| s as f64).collect();
        let harmonic = hpss::harmonic(&samples, &self.settings.harmonic)?;

        let features = match self.settings.mode {
            FeatureMode::PitchClass => {
                let points = psd::reduce_psd(&harmonic, waveform.sample_rate, &self.settings.psd);
                log::debug!("{} spectral points above floor", points.len());
                let powers = pitch::aggregate_pitch_classes(&self.table, &points);
                if powers.len() < 12 {
                    log::debug!("{} of 12 pitch classes carry power", powers.len());
                }
                FeatureVector::PitchClass(powers.to_vector())
            }
            FeatureMode::Linear => {
                let spec = psd::spectrum(&harmonic);
                FeatureVector::Linear(linear::aggregate_linear_bins(
                    &spec,
                    waveform.sample_rate,
                    &self.settings.linear,
                ))
            }
        };
        Ok(features)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total: u64,
    pub written: u64,
    pub failed: u64,
}

/// Label, decode, extract and append one file.
fn process_file(
    audio_dir: &Path,
    file_name: &str,
    extractor: &Extractor,
    decoder: &dyn AudioDecoder,
    labels: &dyn LabelResolver,
) -> Result<FeatureRow, ExtractError> {
    // Cheap lookup first: an unlabeled clip is useless for training
    let key_label = labels.resolve(file_name)?;
    let waveform = decoder.decode(&audio_dir.join(file_name))?;
    log::debug!(
        "Decoded {}: {:.1}s at {} Hz",
        file_name,
        waveform.duration_secs(),
        waveform.sample_rate
    );
    let features = extractor.extract(&waveform)?;
    Ok(FeatureRow {
        features,
        key_label,
        file_name: file_name.to_string(),
    })
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Process `outstanding` files from `audio_dir` sequentially, appending one
/// row per success.
///
/// Per-file failures (decode, label, extraction) are logged and counted.
/// A sink failure aborts the run; rows appended before it stay valid and
/// the next run resumes after them.
pub fn run_corpus(
    audio_dir: &Path,
    outstanding: &[String],
    extractor: &Extractor,
    decoder: &dyn AudioDecoder,
    labels: &dyn LabelResolver,
    sink: &mut dyn DatasetSink,
) -> Result<RunSummary, RunError> {
    let mut summary = RunSummary {
        total: outstanding.len() as u64,
        ..RunSummary::default()
    };

    if outstanding.is_empty() {
        log::info!("No outstanding files");
        return Ok(summary);
    }

    log::info!(
        "Extracting {} features from {} files",
        extractor.settings().mode.as_str(),
        outstanding.len()
    );

    let pb = progress_bar(summary.total);

    for file_name in outstanding {
        pb.set_message(file_name.clone());
        match process_file(audio_dir, file_name, extractor, decoder, labels) {
            Ok(row) => {
                if let Err(source) = sink.append(&row) {
                    log::error!("Failed to append row for {}: {}", file_name, source);
                    pb.abandon_with_message(format!("aborted at {}", file_name));
                    return Err(RunError::Sink {
                        file_name: file_name.clone(),
                        source,
                    });
                }
                summary.written += 1;
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", file_name, e);
                summary.failed += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message(format!(
        "Done: {} written, {} failed",
        summary.written, summary.failed
    ));

    Ok(summary)
}
