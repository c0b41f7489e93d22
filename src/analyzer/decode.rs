use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Rate every waveform is analysed at.
pub const ANALYSIS_SAMPLE_RATE: u32 = 22050;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("No decodable audio track")]
    NoTrack,
    #[error("Unknown sample rate")]
    UnknownSampleRate,
    #[error("symphonia decode error: {0}")]
    Symphonia(#[from] SymphoniaError),
    #[error("resample error: {0}")]
    Resample(String),
    #[error("File contains no audio samples")]
    Empty,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mono PCM samples at a uniform rate.
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Turns an audio file into a mono waveform.
pub trait AudioDecoder {
    fn decode(&self, path: &Path) -> Result<Waveform, DecodeError>;
}

/// Decoder backed by symphonia; downmixes to mono and resamples to `target_rate`.
#[derive(Debug, Clone)]
pub struct SymphoniaDecoder {
    pub target_rate: u32,
}

impl Default for SymphoniaDecoder {
    fn default() -> Self {
        Self {
            target_rate: ANALYSIS_SAMPLE_RATE,
        }
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> Result<Waveform, DecodeError> {
        let (samples, source_rate) = decode_mono(path)?;
        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }
        let samples = resample(samples, source_rate, self.target_rate)?;
        Ok(Waveform {
            samples,
            sample_rate: self.target_rate,
        })
    }
}

/// Decode every packet of the first audio track, averaging channels.
fn decode_mono(path: &Path) -> Result<(Vec<f32>, u32), DecodeError> {
    let src = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| match e {
            SymphoniaError::Unsupported(what) => DecodeError::UnsupportedFormat(what.to_string()),
            other => DecodeError::Symphonia(other),
        })?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::UnknownSampleRate)?;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut mono: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut buf_frames = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping corrupt packet in {}: {}", path.display(), msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let frames = decoded.capacity();
        if sample_buf.is_none() || frames > buf_frames {
            sample_buf = Some(SampleBuffer::<f32>::new(frames as u64, spec));
            buf_frames = frames;
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            mono.extend(
                buf.samples()
                    .chunks_exact(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }
    }

    Ok((mono, sample_rate))
}

/// Resample a mono signal with a windowed-sinc interpolator.
///
/// The interpolator's group delay is trimmed from the front and the tail is
/// flushed, so the output stays time-aligned with the input and holds
/// `len * to / from` samples.
fn resample(samples: Vec<f32>, from: u32, to: u32) -> Result<Vec<f32>, DecodeError> {
    if from == to {
        return Ok(samples);
    }
    log::debug!("Resampling {} samples from {} Hz to {} Hz", samples.len(), from, to);

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler =
        SincFixedIn::<f32>::new(to as f64 / from as f64, 1.0, params, samples.len(), 1)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let ratio = to as f64 / from as f64;
    let expected = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();

    let waves_in = vec![samples];
    let mut out = resampler
        .process(&waves_in, None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?
        .pop()
        .unwrap_or_default();
    while out.len() < expected + delay {
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?
            .pop()
            .unwrap_or_default();
        if tail.is_empty() {
            break;
        }
        out.extend(tail);
    }

    let mut aligned = out.split_off(delay.min(out.len()));
    aligned.truncate(expected);
    Ok(aligned)
}
