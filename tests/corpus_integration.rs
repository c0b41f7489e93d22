use pitchbin::analyzer::decode::{AudioDecoder, SymphoniaDecoder};
use pitchbin::analyzer::{ExtractSettings, Extractor, RunSummary, run_corpus};
use pitchbin::bands::PitchClass;
use pitchbin::db::models::FeatureMode;
use pitchbin::db::{DatasetSink, SqliteSink, open_sink};
use pitchbin::scanner::label::KeyFileResolver;
use pitchbin::scanner::plan;
use std::path::{Path, PathBuf};

const SR: u32 = 22050;

fn write_tone(path: &Path, freqs: &[f64], secs: f64, channels: u16) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: SR,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let n = (SR as f64 * secs) as usize;
    for i in 0..n {
        let t = i as f64 / SR as f64;
        let v: f64 = freqs
            .iter()
            .map(|f| (2.0 * std::f64::consts::PI * f * t).sin())
            .sum::<f64>()
            * 0.4
            / freqs.len() as f64;
        let s = (v * i16::MAX as f64) as i16;
        for _ in 0..channels {
            writer.write_sample(s).unwrap();
        }
    }
    writer.finalize().unwrap();
}

struct Corpus {
    _root: tempfile::TempDir,
    audio: PathBuf,
    keys: PathBuf,
    dataset: PathBuf,
}

/// Four clips: two labeled tones, one unlabeled tone, one undecodable file.
fn corpus(dataset_name: &str) -> Corpus {
    let root = tempfile::tempdir().unwrap();
    let audio = root.path().join("audio");
    let keys = root.path().join("key");
    std::fs::create_dir_all(&audio).unwrap();
    std::fs::create_dir_all(&keys).unwrap();

    write_tone(&audio.join("a_tone.wav"), &[440.0], 1.0, 1);
    write_tone(&audio.join("c_chord.wav"), &[261.63, 329.63, 392.0], 1.0, 2);
    write_tone(&audio.join("unlabeled.wav"), &[293.66], 1.0, 1);
    std::fs::write(audio.join("broken.wav"), b"this is not a wav file").unwrap();
    std::fs::write(audio.join("readme.txt"), b"ignored").unwrap();

    std::fs::write(keys.join("a_tone.key"), "A major\n").unwrap();
    std::fs::write(keys.join("c_chord.key"), "C major\n").unwrap();
    std::fs::write(keys.join("broken.key"), "D minor\n").unwrap();

    let dataset = root.path().join(dataset_name);
    Corpus {
        _root: root,
        audio,
        keys,
        dataset,
    }
}

fn run(c: &Corpus, mode: FeatureMode, limit: Option<usize>) -> RunSummary {
    let settings = match mode {
        FeatureMode::PitchClass => ExtractSettings::pitch_class(),
        FeatureMode::Linear => ExtractSettings::linear(),
    };
    let extractor = Extractor::new(settings);
    let mut sink = open_sink(&c.dataset, mode, &extractor.settings().linear).unwrap();
    let processed = sink.processed_files().unwrap();
    let mut outstanding = plan(&c.audio, &processed).unwrap().outstanding;
    if let Some(n) = limit {
        outstanding.truncate(n);
    }
    run_corpus(
        &c.audio,
        &outstanding,
        &extractor,
        &SymphoniaDecoder::default(),
        &KeyFileResolver::new(&c.keys),
        sink.as_mut(),
    )
    .unwrap()
}

fn sorted_rows(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let mut rows: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    rows.sort_by(|a, b| a.last().cmp(&b.last()));
    rows
}

#[test]
fn test_failures_are_isolated() {
    let c = corpus("PSD_data.csv");
    let summary = run(&c, FeatureMode::PitchClass, None);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.written, 2);
    assert_eq!(summary.failed, 2);

    let rows = sorted_rows(&c.dataset);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][13], "a_tone.wav");
    assert_eq!(rows[0][12], "A major");
    assert_eq!(rows[1][13], "c_chord.wav");
    assert_eq!(rows[1][12], "C major");
}

#[test]
fn test_second_run_adds_no_rows() {
    let c = corpus("PSD_data.csv");
    run(&c, FeatureMode::PitchClass, None);
    let before = std::fs::read_to_string(&c.dataset).unwrap();

    let second = run(&c, FeatureMode::PitchClass, None);
    assert_eq!(second.written, 0);
    // Only the two failing clips are retried
    assert_eq!(second.total, 2);
    assert_eq!(std::fs::read_to_string(&c.dataset).unwrap(), before);
}

#[test]
fn test_fixed_label_is_picked_up() {
    let c = corpus("PSD_data.csv");
    run(&c, FeatureMode::PitchClass, None);

    std::fs::write(c.keys.join("unlabeled.key"), "D major\n").unwrap();
    let summary = run(&c, FeatureMode::PitchClass, None);
    assert_eq!(summary.written, 1);
    assert_eq!(summary.failed, 1);

    let rows = sorted_rows(&c.dataset);
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().any(|r| r[13] == "unlabeled.wav" && r[12] == "D major"));
}

#[test]
fn test_resume_matches_uninterrupted_run() {
    let whole = corpus("PSD_data.csv");
    run(&whole, FeatureMode::PitchClass, None);

    let resumed = corpus("PSD_data.csv");
    let first = run(&resumed, FeatureMode::PitchClass, Some(1));
    assert_eq!(first.total, 1);
    run(&resumed, FeatureMode::PitchClass, None);

    assert_eq!(sorted_rows(&whole.dataset), sorted_rows(&resumed.dataset));
}

#[test]
fn test_pure_tone_dominated_by_a() {
    let c = corpus("PSD_data.csv");
    run(&c, FeatureMode::PitchClass, None);

    let rows = sorted_rows(&c.dataset);
    let a_row = &rows[0];
    let powers: Vec<f64> = a_row[..12].iter().map(|v| v.parse().unwrap()).collect();
    let total: f64 = powers.iter().sum();
    assert!(powers[PitchClass::A.index()] / total > 0.9);

    // The chord row carries C, E and G
    let chord: Vec<f64> = rows[1][..12].iter().map(|v| v.parse().unwrap()).collect();
    for pc in [PitchClass::C, PitchClass::E, PitchClass::G] {
        assert!(chord[pc.index()] > 0.0, "{} missing", pc);
    }
}

#[test]
fn test_linear_pipeline_into_sqlite() {
    let c = corpus("features.db");
    let summary = run(&c, FeatureMode::Linear, None);
    assert_eq!(summary.written, 2);

    let db = SqliteSink::open(&c.dataset, FeatureMode::Linear).unwrap();
    let bins = db.features_for("a_tone.wav").unwrap().unwrap();
    assert_eq!(bins.len(), 7991);
    let peak = bins
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i + 10)
        .unwrap();
    assert_eq!(peak, 440);

    assert_eq!(run(&c, FeatureMode::Linear, None).written, 0);
}

#[test]
fn test_stereo_is_downmixed() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join("stereo.wav");
    write_tone(&path, &[440.0], 0.5, 2);
    let w = SymphoniaDecoder::default().decode(&path).unwrap();
    assert_eq!(w.sample_rate, SR);
    assert_eq!(w.samples.len(), (SR as f64 * 0.5) as usize);
    let peak = w.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!((peak - 0.4).abs() < 0.01, "peak {}", peak);
}
