pub mod analyzer;
pub mod bands;
pub mod config;
pub mod db;
pub mod scanner;

/// Audio file extensions we support
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a", "aac"];

/// Application name for XDG paths
pub const APP_NAME: &str = "pitchbin";

/// Default dataset file names (in the XDG data directory)
pub const PITCH_DATASET: &str = "PSD_data.csv";
pub const LINEAR_DATASET: &str = "fft_frame.csv";
