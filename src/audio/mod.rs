// Audio module
// WAV ingestion and onset/amplitude extraction

pub mod ingest;
pub mod onset;

pub use ingest::{ingest_wav, read_wav, AudioData, AudioError};
pub use onset::{
    extract, extract_with, OnsetConfig, OnsetDetector, OnsetEvent, SpectralFluxDetector,
    DEFAULT_PEAK_WINDOW_MS,
};
