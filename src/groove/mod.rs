// Groove module
// Single-tempo estimation for clips that arrive without a BPM

pub mod tempo;

pub use tempo::{estimate_tempo, estimate_tempo_with_config, TempoConfig, TempoEstimate, FALLBACK_BPM};
