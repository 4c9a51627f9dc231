// Pipeline orchestration
// waveform -> onset events -> classified hits -> rendered notation

pub mod trace;

pub use trace::{read_trace_file, Stage, TraceEntry, TraceError, TraceWriter};

use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use crate::audio::{self, AudioError, OnsetDetector, OnsetEvent, SpectralFluxDetector};
use crate::groove::{self, TempoConfig, TempoEstimate};
use crate::notation::{self, RenderedNotation, Selection};

/// Slowest tempo accepted for notation
pub const MIN_BPM: f64 = 30.0;

/// Fastest tempo accepted for notation
pub const MAX_BPM: f64 = 300.0;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("BPM must be between 30 and 300, got {0}")]
    BpmOutOfRange(f64),

    #[error("Failed to load audio: {0}")]
    Audio(#[from] AudioError),
}

/// One clip to transcribe
#[derive(Debug, Clone, Copy)]
pub struct TranscribeRequest<'a> {
    /// Mono samples
    pub samples: &'a [f32],

    pub sample_rate: u32,

    /// Clip length in seconds; sets the grid length
    pub duration_seconds: f64,

    /// Tempo to notate against; `None` estimates one from the onsets
    pub bpm: Option<f64>,

    pub selection: &'a Selection,
}

/// Everything one run produced
#[derive(Debug, Clone, Serialize)]
pub struct Transcription {
    /// Tempo the grid was built on
    pub bpm: f64,

    /// Present when the tempo was estimated rather than supplied
    pub tempo_estimate: Option<TempoEstimate>,

    pub events: Vec<OnsetEvent>,

    pub notation: RenderedNotation,
}

/// Runs the transcription pipeline with a fixed detector and settings
pub struct Transcriber {
    detector: Box<dyn OnsetDetector>,
    peak_window_ms: f64,
    tempo_config: TempoConfig,
    trace: Option<TraceWriter>,
}

impl Default for Transcriber {
    fn default() -> Self {
        Transcriber {
            detector: Box::new(SpectralFluxDetector::default()),
            peak_window_ms: audio::DEFAULT_PEAK_WINDOW_MS,
            tempo_config: TempoConfig::default(),
            trace: None,
        }
    }
}

impl Transcriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detector(mut self, detector: impl OnsetDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    pub fn with_peak_window_ms(mut self, peak_window_ms: f64) -> Self {
        self.peak_window_ms = peak_window_ms;
        self
    }

    pub fn with_tempo_config(mut self, tempo_config: TempoConfig) -> Self {
        self.tempo_config = tempo_config;
        self
    }

    pub fn with_trace(mut self, writer: TraceWriter) -> Self {
        self.trace = Some(writer);
        self
    }

    fn record(&self, entry: TraceEntry) {
        if let Some(ref writer) = self.trace {
            writer.record(entry);
        }
    }

    /// Load a WAV file, mix it to mono and transcribe it
    pub fn transcribe_wav(
        &self,
        path: &Path,
        bpm: Option<f64>,
        selection: &Selection,
    ) -> Result<Transcription, PipelineError> {
        self.record(Stage::Ingest.start(format!("Loading {}", path.display())));

        let audio = audio::read_wav(path)?;
        let samples = audio.to_mono();
        let duration_seconds = audio.duration_secs();

        self.record(Stage::Ingest.complete_with(
            "Loaded audio",
            serde_json::json!({
                "sample_rate": audio.sample_rate,
                "channels": audio.channels,
                "duration_seconds": duration_seconds,
            }),
        ));

        self.transcribe(&TranscribeRequest {
            samples: &samples,
            sample_rate: audio.sample_rate,
            duration_seconds,
            bpm,
            selection,
        })
    }

    /// Detect, classify, quantize and render one clip
    pub fn transcribe(&self, request: &TranscribeRequest<'_>) -> Result<Transcription, PipelineError> {
        if let Some(bpm) = request.bpm {
            validate_bpm(bpm)?;
        }

        self.record(Stage::OnsetDetection.start("Detecting onsets"));
        let events = audio::extract_with(
            self.detector.as_ref(),
            request.samples,
            request.sample_rate,
            self.peak_window_ms,
        );
        log::info!("Detected {} onsets", events.len());
        self.record(Stage::OnsetDetection.complete_with(
            format!("Detected {} onsets", events.len()),
            serde_json::json!({ "onsets_detected": events.len() }),
        ));

        let (bpm, tempo_estimate) = match request.bpm {
            Some(bpm) => (bpm, None),
            None => {
                self.record(Stage::TempoEstimation.start("Estimating tempo"));
                let estimate = groove::estimate_tempo_with_config(&events, &self.tempo_config);
                log::info!(
                    "Estimated tempo {:.2} BPM (confidence {:.2})",
                    estimate.bpm,
                    estimate.confidence
                );
                self.record(Stage::TempoEstimation.complete_with(
                    format!("Estimated {:.2} BPM", estimate.bpm),
                    serde_json::json!({
                        "bpm": estimate.bpm,
                        "confidence": estimate.confidence,
                    }),
                ));
                validate_bpm(estimate.bpm)?;
                (estimate.bpm, Some(estimate))
            }
        };

        self.record(Stage::Classification.start("Classifying hits"));
        let names = request.selection.names();
        let hits = notation::classify(&events, &names);
        self.record(Stage::Classification.complete_with(
            format!("Classified {} hits", hits.len()),
            serde_json::json!({ "hits": hits.len(), "voices": names }),
        ));

        self.record(Stage::Rendering.start("Rendering notation"));
        let rendered = notation::render(hits, request.duration_seconds, bpm, &names);
        self.record(Stage::Rendering.complete_with(
            "Rendered notation",
            serde_json::json!({
                "total_slots": notation::total_slots(request.duration_seconds, bpm),
            }),
        ));

        Ok(Transcription {
            bpm,
            tempo_estimate,
            events,
            notation: rendered,
        })
    }
}

/// Reject tempos the notation grid is not meant for
pub fn validate_bpm(bpm: f64) -> Result<(), PipelineError> {
    if (MIN_BPM..=MAX_BPM).contains(&bpm) {
        Ok(())
    } else {
        Err(PipelineError::BpmOutOfRange(bpm))
    }
}
