// Tempo estimation - single constant BPM from inter-onset intervals
// Used when the caller has no tempo of their own to notate against

use serde::{Deserialize, Serialize};

use crate::audio::OnsetEvent;

/// BPM reported when there is too little material to estimate from
pub const FALLBACK_BPM: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoEstimate {
    /// Estimated beats per minute
    pub bpm: f64,

    /// Confidence in the estimate [0.0, 1.0]; zero means the fallback was used
    pub confidence: f32,
}

impl TempoEstimate {
    fn fallback() -> Self {
        TempoEstimate {
            bpm: FALLBACK_BPM,
            confidence: 0.0,
        }
    }
}

/// Configuration for tempo estimation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// Slowest tempo considered
    pub min_bpm: f64,

    /// Fastest tempo considered
    pub max_bpm: f64,

    /// Number of bins in the interval histogram
    pub histogram_bins: usize,

    /// Fewer onsets than this returns the fallback
    pub min_onsets: usize,
}

impl Default for TempoConfig {
    fn default() -> Self {
        TempoConfig {
            min_bpm: 60.0,
            max_bpm: 180.0,
            histogram_bins: 300,
            min_onsets: 8,
        }
    }
}

impl TempoConfig {
    /// Beat period range in seconds, shortest first
    fn period_range(&self) -> Option<(f64, f64)> {
        if self.min_bpm <= 0.0 || self.max_bpm <= self.min_bpm || self.histogram_bins < 3 {
            return None;
        }
        Some((60.0 / self.max_bpm, 60.0 / self.min_bpm))
    }
}

/// Estimate tempo with the default configuration
pub fn estimate_tempo(events: &[OnsetEvent]) -> TempoEstimate {
    estimate_tempo_with_config(events, &TempoConfig::default())
}

/// Estimate tempo from onset spacing.
///
/// Every inter-onset interval votes for its period bin, and at half weight
/// for the bins of its half and double. The smoothed histogram's tallest
/// peak is the beat period.
pub fn estimate_tempo_with_config(events: &[OnsetEvent], config: &TempoConfig) -> TempoEstimate {
    if events.len() < config.min_onsets {
        log::debug!(
            "{} onsets is too few for tempo estimation, using {} BPM",
            events.len(),
            FALLBACK_BPM
        );
        return TempoEstimate::fallback();
    }

    let Some((min_period, max_period)) = config.period_range() else {
        log::warn!("Invalid tempo range {}..{} BPM", config.min_bpm, config.max_bpm);
        return TempoEstimate::fallback();
    };

    let intervals: Vec<f64> = events
        .windows(2)
        .map(|w| w[1].time_seconds - w[0].time_seconds)
        .filter(|ioi| *ioi > 0.0)
        .collect();

    if intervals.is_empty() {
        return TempoEstimate::fallback();
    }

    let bins = config.histogram_bins;
    let bin_width = (max_period - min_period) / bins as f64;
    let mut histogram = vec![0.0f32; bins];

    let mut vote = |period: f64, weight: f32| {
        if period >= min_period && period <= max_period {
            let bin = (((period - min_period) / bin_width) as usize).min(bins - 1);
            histogram[bin] += weight;
        }
    };

    for &ioi in &intervals {
        vote(ioi, 1.0);
        vote(ioi / 2.0, 0.5);
        vote(ioi * 2.0, 0.5);
    }

    let smoothed = smooth(&histogram, 3);

    let Some((best_bin, peak)) = smoothed
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    else {
        return TempoEstimate::fallback();
    };

    if peak <= 0.0 {
        return TempoEstimate::fallback();
    }

    // Bin center
    let period = min_period + (best_bin as f64 + 0.5) * bin_width;
    let bpm = (60.0 / period).clamp(config.min_bpm, config.max_bpm);

    let mean = smoothed.iter().sum::<f32>() / smoothed.len() as f32;
    let confidence = if mean > 0.0 {
        (peak / (mean * 3.0)).min(1.0)
    } else {
        0.0
    };

    log::debug!("Tempo estimate {:.2} BPM (confidence {:.2})", bpm, confidence);

    TempoEstimate { bpm, confidence }
}

/// Centered moving average
fn smooth(histogram: &[f32], window_size: usize) -> Vec<f32> {
    let half = window_size / 2;

    (0..histogram.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(histogram.len());
            histogram[start..end].iter().sum::<f32>() / (end - start) as f32
        })
        .collect()
}
