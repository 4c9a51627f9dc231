// Onset and amplitude extraction
// Spectral flux novelty curve with adaptive peak picking, plus a
// peak-amplitude probe at each detected strike

use realfft::{RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

/// Default span sampled for an event's peak amplitude, starting at the onset.
/// Zero reads the single sample nearest the onset.
pub const DEFAULT_PEAK_WINDOW_MS: f64 = 0.0;

/// A detected strike
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OnsetEvent {
    /// Seconds from the start of the clip
    pub time_seconds: f64,

    /// Absolute signal amplitude at the strike, in [0.0, 1.0] for normalized input
    pub peak_amplitude: f32,
}

/// Anything that can turn a mono waveform into onset times.
///
/// Implementations return strictly increasing times in seconds. An empty
/// result means no strikes were found.
pub trait OnsetDetector {
    fn detect(&self, samples: &[f32], sample_rate: u32) -> Vec<f64>;
}

/// Configuration for spectral flux onset detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetConfig {
    /// FFT window size in samples (power of 2)
    pub window_size: usize,

    /// Hop size in samples (advance between frames)
    pub hop_size: usize,

    /// A peak must be the maximum over this many ms before it
    pub pre_max_ms: f64,

    /// Span before the frame included in the local mean
    pub pre_avg_ms: f64,

    /// Span after the frame included in the local mean
    pub post_avg_ms: f64,

    /// Normalized flux a peak must exceed the local mean by
    pub delta: f32,

    /// Minimum time between onsets in milliseconds
    pub wait_ms: f64,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        OnsetConfig {
            window_size: 2048,
            hop_size: 512,
            pre_max_ms: 30.0,
            pre_avg_ms: 100.0,
            post_avg_ms: 100.0,
            delta: 0.07,
            wait_ms: 30.0,
        }
    }
}

impl OnsetConfig {
    fn ms_to_frames(&self, ms: f64, sample_rate: u32) -> usize {
        (ms / 1000.0 * sample_rate as f64 / self.hop_size as f64) as usize
    }
}

/// Default detector: log-magnitude spectral flux over centered STFT frames
#[derive(Debug, Clone, Default)]
pub struct SpectralFluxDetector {
    config: OnsetConfig,
}

impl SpectralFluxDetector {
    pub fn new(config: OnsetConfig) -> Self {
        SpectralFluxDetector { config }
    }

    pub fn config(&self) -> &OnsetConfig {
        &self.config
    }
}

impl OnsetDetector for SpectralFluxDetector {
    fn detect(&self, samples: &[f32], sample_rate: u32) -> Vec<f64> {
        let config = &self.config;

        if samples.is_empty() || sample_rate == 0 || config.hop_size == 0 || config.window_size < 2 {
            return Vec::new();
        }

        let mut flux = compute_spectral_flux(samples, config);

        let max_flux = flux.iter().cloned().fold(0.0f32, f32::max);
        if max_flux <= 0.0 {
            return Vec::new();
        }
        for v in &mut flux {
            *v /= max_flux;
        }

        let hop_seconds = config.hop_size as f64 / sample_rate as f64;
        pick_onset_peaks(&flux, sample_rate, config)
            .into_iter()
            .map(|frame| frame as f64 * hop_seconds)
            .collect()
    }
}

/// Detect onsets with the default detector and read the absolute sample
/// nearest each one
pub fn extract(samples: &[f32], sample_rate: u32) -> Vec<OnsetEvent> {
    extract_with(
        &SpectralFluxDetector::default(),
        samples,
        sample_rate,
        DEFAULT_PEAK_WINDOW_MS,
    )
}

/// Detect onsets with `detector` and attach a peak amplitude to each.
///
/// The amplitude is the largest absolute sample in the `peak_window_ms` span
/// starting at the sample nearest the onset. A zero window reads that single
/// sample. Events come back sorted by time with duplicates removed.
pub fn extract_with(
    detector: &dyn OnsetDetector,
    samples: &[f32],
    sample_rate: u32,
    peak_window_ms: f64,
) -> Vec<OnsetEvent> {
    if samples.is_empty() || sample_rate == 0 {
        return Vec::new();
    }

    let times = detector.detect(samples, sample_rate);
    log::debug!("Onset detector returned {} onsets", times.len());

    let window_len = ((peak_window_ms.max(0.0) / 1000.0) * sample_rate as f64).round() as usize;

    let mut times: Vec<f64> = times
        .into_iter()
        .filter(|t| t.is_finite() && *t >= 0.0)
        .collect();
    times.sort_by(f64::total_cmp);
    times.dedup();

    times
        .into_iter()
        .map(|time_seconds| OnsetEvent {
            time_seconds,
            peak_amplitude: peak_amplitude(samples, sample_rate, time_seconds, window_len),
        })
        .collect()
}

fn peak_amplitude(samples: &[f32], sample_rate: u32, time_seconds: f64, window_len: usize) -> f32 {
    let last = samples.len() - 1;
    let start = ((time_seconds * sample_rate as f64).round() as usize).min(last);
    let end = (start + window_len.max(1)).min(samples.len());

    samples[start..end]
        .iter()
        .map(|s| s.abs())
        .fold(0.0f32, f32::max)
}

/// Spectral flux per frame. Frame `i` is centered on sample `i * hop_size`,
/// so the signal is zero-padded by half a window on both sides. Odd windows
/// take the extra sample on the right.
fn compute_spectral_flux(samples: &[f32], config: &OnsetConfig) -> Vec<f32> {
    let window_size = config.window_size;
    let hop_size = config.hop_size;
    let half = window_size / 2;

    let mut padded = vec![0.0f32; samples.len() + window_size];
    padded[half..half + samples.len()].copy_from_slice(samples);

    let num_frames = samples.len() / hop_size + 1;
    let window = hann_window(window_size);

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(window_size);
    let mut input = fft.make_input_vec();
    let mut spectrum = fft.make_output_vec();

    let mut flux = Vec::with_capacity(num_frames);
    let mut prev: Option<Vec<f32>> = None;

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop_size;
        let frame = &padded[start..start + window_size];

        for ((dst, &s), &w) in input.iter_mut().zip(frame).zip(&window) {
            *dst = s * w;
        }

        if let Err(e) = fft.process(&mut input, &mut spectrum) {
            log::warn!("FFT failed at frame {}: {}", frame_idx, e);
            break;
        }

        // Log compression keeps soft strikes visible next to loud ones
        let magnitudes: Vec<f32> = spectrum.iter().map(|c| c.norm().ln_1p()).collect();

        let frame_flux: f32 = match prev {
            Some(ref prev) => magnitudes
                .iter()
                .zip(prev.iter())
                .map(|(curr, prev)| (curr - prev).max(0.0))
                .sum(),
            None => 0.0,
        };

        flux.push(frame_flux);
        prev = Some(magnitudes);
    }

    flux
}

fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos()))
        .collect()
}

/// Pick frames of a normalized novelty curve that are local maxima and stand
/// out from a moving average
fn pick_onset_peaks(flux: &[f32], sample_rate: u32, config: &OnsetConfig) -> Vec<usize> {
    let pre_max = config.ms_to_frames(config.pre_max_ms, sample_rate).max(1);
    let pre_avg = config.ms_to_frames(config.pre_avg_ms, sample_rate).max(1);
    let post_avg = config.ms_to_frames(config.post_avg_ms, sample_rate);
    let wait = config.ms_to_frames(config.wait_ms, sample_rate);

    let mut peaks = Vec::new();
    let mut last_peak: Option<usize> = None;

    for (i, &value) in flux.iter().enumerate() {
        if value <= 0.0 {
            continue;
        }

        let local_max = flux[i.saturating_sub(pre_max)..=i]
            .iter()
            .cloned()
            .fold(f32::MIN, f32::max);
        if value < local_max {
            continue;
        }

        let avg_slice = &flux[i.saturating_sub(pre_avg)..(i + post_avg + 1).min(flux.len())];
        let mean = avg_slice.iter().sum::<f32>() / avg_slice.len() as f32;
        if value < mean + config.delta {
            continue;
        }

        if let Some(last) = last_peak {
            if i - last <= wait {
                continue;
            }
        }

        peaks.push(i);
        last_peak = Some(i);
    }

    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;

    /// Short decaying 3 kHz bursts at the given (time, gain) positions
    fn click_track(clicks: &[(f64, f32)], seconds: f64) -> Vec<f32> {
        let mut samples = vec![0.0f32; (seconds * SAMPLE_RATE as f64) as usize];
        let burst_len = (0.02 * SAMPLE_RATE as f64) as usize;

        for &(time, gain) in clicks {
            let start = (time * SAMPLE_RATE as f64) as usize;
            for n in 0..burst_len {
                let t = n as f32 / SAMPLE_RATE as f32;
                let envelope = (-t / 0.005).exp();
                let tone = (2.0 * std::f32::consts::PI * 3000.0 * t + 0.5).sin();
                if let Some(s) = samples.get_mut(start + n) {
                    *s += gain * envelope * tone;
                }
            }
        }

        samples
    }

    struct FixedTimes(Vec<f64>);

    impl OnsetDetector for FixedTimes {
        fn detect(&self, _samples: &[f32], _sample_rate: u32) -> Vec<f64> {
            self.0.clone()
        }
    }

    #[test]
    fn test_hann_window() {
        let window = hann_window(100);

        assert!(window[0] < 0.1);
        assert!(window[99] < 0.1);
        assert!(window[50] > 0.9);
    }

    #[test]
    fn test_detects_each_click() {
        let clicks = [(0.25, 1.0), (0.75, 0.5), (1.25, 1.0), (1.75, 0.5)];
        let samples = click_track(&clicks, 2.0);

        let times = SpectralFluxDetector::default().detect(&samples, SAMPLE_RATE);

        assert_eq!(times.len(), clicks.len(), "onsets: {:?}", times);
        for (detected, (expected, _)) in times.iter().zip(clicks.iter()) {
            assert!(
                (detected - expected).abs() < 0.05,
                "onset {} too far from {}",
                detected,
                expected
            );
        }
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_extract_reads_nearest_sample() {
        let clicks = [(0.25, 0.9), (0.75, 0.3), (1.25, 0.9), (1.75, 0.3)];
        let samples = click_track(&clicks, 2.0);

        let times = SpectralFluxDetector::default().detect(&samples, SAMPLE_RATE);
        let events = extract(&samples, SAMPLE_RATE);

        assert_eq!(events.len(), times.len());
        for (event, time) in events.iter().zip(&times) {
            let nearest = (time * SAMPLE_RATE as f64).round() as usize;
            assert_eq!(event.time_seconds, *time);
            assert_eq!(event.peak_amplitude, samples[nearest].abs());
        }
    }

    #[test]
    fn test_default_window_is_single_sample() {
        let mut samples = vec![0.0f32; 100];
        samples[0] = 0.1;
        samples[20] = 0.9;

        let events = extract_with(&FixedTimes(vec![0.0]), &samples, 1000, DEFAULT_PEAK_WINDOW_MS);

        assert_eq!(events[0].peak_amplitude, 0.1);
    }

    #[test]
    fn test_peak_window_ranks_loud_and_soft_strikes() {
        let clicks = [(0.25, 0.9), (0.75, 0.3), (1.25, 0.9), (1.75, 0.3)];
        let samples = click_track(&clicks, 2.0);

        let events = extract_with(&SpectralFluxDetector::default(), &samples, SAMPLE_RATE, 50.0);

        assert_eq!(events.len(), 4);
        assert!(events[0].peak_amplitude > events[1].peak_amplitude);
        assert!(events[2].peak_amplitude > events[3].peak_amplitude);
        assert!(events.iter().all(|e| e.peak_amplitude <= 1.0));
    }

    #[test]
    fn test_silence_has_no_onsets() {
        let samples = vec![0.0f32; SAMPLE_RATE as usize];
        assert!(extract(&samples, SAMPLE_RATE).is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(extract(&[], SAMPLE_RATE).is_empty());
        assert!(extract(&[0.5, -0.5], 0).is_empty());
    }

    #[test]
    fn test_zero_window_reads_nearest_sample() {
        let samples = vec![0.0, -0.8, 0.1, 0.4];
        let detector = FixedTimes(vec![0.25, 10.0]);

        // 4 Hz: t = 0.25 s lands on sample 1, t = 10 s clamps to the last sample
        let events = extract_with(&detector, &samples, 4, 0.0);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].peak_amplitude, 0.8);
        assert_eq!(events[1].peak_amplitude, 0.4);
    }

    #[test]
    fn test_peak_window_takes_max_ahead_of_onset() {
        let samples = vec![0.0, 0.1, -0.9, 0.2, 0.0, 0.0];
        let detector = FixedTimes(vec![0.0]);

        // 1000 Hz with a 3 ms window covers samples 0..3
        let events = extract_with(&detector, &samples, 1000, 3.0);

        assert_eq!(events[0].peak_amplitude, 0.9);
    }

    #[test]
    fn test_odd_window_size() {
        let clicks = [(0.25, 1.0), (0.75, 1.0)];
        let samples = click_track(&clicks, 1.0);
        let detector = SpectralFluxDetector::new(OnsetConfig {
            window_size: 2047,
            ..OnsetConfig::default()
        });

        let short = detector.detect(&[0.1; 1024], SAMPLE_RATE);
        assert!(short.iter().all(|t| *t <= 1024.0 / SAMPLE_RATE as f64));
        assert_eq!(detector.detect(&samples, SAMPLE_RATE).len(), 2);
    }

    #[test]
    fn test_unordered_times_are_sorted() {
        let samples = vec![0.5; 8];
        let detector = FixedTimes(vec![0.004, 0.001, 0.004, 0.002]);

        let times: Vec<f64> = extract_with(&detector, &samples, 1000, 0.0)
            .iter()
            .map(|e| e.time_seconds)
            .collect();

        assert_eq!(times, vec![0.001, 0.002, 0.004]);
    }

    #[test]
    fn test_non_finite_times_are_skipped() {
        let samples = vec![0.5; 8];
        let detector = FixedTimes(vec![f64::NAN, -1.0, 0.001]);

        let events = extract_with(&detector, &samples, 1000, 0.0);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time_seconds, 0.001);
    }
}
