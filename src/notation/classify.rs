// Amplitude-rank voice classification
// Buckets onset events into the selected voices by normalized loudness.
// There is no timbral analysis: the order of the selection alone decides
// which voice a given loudness lands on.

use serde::{Deserialize, Serialize};

use super::catalog::{symbol_for_name, Symbol};
use crate::audio::OnsetEvent;

/// Normalized amplitude used when all events are equally loud
pub const FLAT_AMPLITUDE: f64 = 0.5;

/// An onset event assigned to a voice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedHit {
    /// Seconds from the start of the clip
    pub time_seconds: f64,

    /// Voice name, always taken from the selection
    pub voice: String,

    pub symbol: Symbol,
}

/// Assign every event to one of `selection`.
///
/// Amplitudes are min-max normalized across the events, then
/// `index = min(floor(normalized * N), N - 1)` picks the voice. When the
/// range is zero every event gets [`FLAT_AMPLITUDE`]. Empty events or an
/// empty selection produce no hits.
pub fn classify<S: AsRef<str>>(events: &[OnsetEvent], selection: &[S]) -> Vec<ClassifiedHit> {
    if selection.is_empty() || events.is_empty() {
        return Vec::new();
    }

    let (amp_min, amp_max) = events.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), e| {
        let amp = e.peak_amplitude as f64;
        (lo.min(amp), hi.max(amp))
    });
    let amp_range = amp_max - amp_min;

    let hits: Vec<ClassifiedHit> = events
        .iter()
        .map(|event| {
            let normalized = if amp_range > 0.0 {
                (event.peak_amplitude as f64 - amp_min) / amp_range
            } else {
                FLAT_AMPLITUDE
            };

            let voice = selection[voice_index(normalized, selection.len())].as_ref();

            ClassifiedHit {
                time_seconds: event.time_seconds,
                voice: voice.to_string(),
                symbol: symbol_for_name(voice),
            }
        })
        .collect();

    log::debug!(
        "Classified {} events into {} voices (amplitude range {:.4}..{:.4})",
        hits.len(),
        selection.len(),
        amp_min,
        amp_max
    );

    hits
}

/// Bucket index for a normalized amplitude, clamped to the last voice
pub fn voice_index(normalized: f64, voice_count: usize) -> usize {
    if voice_count == 0 {
        return 0;
    }
    // `as` saturates, so NaN and negatives land on bucket 0
    let bucket = (normalized * voice_count as f64).floor() as usize;
    bucket.min(voice_count - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(time_seconds: f64, peak_amplitude: f32) -> OnsetEvent {
        OnsetEvent {
            time_seconds,
            peak_amplitude,
        }
    }

    #[test]
    fn test_two_voice_scenario() {
        let events = vec![event(0.0, 1.0), event(0.5, 0.2)];
        let hits = classify(&events, &["Bass 1", "Snare"]);

        assert_eq!(hits.len(), 2);
        // normalized 1.0 -> min(floor(2.0), 1) = 1
        assert_eq!(hits[0].voice, "Snare");
        assert_eq!(hits[0].time_seconds, 0.0);
        // normalized 0.0 -> 0
        assert_eq!(hits[1].voice, "Bass 1");
        assert_eq!(hits[1].symbol, Symbol::Open);
    }

    #[test]
    fn test_empty_selection_yields_nothing() {
        let events = vec![event(0.1, 0.3), event(0.2, 0.9)];
        let selection: [&str; 0] = [];

        assert!(classify(&events, &selection).is_empty());
    }

    #[test]
    fn test_empty_events_yield_nothing() {
        assert!(classify(&[], &["Snare", "Hi-hat"]).is_empty());
    }

    #[test]
    fn test_flat_amplitudes_take_middle_bucket() {
        let events = vec![event(0.0, 0.4), event(0.3, 0.4), event(0.6, 0.4)];

        let three = classify(&events, &["Bass 1", "Snare", "Hi-hat"]);
        assert!(three.iter().all(|h| h.voice == "Snare"));

        // floor(0.5 * 1) = 0
        let one = classify(&events[..1], &["Ride"]);
        assert_eq!(one[0].voice, "Ride");
        assert_eq!(one[0].symbol, Symbol::Cross);

        // floor(0.5 * 2) = 1
        let two = classify(&events[..1], &["Bass 1", "Crash"]);
        assert_eq!(two[0].voice, "Crash");
    }

    #[test]
    fn test_indices_stay_in_range() {
        let events: Vec<OnsetEvent> = (0..50)
            .map(|i| event(i as f64 * 0.1, ((i * 37) % 50) as f32 / 49.0))
            .collect();
        let selection = ["Bass 1", "Snare", "Tom 1", "Hi-hat", "Ride", "China", "Crash"];

        let hits = classify(&events, &selection);

        assert_eq!(hits.len(), events.len());
        for hit in &hits {
            assert!(selection.contains(&hit.voice.as_str()));
        }
        // The loudest event takes the last voice, the quietest the first
        let loudest = events
            .iter()
            .position(|e| e.peak_amplitude == 1.0)
            .unwrap();
        let quietest = events
            .iter()
            .position(|e| e.peak_amplitude == 0.0)
            .unwrap();
        assert_eq!(hits[loudest].voice, "Crash");
        assert_eq!(hits[quietest].voice, "Bass 1");
    }

    #[test]
    fn test_voice_index_clamps() {
        assert_eq!(voice_index(1.0, 4), 3);
        assert_eq!(voice_index(0.999, 4), 3);
        assert_eq!(voice_index(0.25, 4), 1);
        assert_eq!(voice_index(0.0, 4), 0);
        assert_eq!(voice_index(f64::NAN, 4), 0);
        assert_eq!(voice_index(0.5, 0), 0);
    }

    #[test]
    fn test_unknown_voice_name_uses_open_symbol() {
        let hits = classify(&[event(0.0, 0.5)], &["Cowbell".to_string()]);

        assert_eq!(hits[0].voice, "Cowbell");
        assert_eq!(hits[0].symbol, Symbol::Open);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let events = vec![event(0.0, 0.7), event(0.25, 0.1), event(0.5, 0.4)];
        let selection = ["Bass 1", "Snare", "Hi-hat"];

        assert_eq!(classify(&events, &selection), classify(&events, &selection));
    }
}
