// Notation grid - 16th-note staff per voice and its text rendering

use serde::{Deserialize, Serialize};
use std::fmt;

use super::catalog::Symbol;
use super::classify::ClassifiedHit;

/// Grid resolution: 16th notes
pub const SLOTS_PER_BEAT: usize = 16;

/// Slots printed together, one quarter of a beat's slots
pub const SLOTS_PER_GROUP: usize = SLOTS_PER_BEAT / 4;

/// Width the voice name is padded to
pub const VOICE_COLUMN_WIDTH: usize = 12;

/// Glyph for an empty slot
pub const REST: char = '-';

/// One staff line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceRow {
    pub voice: String,

    /// `None` is a rest
    pub slots: Vec<Option<Symbol>>,
}

impl VoiceRow {
    pub fn is_active(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }

    /// Slot indices that carry a stroke
    pub fn struck_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|_| i))
            .collect()
    }
}

/// Shared 16th-note timeline for every selected voice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotationGrid {
    pub bpm: f64,
    pub total_slots: usize,
    pub rows: Vec<VoiceRow>,
}

/// Notation text plus the hits it was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedNotation {
    pub text: String,
    pub hits: Vec<ClassifiedHit>,
}

/// Seconds per beat. `bpm` must be positive.
pub fn beat_duration(bpm: f64) -> f64 {
    debug_assert!(bpm > 0.0, "bpm must be positive, got {}", bpm);
    60.0 / bpm
}

/// Whole beats in the clip times [`SLOTS_PER_BEAT`]
pub fn total_slots(duration_seconds: f64, bpm: f64) -> usize {
    let beats = (duration_seconds / beat_duration(bpm)).floor();
    // NaN and negatives saturate to zero
    (beats.max(0.0) as usize) * SLOTS_PER_BEAT
}

/// Slot a time falls in, before any bounds check against the grid length.
/// `None` for negative or non-finite times.
pub fn slot_index(time_seconds: f64, bpm: f64) -> Option<usize> {
    let position = (time_seconds / beat_duration(bpm) * SLOTS_PER_BEAT as f64).floor();
    if position.is_finite() && position >= 0.0 {
        Some(position as usize)
    } else {
        None
    }
}

impl NotationGrid {
    /// Empty staff for each selected voice. A voice listed twice keeps one row.
    pub fn new<S: AsRef<str>>(duration_seconds: f64, bpm: f64, selection: &[S]) -> Self {
        let total_slots = total_slots(duration_seconds, bpm);
        let mut rows: Vec<VoiceRow> = Vec::with_capacity(selection.len());

        for name in selection {
            let name = name.as_ref();
            if rows.iter().any(|row| row.voice == name) {
                continue;
            }
            rows.push(VoiceRow {
                voice: name.to_string(),
                slots: vec![None; total_slots],
            });
        }

        NotationGrid {
            bpm,
            total_slots,
            rows,
        }
    }

    /// Write a hit into its voice's row. Later hits overwrite earlier ones on
    /// the same slot. Returns false when the hit falls outside the grid or
    /// names a voice that has no row.
    pub fn place(&mut self, hit: &ClassifiedHit) -> bool {
        let Some(slot) = slot_index(hit.time_seconds, self.bpm) else {
            return false;
        };
        if slot >= self.total_slots {
            return false;
        }

        match self.rows.iter_mut().find(|row| row.voice == hit.voice) {
            Some(row) => {
                row.slots[slot] = Some(hit.symbol);
                true
            }
            None => false,
        }
    }

    pub fn row(&self, voice: &str) -> Option<&VoiceRow> {
        self.rows.iter().find(|row| row.voice == voice)
    }

    /// Rows with at least one stroke, in selection order
    pub fn active_rows(&self) -> impl Iterator<Item = &VoiceRow> {
        self.rows.iter().filter(|row| row.is_active())
    }
}

impl fmt::Display for NotationGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Drum Notation (4/4, 16th note resolution, BPM: {}):\n\n",
            format_bpm(self.bpm)
        )?;

        for row in self.active_rows() {
            write!(f, "{:<width$} | ", row.voice, width = VOICE_COLUMN_WIDTH)?;
            for group in row.slots.chunks(SLOTS_PER_GROUP) {
                for slot in group {
                    let glyph = slot.map(|s| s.as_char()).unwrap_or(REST);
                    write!(f, "{}", glyph)?;
                }
                f.write_str(" ")?;
            }
            f.write_str("\n")?;
        }

        Ok(())
    }
}

/// Lay `hits` onto a grid spanning `duration_seconds` and render it.
///
/// Hits past the last whole beat are dropped. Only voices with at least one
/// stroke get a line. The hits are handed back untouched for plotting.
pub fn render<S: AsRef<str>>(
    hits: Vec<ClassifiedHit>,
    duration_seconds: f64,
    bpm: f64,
    selection: &[S],
) -> RenderedNotation {
    let mut grid = NotationGrid::new(duration_seconds, bpm, selection);

    let dropped = hits.iter().filter(|hit| !grid.place(hit)).count();
    if dropped > 0 {
        log::warn!(
            "Dropped {} of {} hits outside the {}-slot grid",
            dropped,
            hits.len(),
            grid.total_slots
        );
    }

    RenderedNotation {
        text: grid.to_string(),
        hits,
    }
}

/// Print a BPM the way a float literal reads: `120.0`, `117.45`
fn format_bpm(bpm: f64) -> String {
    if bpm.is_finite() && bpm.fract() == 0.0 {
        format!("{:.1}", bpm)
    } else {
        format!("{}", bpm)
    }
}
