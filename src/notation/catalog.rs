// Drum voice catalog
// The fixed set of voices a user can declare present in a recording,
// and the glyph each one is written with

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Notation glyph for a struck voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    /// Drum heads (kick, snare, toms)
    #[serde(rename = "o")]
    Open,

    /// Cymbals and other metal
    #[serde(rename = "x")]
    Cross,
}

impl Symbol {
    pub fn as_char(&self) -> char {
        match self {
            Symbol::Open => 'o',
            Symbol::Cross => 'x',
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// One of the 15 voices of the drum key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrumVoice {
    Bass1,
    Bass2,
    Snare,
    Tom1,
    Tom2,
    Tom3,
    FloorTom1,
    FloorTom2,
    HiHat,
    Crash,
    Crash2,
    Splash,
    China,
    Ride,
    RideBell,
}

impl DrumVoice {
    /// Catalog order
    pub const ALL: [DrumVoice; 15] = [
        DrumVoice::Bass1,
        DrumVoice::Bass2,
        DrumVoice::Snare,
        DrumVoice::Tom1,
        DrumVoice::Tom2,
        DrumVoice::Tom3,
        DrumVoice::FloorTom1,
        DrumVoice::FloorTom2,
        DrumVoice::HiHat,
        DrumVoice::Crash,
        DrumVoice::Crash2,
        DrumVoice::Splash,
        DrumVoice::China,
        DrumVoice::Ride,
        DrumVoice::RideBell,
    ];

    /// Display name, as written in the notation
    pub fn name(&self) -> &'static str {
        match self {
            DrumVoice::Bass1 => "Bass 1",
            DrumVoice::Bass2 => "Bass 2",
            DrumVoice::Snare => "Snare",
            DrumVoice::Tom1 => "Tom 1",
            DrumVoice::Tom2 => "Tom 2",
            DrumVoice::Tom3 => "Tom 3",
            DrumVoice::FloorTom1 => "Floor tom 1",
            DrumVoice::FloorTom2 => "Floor tom 2",
            DrumVoice::HiHat => "Hi-hat",
            DrumVoice::Crash => "Crash",
            DrumVoice::Crash2 => "Crash 2",
            DrumVoice::Splash => "Splash",
            DrumVoice::China => "China",
            DrumVoice::Ride => "Ride",
            DrumVoice::RideBell => "Ride bell",
        }
    }

    pub fn symbol(&self) -> Symbol {
        match self {
            DrumVoice::Bass1
            | DrumVoice::Bass2
            | DrumVoice::Snare
            | DrumVoice::Tom1
            | DrumVoice::Tom2
            | DrumVoice::Tom3
            | DrumVoice::FloorTom1
            | DrumVoice::FloorTom2 => Symbol::Open,
            DrumVoice::HiHat
            | DrumVoice::Crash
            | DrumVoice::Crash2
            | DrumVoice::Splash
            | DrumVoice::China
            | DrumVoice::Ride
            | DrumVoice::RideBell => Symbol::Cross,
        }
    }

    /// Exact lookup by display name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.name() == name)
    }

    /// Lenient lookup for user input: surrounding whitespace and ASCII case are ignored
    pub fn parse_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for DrumVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Symbol for a voice name; names outside the catalog are written as `o`
pub fn symbol_for_name(name: &str) -> Symbol {
    DrumVoice::from_name(name)
        .map(|voice| voice.symbol())
        .unwrap_or(Symbol::Open)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Unknown drum: {0:?}")]
    UnknownVoice(String),

    #[error("Drum selected more than once: {0}")]
    DuplicateVoice(DrumVoice),

    #[error("Select at least one drum")]
    Empty,
}

/// Ordered, non-empty list of distinct voices chosen for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    voices: Vec<DrumVoice>,
}

impl Selection {
    pub fn new(voices: Vec<DrumVoice>) -> Result<Self, SelectionError> {
        if voices.is_empty() {
            return Err(SelectionError::Empty);
        }
        for (i, voice) in voices.iter().enumerate() {
            if voices[..i].contains(voice) {
                return Err(SelectionError::DuplicateVoice(*voice));
            }
        }
        Ok(Selection { voices })
    }

    /// Parse a comma-separated list such as `"Bass 1, Snare, Hi-hat"`
    pub fn parse(list: &str) -> Result<Self, SelectionError> {
        let voices = list
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| {
                DrumVoice::parse_name(part)
                    .ok_or_else(|| SelectionError::UnknownVoice(part.trim().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(voices)
    }

    pub fn voices(&self) -> &[DrumVoice] {
        &self.voices
    }

    /// Display names in selection order
    pub fn names(&self) -> Vec<&'static str> {
        self.voices.iter().map(|v| v.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

impl Default for Selection {
    fn default() -> Self {
        Selection {
            voices: vec![DrumVoice::Bass1, DrumVoice::Snare, DrumVoice::HiHat],
        }
    }
}
