// Notation module
// Voice catalog, amplitude-rank classification, and grid rendering

pub mod catalog;
pub mod classify;
pub mod grid;

pub use catalog::{symbol_for_name, DrumVoice, Selection, SelectionError, Symbol};
pub use classify::{classify, voice_index, ClassifiedHit};
pub use grid::{render, total_slots, NotationGrid, RenderedNotation, VoiceRow};
