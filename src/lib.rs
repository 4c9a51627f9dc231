// Drumscribe - drum recording to rhythm notation
// Module declarations

pub mod audio;
pub mod groove;
pub mod notation;
pub mod pipeline;

pub use audio::{extract, OnsetDetector, OnsetEvent};
pub use notation::{classify, render, ClassifiedHit, DrumVoice, RenderedNotation, Selection};
pub use pipeline::{TranscribeRequest, Transcriber, Transcription};
