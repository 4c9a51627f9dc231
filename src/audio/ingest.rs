// Audio ingestion
// Reads WAV clips into normalized f32 samples for the transcription pipeline

use hound::{SampleFormat, WavReader};
use std::io::{Cursor, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to read WAV file: {0}")]
    WavReadError(#[from] hound::Error),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid audio data: {0}")]
    InvalidData(&'static str),
}

#[derive(Debug, Clone)]
pub struct AudioData {
    /// Interleaved samples normalized to f32 in range [-1.0, 1.0]
    pub samples: Vec<f32>,

    /// Sample rate in Hz (e.g., 22050, 44100, 48000)
    pub sample_rate: u32,

    /// Number of interleaved channels
    pub channels: u16,

    /// Bit depth of the source file
    pub bit_depth: u16,

    /// Total number of frames (samples / channels)
    pub frame_count: usize,
}

impl AudioData {
    /// Clip length in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count as f64 / self.sample_rate as f64
    }

    /// Mix down to mono by averaging channels
    pub fn to_mono(&self) -> Vec<f32> {
        let channels = self.channels as usize;
        if channels <= 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}

/// Ingest a WAV clip held in memory
pub fn ingest_wav(data: &[u8]) -> Result<AudioData, AudioError> {
    decode(WavReader::new(Cursor::new(data))?)
}

/// Ingest a WAV clip from disk
pub fn read_wav(path: &Path) -> Result<AudioData, AudioError> {
    let audio = decode(WavReader::open(path)?)?;

    log::info!(
        "Loaded {}: {} Hz, {} ch, {} bit, {:.2}s",
        path.display(),
        audio.sample_rate,
        audio.channels,
        audio.bit_depth,
        audio.duration_secs()
    );

    Ok(audio)
}

fn decode<R: Read>(mut reader: WavReader<R>) -> Result<AudioData, AudioError> {
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(AudioError::InvalidData("zero channels"));
    }
    if spec.sample_rate == 0 {
        return Err(AudioError::InvalidData("zero sample rate"));
    }

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => {
            // hound already recenters unsigned 8-bit PCM around zero
            read_int(&mut reader, 128.0)?
        }
        (SampleFormat::Int, 16) => read_int(&mut reader, 32768.0)?,
        (SampleFormat::Int, 24) => read_int(&mut reader, 8388608.0)?,
        (SampleFormat::Int, 32) => read_int(&mut reader, 2147483648.0)?,
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        (format, bits) => {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?} {}-bit audio",
                format, bits
            )));
        }
    };

    let frame_count = samples.len() / spec.channels as usize;

    Ok(AudioData {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bit_depth: spec.bits_per_sample,
        frame_count,
    })
}

fn read_int<R: Read>(reader: &mut WavReader<R>, full_scale: f32) -> Result<Vec<f32>, AudioError> {
    let samples = reader
        .samples::<i32>()
        .map(|s| s.map(|v| v as f32 / full_scale))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(samples)
}
