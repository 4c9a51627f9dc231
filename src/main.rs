use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use drumscribe_lib::audio::{OnsetConfig, SpectralFluxDetector, DEFAULT_PEAK_WINDOW_MS};
use drumscribe_lib::notation::{DrumVoice, Selection};
use drumscribe_lib::pipeline::{TraceWriter, Transcriber, Transcription};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(
    name = "drumscribe",
    about = "Transcribe a drum recording into 16th-note rhythm notation"
)]
struct Cli {
    /// Path to the recording (WAV)
    #[arg(required_unless_present = "list_drums")]
    audio_file: Option<PathBuf>,

    /// Tempo of the recording, 30-300 BPM (estimated from the onsets when omitted)
    #[arg(long)]
    bpm: Option<f64>,

    /// Comma-separated drums present in the recording; quieter hits go to
    /// drums listed earlier
    #[arg(long, default_value = "Bass 1,Snare,Hi-hat")]
    drums: String,

    /// Where to write the notation text
    #[arg(short, long, default_value = "drum_notation.txt")]
    output: PathBuf,

    /// Also write the classified hits as JSON (for plotting onset markers)
    #[arg(long)]
    hits_json: Option<PathBuf>,

    /// Append a JSONL progress trace to this file
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Onset threshold above the local mean of the normalized flux
    #[arg(long, default_value_t = 0.07)]
    delta: f32,

    /// Minimum gap between onsets in ms
    #[arg(long, default_value_t = 30.0)]
    wait_ms: f64,

    /// STFT hop size in samples
    #[arg(long, default_value_t = 512)]
    hop_size: usize,

    /// Span after each onset searched for its peak amplitude, in ms
    /// (0 reads the single sample nearest the onset)
    #[arg(long, default_value_t = DEFAULT_PEAK_WINDOW_MS)]
    peak_window_ms: f64,

    /// Print the available drums and their symbols, then exit
    #[arg(long)]
    list_drums: bool,

    /// Show detailed analysis output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.list_drums {
        print!("{}", drum_list());
        return Ok(());
    }

    let audio_file = cli
        .audio_file
        .as_deref()
        .context("no audio file given")?;

    let selection = Selection::parse(&cli.drums).context("invalid --drums")?;
    log::info!("Drums: {}", selection.names().join(", "));

    let detector = SpectralFluxDetector::new(OnsetConfig {
        hop_size: cli.hop_size,
        delta: cli.delta,
        wait_ms: cli.wait_ms,
        ..OnsetConfig::default()
    });

    let mut transcriber = Transcriber::new()
        .with_detector(detector)
        .with_peak_window_ms(cli.peak_window_ms);
    if let Some(path) = cli.trace.clone() {
        transcriber = transcriber.with_trace(TraceWriter::new(path));
    }

    let transcription = transcriber
        .transcribe_wav(audio_file, cli.bpm, &selection)
        .with_context(|| format!("processing {}", audio_file.display()))?;

    if let Some(estimate) = transcription.tempo_estimate {
        if estimate.confidence == 0.0 {
            log::warn!(
                "Could not estimate tempo, using {:.1} BPM; pass --bpm to override",
                estimate.bpm
            );
        } else {
            log::info!("Estimated BPM: {:.2}", estimate.bpm);
        }
    }

    print!("{}", transcription.notation.text);

    fs::write(&cli.output, &transcription.notation.text)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    log::info!("Wrote {}", cli.output.display());

    if let Some(ref path) = cli.hits_json {
        write_hits_json(path, &transcription)?;
        log::info!("Wrote {}", path.display());
    }

    Ok(())
}

/// One line per catalog drum: name and notation symbol
fn drum_list() -> String {
    DrumVoice::ALL
        .iter()
        .map(|voice| format!("{:<12} {}\n", voice.name(), voice.symbol()))
        .collect()
}

fn write_hits_json(path: &Path, transcription: &Transcription) -> Result<()> {
    let report = serde_json::json!({
        "bpm": transcription.bpm,
        "hits": transcription.notation.hits,
    });
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use drumscribe_lib::notation::{ClassifiedHit, RenderedNotation, Symbol};
    use tempfile::TempDir;

    #[test]
    fn test_drum_list() {
        let list = drum_list();
        let lines: Vec<&str> = list.lines().collect();

        assert_eq!(lines.len(), 15);
        assert_eq!(lines[0], "Bass 1       o");
        assert_eq!(lines[8], "Hi-hat       x");
        assert_eq!(lines[14], "Ride bell    x");
    }

    #[test]
    fn test_list_drums_needs_no_audio_file() {
        let cli = Cli::try_parse_from(["drumscribe", "--list-drums"]).unwrap();
        assert!(cli.list_drums);
        assert!(cli.audio_file.is_none());
        assert!(run(cli).is_ok());

        assert!(Cli::try_parse_from(["drumscribe"]).is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["drumscribe", "clip.wav"]).unwrap();

        assert_eq!(cli.drums, "Bass 1,Snare,Hi-hat");
        assert_eq!(cli.output, PathBuf::from("drum_notation.txt"));
        assert_eq!(cli.peak_window_ms, DEFAULT_PEAK_WINDOW_MS);
        assert!(cli.bpm.is_none());
    }

    #[test]
    fn test_write_hits_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hits.json");
        let hits = vec![
            ClassifiedHit {
                time_seconds: 0.0,
                voice: "Snare".to_string(),
                symbol: Symbol::Open,
            },
            ClassifiedHit {
                time_seconds: 0.5,
                voice: "Hi-hat".to_string(),
                symbol: Symbol::Cross,
            },
        ];
        let transcription = Transcription {
            bpm: 120.0,
            tempo_estimate: None,
            events: Vec::new(),
            notation: RenderedNotation {
                text: String::new(),
                hits,
            },
        };

        write_hits_json(&path, &transcription).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["bpm"], 120.0);
        assert_eq!(json["hits"].as_array().unwrap().len(), 2);
        assert_eq!(json["hits"][1]["voice"], "Hi-hat");
        assert_eq!(json["hits"][1]["symbol"], "x");
        assert_eq!(json["hits"][0]["time_seconds"], 0.0);
    }

    #[test]
    fn test_write_hits_json_into_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let transcription = Transcription {
            bpm: 90.0,
            tempo_estimate: None,
            events: Vec::new(),
            notation: RenderedNotation {
                text: String::new(),
                hits: Vec::new(),
            },
        };

        let result = write_hits_json(&temp_dir.path().join("missing").join("hits.json"), &transcription);

        assert!(result.is_err());
    }
}
