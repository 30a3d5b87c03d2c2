//! scorecraft - play, export and harmonize compositions from the command line.
//!
//! Compositions are JSON files holding a melody layer and an optional
//! generated harmony layer.
//!
//! # Usage
//!
//! ```bash
//! scorecraft play song.json --all          # Melody and harmony through the speakers
//! scorecraft export song.json --format mp3 # Render to ./composition_*.mp3
//! scorecraft harmonize song.json --genre jazz
//! scorecraft preview 64 --instrument piano  # Sound one note
//! scorecraft instruments                   # List instruments and drum voices
//! ```
//!
//! Set `RUST_LOG=debug` for transport and render logging on stderr.

use anyhow::{anyhow, bail, Context, Result};
use scorecraft::audio::{AudioEngine, ExportFormat};
use scorecraft::score::{drum_voice, instruments, Composition, Layers, DRUM_VOICES};
use scorecraft::session::{Session, SessionConfig};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What the invocation should do.
#[derive(Debug)]
enum Command {
    Play { file: PathBuf, all: bool },
    Export { file: PathBuf },
    Harmonize { file: PathBuf },
    Preview { pitch: u8 },
    Instruments,
}

/// Command-line options for the application.
#[derive(Debug)]
struct CliOptions {
    command: Command,
    /// Optional session config file.
    config: Option<PathBuf>,
    volume: Option<f32>,
    genre: Option<String>,
    format: Option<ExportFormat>,
    /// Output directory for exports.
    out: PathBuf,
    delay_ms: Option<u64>,
    instrument: Option<String>,
    drum: Option<String>,
}

fn print_help(program: &str) {
    eprintln!("scorecraft - score synthesis and export");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {} play <composition.json> [--all] [--volume V]", program);
    eprintln!(
        "  {} export <composition.json> [--format wav|mp3] [--out DIR] [--genre G] [--volume V]",
        program
    );
    eprintln!(
        "  {} harmonize <composition.json> [--genre G] [--delay-ms N]",
        program
    );
    eprintln!(
        "  {} preview <pitch> [--instrument I] [--drum D] [--volume V]",
        program
    );
    eprintln!("  {} instruments", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config PATH  Load session defaults from a JSON file");
    eprintln!("  -h, --help         Print this help message");
    eprintln!();
    eprintln!("The mp3 format is a raw PCM stub, not a real MP3 stream.");
}

/// Returns the argument following a flag.
fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a String> {
    args.get(i)
        .ok_or_else(|| anyhow!("{} requires an argument", flag))
}

impl CliOptions {
    /// Parses command-line arguments.
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let program = args.first().map(String::as_str).unwrap_or("scorecraft");

        let mut positional: Vec<&str> = Vec::new();
        let mut all = false;
        let mut config = None;
        let mut volume = None;
        let mut genre = None;
        let mut format = None;
        let mut out = PathBuf::from(".");
        let mut delay_ms = None;
        let mut instrument = None;
        let mut drum = None;
        let mut i = 1;

        while i < args.len() {
            match args[i].as_str() {
                "--all" | "-a" => all = true,
                "--config" | "-c" => {
                    i += 1;
                    config = Some(PathBuf::from(flag_value(&args, i, "--config")?));
                }
                "--volume" => {
                    i += 1;
                    let v: f32 = flag_value(&args, i, "--volume")?
                        .parse()
                        .context("--volume expects a number between 0 and 1")?;
                    volume = Some(v);
                }
                "--genre" => {
                    i += 1;
                    genre = Some(flag_value(&args, i, "--genre")?.clone());
                }
                "--format" => {
                    i += 1;
                    format = Some(flag_value(&args, i, "--format")?.parse::<ExportFormat>()?);
                }
                "--out" | "-o" => {
                    i += 1;
                    out = PathBuf::from(flag_value(&args, i, "--out")?);
                }
                "--delay-ms" => {
                    i += 1;
                    let ms: u64 = flag_value(&args, i, "--delay-ms")?
                        .parse()
                        .context("--delay-ms expects milliseconds")?;
                    delay_ms = Some(ms);
                }
                "--instrument" => {
                    i += 1;
                    instrument = Some(flag_value(&args, i, "--instrument")?.clone());
                }
                "--drum" => {
                    i += 1;
                    drum = Some(flag_value(&args, i, "--drum")?.clone());
                }
                "--help" | "-h" => {
                    print_help(program);
                    std::process::exit(0);
                }
                other if other.starts_with('-') => {
                    bail!("Unknown option: {} (use --help for usage)", other);
                }
                other => positional.push(other),
            }
            i += 1;
        }

        let file = || -> Result<PathBuf> {
            positional
                .get(1)
                .map(|p| PathBuf::from(*p))
                .ok_or_else(|| anyhow!("missing composition file"))
        };

        let command = match positional.first().copied() {
            Some("play") => Command::Play {
                file: file()?,
                all,
            },
            Some("export") => Command::Export {
                file: file()?,
            },
            Some("harmonize") => Command::Harmonize {
                file: file()?,
            },
            Some("preview") => {
                let pitch: u8 = positional
                    .get(1)
                    .ok_or_else(|| anyhow!("missing pitch"))?
                    .parse()
                    .context("pitch expects a MIDI note number (0-127)")?;
                Command::Preview { pitch }
            }
            Some("instruments") => Command::Instruments,
            Some(other) => bail!("Unknown command: {} (use --help for usage)", other),
            None => {
                print_help(program);
                std::process::exit(1);
            }
        };

        Ok(Self {
            command,
            config,
            volume,
            genre,
            format,
            out,
            delay_ms,
            instrument,
            drum,
        })
    }

    /// Builds the session config: file (or defaults), then flag overrides.
    fn session_config(&self) -> Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => SessionConfig::default(),
        };
        if let Some(volume) = self.volume {
            config.master_volume = volume;
        }
        if let Some(genre) = &self.genre {
            config.genre = genre.clone();
        }
        if let Some(format) = self.format {
            config.export_format = format;
        }
        if let Some(ms) = self.delay_ms {
            config.harmony_delay_ms = ms;
        }
        if let Some(drum) = &self.drum {
            config.drum = drum.clone();
            config.instrument = "drums".to_string();
        }
        if let Some(instrument) = &self.instrument {
            config.instrument = instrument.clone();
        }
        Ok(config)
    }
}

fn load_session(file: &Path, config: SessionConfig) -> Result<Session> {
    let composition = Composition::load_from_file(file)
        .with_context(|| format!("Failed to load composition: {}", file.display()))?;
    Ok(Session::with_composition(composition, config))
}

fn main() -> Result<()> {
    let cli = CliOptions::parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = cli.session_config()?;

    match &cli.command {
        Command::Instruments => {
            println!("Instruments:");
            for instrument in instruments() {
                println!("  {:<16} {}", instrument.id, instrument.name);
            }
            println!("Drums:");
            for drum in DRUM_VOICES {
                println!(
                    "  {:<16} {} (pitch {}, {} Hz, {} s)",
                    drum.id, drum.name, drum.pitch, drum.frequency, drum.decay
                );
            }
        }
        Command::Play { file, all } => {
            let mut session = load_session(file, config)?;
            let engine = AudioEngine::new().context("Failed to initialize audio output")?;
            let layers = if *all { Layers::All } else { Layers::Melody };

            engine.play(&mut session, layers, |progress| {
                eprint!("\rPlaying... {:5.1}%", progress);
                let _ = std::io::stderr().flush();
            });
            eprintln!("\rDone.              ");
        }
        Command::Preview { pitch } => {
            let mut session = Session::new(SessionConfig::default());
            let instrument = config.instrument.clone();
            let drum = config.drum.clone();
            if !session.select_instrument(&instrument) || !session.select_drum(&drum) {
                bail!("{}", session.status().unwrap_or("invalid selection"));
            }
            session.set_master_volume(config.master_volume);

            let id = session.place_note(*pitch, 0.0, 1.0);
            let note = session
                .composition()
                .get_note(id)
                .cloned()
                .ok_or_else(|| anyhow!("note was not placed"))?;
            let length = note
                .drum
                .as_deref()
                .and_then(drum_voice)
                .map_or(note.duration, |d| d.decay);

            let engine = AudioEngine::new().context("Failed to initialize audio output")?;
            engine.preview(&note, session.render_context());
            std::thread::sleep(Duration::from_secs_f64(length + 0.1));
        }
        Command::Export { file } => {
            let mut session = load_session(file, config)?;
            let format = session.config().export_format;
            let blob = session
                .export(format)
                .ok_or_else(|| anyhow!("{}", session.status().unwrap_or("export failed")))?;
            let path = blob
                .write_to_dir(&cli.out)
                .with_context(|| format!("Failed to write export to {}", cli.out.display()))?;
            println!("{}", path.display());
        }
        Command::Harmonize { file } => {
            let mut session = load_session(file, config)?;
            if !session.generate_harmony() {
                bail!(
                    "{}",
                    session.status().unwrap_or("harmony generation did not start")
                );
            }
            eprintln!("Generating harmony ({})...", session.genre());
            if !session.wait_for_harmony() {
                bail!("harmony generation failed");
            }
            session
                .composition()
                .save_to_file(file)
                .with_context(|| format!("Failed to save composition: {}", file.display()))?;
            println!(
                "Key {}: {}",
                session.detected_key().unwrap_or("?"),
                session.composition().progression().join(" - ")
            );
        }
    }

    Ok(())
}
