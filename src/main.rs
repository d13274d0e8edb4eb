//! organroll - plays MIDI files on a solenoid pipe organ.
//!
//! # Usage
//!
//! ```bash
//! organroll song.mid                      # compile and play over /dev/spidev0.0
//! organroll --dump --compile-only song.mid
//! organroll --save song.scroll song.mid   # keep the compiled scroll
//! organroll song.scroll                   # play a saved scroll
//! organroll --dry-run -v song.mid         # real timing, no hardware
//! ```
//!
//! Set `RUST_LOG` for finer control over log output.

use anyhow::{bail, Context, Result};
use organroll::midi::NoteId;
use organroll::player::{play_dry_run, play_on_spi};
use organroll::scroll::registers::{decode, to_bit_string};
use organroll::{compile_file, PlayerConfig, Scroll};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Command-line options for the application.
#[derive(Debug, Default)]
struct CliOptions {
    /// MIDI file, or a saved scroll.
    input: Option<PathBuf>,
    /// Print the compiled scroll to stdout.
    dump: bool,
    /// Write the compiled scroll here.
    save: Option<PathBuf>,
    /// Stop after compiling.
    compile_only: bool,
    /// Use the logging transport instead of SPI.
    dry_run: bool,
    /// JSON player configuration.
    config: Option<PathBuf>,
    bus: Option<u16>,
    device: Option<u8>,
    speed: Option<u32>,
    mode: Option<u8>,
    no_reset: bool,
    verbose: bool,
}

impl CliOptions {
    /// Parses command-line arguments.
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let program = args.first().map(String::as_str).unwrap_or("organroll");
        Self::parse_from(program, &args[1.min(args.len())..])
    }

    fn parse_from(program: &str, args: &[String]) -> Result<Self> {
        let mut options = Self::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            let arg = arg.as_str();
            let mut value = |flag: &str| -> Result<String> {
                iter.next()
                    .cloned()
                    .with_context(|| format!("{} requires a value", flag))
            };

            match arg {
                "--dump" | "-d" => options.dump = true,
                "--compile-only" | "-c" => options.compile_only = true,
                "--dry-run" | "-n" => options.dry_run = true,
                "--no-reset" => options.no_reset = true,
                "--verbose" | "-v" => options.verbose = true,
                "--save" | "-o" => options.save = Some(PathBuf::from(value(arg)?)),
                "--config" => options.config = Some(PathBuf::from(value(arg)?)),
                "--bus" => options.bus = Some(parse_number(arg, &value(arg)?)?),
                "--device" => options.device = Some(parse_number(arg, &value(arg)?)?),
                "--speed" => options.speed = Some(parse_number(arg, &value(arg)?)?),
                "--mode" => options.mode = Some(parse_number(arg, &value(arg)?)?),
                "--help" | "-h" => {
                    print_help(program);
                    std::process::exit(0);
                }
                other if other.starts_with('-') => {
                    bail!("Unknown option: {} (use --help for usage)", other)
                }
                other => {
                    if options.input.is_some() {
                        bail!("Only one input file may be given");
                    }
                    options.input = Some(PathBuf::from(other));
                }
            }
        }

        Ok(options)
    }

    /// Builds the player configuration: defaults, then the config file,
    /// then command-line overrides.
    fn player_config(&self) -> Result<PlayerConfig> {
        let mut config = match &self.config {
            Some(path) => PlayerConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PlayerConfig::default(),
        };
        if let Some(bus) = self.bus {
            config.bus.bus = bus;
        }
        if let Some(device) = self.device {
            config.bus.device = device;
        }
        if let Some(speed) = self.speed {
            config.bus.max_clock_hz = speed;
        }
        if let Some(mode) = self.mode {
            config.bus.mode = mode;
        }
        if self.no_reset {
            config.reset_on_exit = false;
        }
        config.validate().context("Invalid player configuration")?;
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid value for {}: {}", flag, value))
}

fn print_help(program: &str) {
    eprintln!("organroll - MIDI playback for a solenoid pipe organ");
    eprintln!();
    eprintln!("Usage: {} [OPTIONS] <FILE>", program);
    eprintln!();
    eprintln!("FILE is a MIDI file, or a scroll saved with --save (.scroll or .json).");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -d, --dump           Print the compiled scroll");
    eprintln!("  -o, --save PATH      Save the compiled scroll (.scroll = binary, else JSON)");
    eprintln!("  -c, --compile-only   Compile without playing");
    eprintln!("  -n, --dry-run        Play with real timing but no hardware");
    eprintln!("      --config PATH    Load player settings from a JSON file");
    eprintln!("      --bus N          SPI bus number (default 0)");
    eprintln!("      --device N       SPI chip select (default 0)");
    eprintln!("      --speed HZ       Maximum SPI clock (default 100000)");
    eprintln!("      --mode N         SPI mode 0-3 (default 0)");
    eprintln!("      --no-reset       Do not release all pipes when playback ends");
    eprintln!("  -v, --verbose        Debug logging");
    eprintln!("  -h, --help           Print this help message");
}

/// Whether the input is a saved scroll rather than MIDI.
fn is_scroll_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("scroll") || e.eq_ignore_ascii_case("json"))
}

/// Prints one line per frame: absolute time, delay and open pipes.
fn dump_scroll(scroll: &Scroll) {
    println!("scroll follows");
    for (frame, time_us) in scroll.iter().zip(scroll.absolute_times()) {
        let pipes: Vec<u8> = decode(&frame.registers)
            .into_iter()
            .map(NoteId::as_u8)
            .collect();
        println!(
            "{:>12} +{:>10}  {}  {:?}",
            time_us,
            frame.delay_us,
            to_bit_string(&frame.registers),
            pipes
        );
    }
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = CliOptions::parse()?;

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(input) = cli.input.clone() else {
        bail!("No input file given (use --help for usage)");
    };
    if !input.exists() {
        bail!("File not found: {}", input.display());
    }
    let config = cli.player_config()?;

    let scroll = if is_scroll_file(&input) {
        Scroll::load(&input)
            .with_context(|| format!("Failed to load scroll {}", input.display()))?
    } else {
        let compiled = compile_file(&input)
            .with_context(|| format!("Failed to compile {}", input.display()))?;
        let report = &compiled.report;
        if !report.diagnostics.is_empty() {
            eprintln!(
                "{} note(s) transposed, {} dangling note-off(s)",
                report.transpositions(),
                report.dangling_note_offs()
            );
        }
        compiled.scroll
    };

    if cli.dump {
        dump_scroll(&scroll);
    }
    if let Some(path) = &cli.save {
        scroll
            .save(path)
            .with_context(|| format!("Failed to save scroll to {}", path.display()))?;
        eprintln!("Saved {} frames to {}", scroll.len(), path.display());
    }
    if cli.compile_only {
        return Ok(());
    }

    eprintln!("Playing...");
    let summary = if cli.dry_run {
        play_dry_run(scroll, config)
    } else {
        play_on_spi(scroll, config)
    }
    .context("Playback failed")?;
    eprintln!("Done! {} frames in {:.1}s", summary.frames_sent, summary.elapsed.as_secs_f64());

    Ok(())
}
