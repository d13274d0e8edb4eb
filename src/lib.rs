//! organroll - MIDI playback for a solenoid-driven pipe organ.
//!
//! A MIDI file is compiled once into a [`Scroll`]: a list of 8-byte
//! register states, one bit per pipe, each with the delay since the
//! previous state. The [`Player`] then replays the scroll over SPI to a
//! chain of shift registers.

pub mod bus;
pub mod config;
pub mod error;
pub mod midi;
pub mod player;
pub mod scroll;

// Re-export commonly used types
pub use bus::{Bus, BusError, BusHandle, BusSettings, DryRunBus, SpiBus, Transport};
pub use config::{ConfigError, PlayerConfig};
pub use error::CompileError;
pub use midi::{import_tracks, NoteId, ParsedMidi, RawEvent};
pub use player::{PlaybackError, PlaybackOutcome, PlaybackSummary, Player, PlayerState, StopHandle};
pub use scroll::{compile, compile_file, CompileReport, Compiled, Diagnostic, Frame, Scroll};
