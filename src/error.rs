use crate::midi::EventKind;
use thiserror::Error;

/// Errors that abort a compile pass before any playback starts.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MIDI parse error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("MIDI file contains no tracks")]
    NoTracks,

    #[error("ticks per beat must be non-zero")]
    ZeroTicksPerBeat,

    #[error("Malformed {kind:?} event at tick {tick}: {reason}")]
    MalformedEvent {
        tick: u64,
        kind: EventKind,
        reason: &'static str,
    },
}
