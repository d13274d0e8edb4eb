//! MIDI input side of the compiler.
//!
//! This module turns a Standard MIDI File into plain per-track event lists
//! and provides the building blocks of the single annotation pass: the
//! track merger, the tempo clock, the pitch-to-solenoid mapping and the
//! counted set of sounding notes.

mod active;
mod merge;
pub(crate) mod midi_import;
mod note;
mod tempo;

pub use active::{ActiveNoteMultiset, NoteOffResult};
pub use merge::merge_tracks;
pub use midi_import::{import_tracks, parse_bytes, ParsedMidi};
pub use note::{NoteId, NoteMapping, FIRST_PITCH, NOTE_COUNT};
pub use tempo::{TempoClock, DEFAULT_MICROS_PER_BEAT};

/// Standard MIDI note names for log output.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// ```
/// use organroll::midi::note_to_name;
///
/// assert_eq!(note_to_name(60), "C4");
/// ```
pub fn note_to_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1; // MIDI octave convention
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// What a raw event means to the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Set tempo meta event. Payload is the 3-byte big-endian
    /// microseconds-per-beat value.
    TempoChange,
    /// Note on or note off. Payload is `[pitch, velocity]`; a velocity of
    /// zero is a note-off.
    NoteEvent,
    /// Anything else in the file. Carried through the merge and ignored.
    /// Payload is the event's data bytes: channel messages without the
    /// status byte, meta and sysex bodies without type or length.
    Other,
}

/// A single event as delivered by the parser, positioned on the absolute
/// tick axis of its track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Ticks since the start of the track.
    pub absolute_tick: u64,
    /// Event category.
    pub kind: EventKind,
    /// Raw data bytes, interpretation depends on `kind`.
    pub payload: Vec<u8>,
}

impl RawEvent {
    /// Creates a tempo change event at `tick`.
    pub fn tempo(tick: u64, micros_per_beat: u32) -> Self {
        let [_, hi, mid, lo] = micros_per_beat.to_be_bytes();
        Self {
            absolute_tick: tick,
            kind: EventKind::TempoChange,
            payload: vec![hi, mid, lo],
        }
    }

    /// Creates a note event at `tick`. Velocity 0 means note-off.
    pub fn note(tick: u64, pitch: u8, velocity: u8) -> Self {
        Self {
            absolute_tick: tick,
            kind: EventKind::NoteEvent,
            payload: vec![pitch, velocity],
        }
    }

    /// Creates an event the compiler does not act on.
    pub fn other(tick: u64, payload: Vec<u8>) -> Self {
        Self {
            absolute_tick: tick,
            kind: EventKind::Other,
            payload,
        }
    }
}
